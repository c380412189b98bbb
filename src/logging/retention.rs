use super::LoggingConfig;
use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, NaiveDate};
use std::fs;
use std::path::Path;

/// 删除日期早于 `today - retention_days` 的日志文件, 返回删除个数
///
/// 只处理 `<prefix>.<YYYY-MM-DD>.log` 形式的文件, 目录中其他文件不动.
pub fn sweep_expired_logs(config: &LoggingConfig, today: NaiveDate) -> Result<usize> {
    let directory = Path::new(&config.directory);
    if !directory.exists() {
        return Ok(0);
    }

    let cutoff = today - ChronoDuration::days(config.retention_days);
    let mut removed = 0;

    let entries = fs::read_dir(directory)
        .with_context(|| format!("读取日志目录失败, path={}", directory.display()))?;
    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        let date = match parse_log_name(&file_name, &config.file_prefix) {
            Some(date) => date,
            None => continue,
        };
        if date < cutoff {
            let path = entry.path();
            fs::remove_file(&path)
                .with_context(|| format!("删除过期日志失败, path={}", path.display()))?;
            removed += 1;
        }
    }

    Ok(removed)
}

fn parse_log_name(file_name: &str, prefix: &str) -> Option<NaiveDate> {
    let with_prefix = file_name.strip_prefix(prefix)?;
    let with_dot = with_prefix.strip_prefix('.')?;
    let date_part = with_dot.strip_suffix(".log")?;
    parse_date(date_part)
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    if value.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::dated_log_path;
    use tempfile::TempDir;

    #[test]
    fn test_parse_log_name() {
        let prefix = "m4venc";

        let parsed = parse_log_name("m4venc.2026-02-06.log", prefix);
        assert_eq!(parsed, NaiveDate::from_ymd_opt(2026, 2, 6));

        assert!(parse_log_name("m4venc.log", prefix).is_none());
        assert!(parse_log_name("other.2026-02-06.log", prefix).is_none());
        assert!(parse_log_name("m4venc.2026-2-6.log", prefix).is_none());
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let temp_dir = match TempDir::new() {
            Ok(temp_dir) => temp_dir,
            Err(err) => panic!("创建临时目录失败: {}", err),
        };
        let config = LoggingConfig {
            level: "info".to_string(),
            directory: temp_dir.path().to_string_lossy().to_string(),
            file_prefix: "m4venc".to_string(),
            retention_days: 7,
            console_level: "debug".to_string(),
        };
        let today = match NaiveDate::from_ymd_opt(2026, 3, 20) {
            Some(date) => date,
            None => panic!("测试日期初始化失败"),
        };

        let dir = temp_dir.path();
        let old = dated_log_path(dir, "m4venc", today - ChronoDuration::days(8));
        let edge = dated_log_path(dir, "m4venc", today - ChronoDuration::days(7));
        let fresh = dated_log_path(dir, "m4venc", today);
        let foreign = dir.join("notes.txt");
        for path in [&old, &edge, &fresh, &foreign] {
            if let Err(err) = fs::write(path, b"x") {
                panic!("写入测试文件失败: {}", err);
            }
        }

        let removed = sweep_expired_logs(&config, today);
        assert!(removed.is_ok(), "清理失败: {:?}", removed.err());
        assert_eq!(removed.ok(), Some(1));
        assert!(!old.exists());
        assert!(edge.exists());
        assert!(fresh.exists());
        assert!(foreign.exists());
    }

    #[test]
    fn test_sweep_missing_directory() {
        let config = LoggingConfig {
            level: "info".to_string(),
            directory: "data/tmp/does-not-exist-m4venc".to_string(),
            file_prefix: "m4venc".to_string(),
            retention_days: 7,
            console_level: "debug".to_string(),
        };
        let today = chrono::Local::now().date_naive();
        assert_eq!(sweep_expired_logs(&config, today).ok(), Some(0));
    }
}
