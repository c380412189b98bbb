//! 编码器配置
//!
//! 由外部 (帧级编排或配置文件) 提供, 构造编码器时校验一次.

use serde::{Deserialize, Serialize};

use m4venc_core::{M4vError, M4vResult};

/// 量化器族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantFamily {
    /// H.263 线性量化 (quant_type = 0)
    #[default]
    H263,
    /// MPEG 矩阵量化 (quant_type = 1)
    Mpeg,
}

/// 宏块编码核心配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// 量化器族
    pub quant_family: QuantFamily,
    /// 短头 (H.263 baseline) 模式
    pub short_header: bool,
    /// 是否做半像素细化
    pub half_pel: bool,
    /// 是否允许 4MV (INTER4V)
    pub inter4v: bool,
    /// 运动搜索范围 (整像素)
    pub search_range: u8,
    /// Intra DC VLC 阈值 (0..=7), 7 表示 DC 与 AC 一起游程编码
    pub intra_dc_vlc_threshold: u8,
    /// 自定义 Intra 量化矩阵 (自然序), None 使用默认矩阵
    #[serde(with = "matrix_serde")]
    pub intra_matrix: Option<[u8; 64]>,
    /// 自定义 Inter 量化矩阵 (自然序), None 使用默认矩阵
    #[serde(with = "matrix_serde")]
    pub inter_matrix: Option<[u8; 64]>,
}

/// 64 元素矩阵按 JSON 数组读写
mod matrix_serde {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<[u8; 64]>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(m) => s.serialize_some(&m[..]),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<[u8; 64]>, D::Error> {
        let raw: Option<Vec<u8>> = Option::deserialize(d)?;
        raw.map(|v| {
            let len = v.len();
            <[u8; 64]>::try_from(v)
                .map_err(|_| D::Error::custom(format!("量化矩阵需要 64 个元素, 实际 {}", len)))
        })
        .transpose()
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            quant_family: QuantFamily::H263,
            short_header: false,
            half_pel: true,
            inter4v: false,
            search_range: 16,
            intra_dc_vlc_threshold: 0,
            intra_matrix: None,
            inter_matrix: None,
        }
    }
}

impl EncoderConfig {
    /// 从 JSON 文本解析配置并校验
    pub fn from_json(text: &str) -> M4vResult<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| M4vError::Config(format!("解析配置失败: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// 校验配置组合
    pub fn validate(&self) -> M4vResult<()> {
        if self.search_range == 0 || self.search_range > 64 {
            return Err(M4vError::Config(format!(
                "search_range 超出范围 1..=64: {}",
                self.search_range
            )));
        }
        if self.intra_dc_vlc_threshold > 7 {
            return Err(M4vError::Config(format!(
                "intra_dc_vlc_threshold 超出范围 0..=7: {}",
                self.intra_dc_vlc_threshold
            )));
        }
        if self.short_header {
            if self.quant_family != QuantFamily::H263 {
                return Err(M4vError::Unsupported("短头模式只支持 H.263 量化".into()));
            }
            if self.inter4v {
                return Err(M4vError::Unsupported("短头模式不支持 INTER4V".into()));
            }
            if self.search_range > 16 {
                return Err(M4vError::Config(format!(
                    "短头模式 search_range 不能超过 16: {}",
                    self.search_range
                )));
            }
        }
        for (name, matrix) in [("intra", &self.intra_matrix), ("inter", &self.inter_matrix)] {
            if let Some(m) = matrix {
                if m.contains(&0) {
                    return Err(M4vError::Config(format!("{} 量化矩阵含有 0", name)));
                }
            }
        }
        if let Some(m) = &self.intra_matrix {
            if m[0] != 8 {
                return Err(M4vError::Config(format!(
                    "intra 量化矩阵第一个元素必须为 8, 实际 {}",
                    m[0]
                )));
            }
        }
        Ok(())
    }
}
