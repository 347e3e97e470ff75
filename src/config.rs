use crate::utils::error::AppError;
use crate::Result;
use std::path::PathBuf;

/// 未指定语言时使用的OCR语言
pub const DEFAULT_LANG: &str = "pt";

#[derive(Debug, Clone)]
pub struct Config {
    /// 服务器绑定地址
    pub bind_addr: String,

    /// 模型文件目录
    pub models_dir: PathBuf,

    /// 默认OCR语言
    pub default_lang: String,

    /// 工作线程数量
    pub workers: usize,

    /// 开发模式
    pub dev_mode: bool,

    /// ONNX Runtime配置
    pub onnx_config: OnnxConfig,

    /// 服务器配置
    pub server_config: ServerConfig,

    /// 语音识别后端配置
    pub whisper_config: WhisperConfig,
}

#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// CPU线程数
    pub intra_threads: usize,

    /// 优化级别
    pub optimization_level: i32,

    /// 是否启用文本行方向分类
    pub use_textline_orientation: bool,

    /// 低于该分数的识别结果被丢弃
    pub drop_score: f32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 请求超时时间（秒）
    pub request_timeout: u64,

    /// 最大请求体大小（字节）
    pub max_request_size: usize,
}

#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// OpenAI兼容的转写服务地址
    pub base_url: String,

    /// 模型名称
    pub model: String,

    /// 后端请求超时（秒）
    pub timeout: u64,
}

impl Config {
    pub fn new(
        bind_addr: String,
        models_dir: String,
        workers: Option<usize>,
        dev_mode: bool,
    ) -> Result<Self> {
        if bind_addr.trim().is_empty() {
            return Err(AppError::Config("Bind address cannot be empty".to_string()));
        }

        let cpu_cores = num_cpus::get();
        let workers = workers.unwrap_or(cpu_cores).max(1);

        let onnx_config = OnnxConfig {
            intra_threads: (cpu_cores * 3 / 4).max(1), // 使用75%的CPU核心
            optimization_level: 3,
            use_textline_orientation: true,
            drop_score: 0.5,
        };

        let server_config = ServerConfig {
            request_timeout: if dev_mode { 300 } else { 60 }, // 开发模式更长超时
            max_request_size: 50 * 1024 * 1024,               // 50MB
        };

        let whisper_config = WhisperConfig {
            base_url: "http://127.0.0.1:9000".to_string(),
            model: "base".to_string(),
            timeout: 120,
        };

        Ok(Self {
            bind_addr,
            models_dir: PathBuf::from(models_dir),
            default_lang: DEFAULT_LANG.to_string(),
            workers,
            dev_mode,
            onnx_config,
            server_config,
            whisper_config,
        })
    }

    pub fn with_default_lang(mut self, lang: &str) -> Self {
        self.default_lang = normalize_lang(lang, DEFAULT_LANG);
        self
    }

    pub fn with_whisper(mut self, base_url: String, model: String) -> Self {
        self.whisper_config.base_url = base_url.trim_end_matches('/').to_string();
        self.whisper_config.model = model;
        self
    }

    /// 获取检测模型路径
    pub fn det_model_path(&self) -> PathBuf {
        self.models_dir.join("ppocrv5/det/det.onnx")
    }

    /// 获取分类模型路径
    pub fn cls_model_path(&self) -> PathBuf {
        self.models_dir.join("ppocrv5/cls/cls.onnx")
    }

    /// 获取识别模型路径，语言专属模型不存在时回退到通用模型
    pub fn rec_model_path(&self, lang: &str) -> PathBuf {
        let specific = self.models_dir.join("ppocrv5/rec").join(lang).join("rec.onnx");
        if specific.exists() {
            specific
        } else {
            self.models_dir.join("ppocrv5/rec/rec.onnx")
        }
    }

    /// 获取字典文件路径，规则同识别模型
    pub fn dict_path(&self, lang: &str) -> PathBuf {
        let specific = self.models_dir.join("ppocrv5/rec").join(lang).join("dict.txt");
        if specific.exists() {
            specific
        } else {
            self.models_dir.join("ppocrv5/ppocrv5_dict.txt")
        }
    }
}

/// 语言代码统一为小写，空值使用默认语言
pub fn normalize_lang(lang: &str, default: &str) -> String {
    let lang = lang.trim();
    if lang.is_empty() {
        default.to_lowercase()
    } else {
        lang.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() {
        let config = Config::new("0.0.0.0:8000".into(), "models".into(), Some(2), false).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.default_lang, "pt");
        assert_eq!(config.server_config.request_timeout, 60);
        assert!(config.onnx_config.intra_threads >= 1);
    }

    #[test]
    fn test_empty_bind_rejected() {
        assert!(Config::new(" ".into(), "models".into(), None, false).is_err());
    }

    #[test]
    fn test_rec_model_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(
            "127.0.0.1:0".into(),
            dir.path().to_string_lossy().into_owned(),
            None,
            true,
        )
        .unwrap();

        assert_eq!(
            config.rec_model_path("en"),
            dir.path().join("ppocrv5/rec/rec.onnx")
        );

        let lang_dir = dir.path().join("ppocrv5/rec/en");
        fs::create_dir_all(&lang_dir).unwrap();
        fs::write(lang_dir.join("rec.onnx"), b"").unwrap();
        fs::write(lang_dir.join("dict.txt"), b"a\n").unwrap();

        assert_eq!(config.rec_model_path("en"), lang_dir.join("rec.onnx"));
        assert_eq!(config.dict_path("en"), lang_dir.join("dict.txt"));
        assert_eq!(config.dict_path("pt"), dir.path().join("ppocrv5/ppocrv5_dict.txt"));
    }

    #[test]
    fn test_normalize_lang() {
        assert_eq!(normalize_lang(" EN ", "pt"), "en");
        assert_eq!(normalize_lang("", "pt"), "pt");
    }
}
