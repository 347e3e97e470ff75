use crate::config::normalize_lang;
use crate::ocr::{OcrEngine, PaddleOcr};
use crate::speech::{Transcriber, WhisperClient};
use crate::utils::error::AppError;
use crate::{Config, Result};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub type OcrFactory = dyn Fn(&Config, &str) -> Result<Arc<dyn OcrEngine>> + Send + Sync;
pub type TranscriberFactory = dyn Fn(&Config) -> Result<Arc<dyn Transcriber>> + Send + Sync;

/// 模型管理器：按语言懒加载OCR引擎，转写引擎全局唯一
///
/// 同一语言的首次并发请求可能重复构建引擎，后写入者生效，
/// 两个实例功能等价，因此不在构建期间持锁。
pub struct ModelManager {
    config: Config,
    ocr_by_lang: RwLock<HashMap<String, Arc<dyn OcrEngine>>>,
    transcriber: OnceCell<Arc<dyn Transcriber>>,
    ocr_factory: Box<OcrFactory>,
    transcriber_factory: Box<TranscriberFactory>,
}

impl ModelManager {
    /// 使用PP-OCR ONNX模型与Whisper HTTP后端
    pub fn new(config: Config) -> Self {
        Self::with_factories(
            config,
            |config, lang| Ok(Arc::new(PaddleOcr::load(config, lang)?) as Arc<dyn OcrEngine>),
            |config| Ok(Arc::new(WhisperClient::new(&config.whisper_config)?) as Arc<dyn Transcriber>),
        )
    }

    pub fn with_factories<O, T>(config: Config, ocr_factory: O, transcriber_factory: T) -> Self
    where
        O: Fn(&Config, &str) -> Result<Arc<dyn OcrEngine>> + Send + Sync + 'static,
        T: Fn(&Config) -> Result<Arc<dyn Transcriber>> + Send + Sync + 'static,
    {
        Self {
            config,
            ocr_by_lang: RwLock::new(HashMap::new()),
            transcriber: OnceCell::new(),
            ocr_factory: Box::new(ocr_factory),
            transcriber_factory: Box::new(transcriber_factory),
        }
    }

    /// 获取指定语言的OCR引擎（阻塞调用，首次会加载模型）
    pub fn ocr(&self, lang: &str) -> Result<Arc<dyn OcrEngine>> {
        let lang = normalize_lang(lang, &self.config.default_lang);

        if let Some(engine) = self.ocr_by_lang.read().get(&lang) {
            return Ok(Arc::clone(engine));
        }

        tracing::info!("Loading OCR engine for language: {}", lang);
        let engine = (self.ocr_factory)(&self.config, &lang).map_err(|e| {
            tracing::error!("Failed to load OCR engine for {}: {}", lang, e);
            e
        })?;
        tracing::info!("OCR engine for {} loaded successfully", lang);

        self.ocr_by_lang.write().insert(lang, Arc::clone(&engine));
        Ok(engine)
    }

    /// 获取转写引擎
    pub fn transcriber(&self) -> Result<Arc<dyn Transcriber>> {
        self.transcriber
            .get_or_try_init(|| {
                tracing::info!("Initializing transcription engine...");
                (self.transcriber_factory)(&self.config)
            })
            .map(Arc::clone)
    }

    /// 健康检查：模型目录必须存在
    pub fn health_check(&self) -> Result<ModelStats> {
        if !self.config.models_dir.is_dir() {
            return Err(AppError::Config(format!(
                "Models directory not found: {}",
                self.config.models_dir.display()
            )));
        }

        Ok(self.stats())
    }

    /// 获取模型统计信息
    pub fn stats(&self) -> ModelStats {
        let mut loaded_languages: Vec<String> = self.ocr_by_lang.read().keys().cloned().collect();
        loaded_languages.sort();

        ModelStats {
            loaded_languages,
            transcriber_loaded: self.transcriber.get().is_some(),
            detector_available: self.config.det_model_path().exists(),
            intra_threads: self.config.onnx_config.intra_threads,
            optimization_level: self.config.onnx_config.optimization_level,
        }
    }
}

/// 模型统计信息
#[derive(Debug, Clone, serde::Serialize)]
pub struct ModelStats {
    pub loaded_languages: Vec<String>,
    pub transcriber_loaded: bool,
    pub detector_available: bool,
    pub intra_threads: usize,
    pub optimization_level: i32,
}
