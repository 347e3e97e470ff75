use super::extractors::MediaUpload;
use super::AppState;
use crate::image::{ImageLoader, ImagePreprocessor};
use crate::normalize::{summarize, OcrText, RawValue, RecognizedLine};
use crate::ocr::OcrInput;
use crate::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;

const IMAGE_DECODE_FAILED: &str = "image_decode_failed";

#[derive(Debug, Default, Deserialize)]
pub struct OcrParams {
    pub lang: Option<String>,
    pub debug: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TranscribeParams {
    pub language: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// `/ocr` 响应，出错时仍返回200，错误写入 `error`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResponse {
    pub raw_text: String,
    pub lines: Vec<RecognizedLine>,
    pub lang: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_summary: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<ImageSize>,
}

impl OcrResponse {
    fn failed(lang: String, error: impl Into<String>) -> Self {
        Self {
            raw_text: String::new(),
            lines: Vec::new(),
            lang,
            error: Some(error.into()),
            result_type: None,
            result_summary: None,
            image_size: None,
        }
    }
}

/// `/transcribe` 响应
#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub language: String,
    /// 秒；失败时为整数0
    pub duration: serde_json::Number,
    pub text: String,
}

impl TranscribeResponse {
    fn failed(language: String, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            language,
            duration: serde_json::Number::from(0),
            text: String::new(),
        }
    }
}

/// 服务信息
pub async fn root_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "OCR API",
        "endpoints": {
            "ocr": "/ocr",
            "transcribe": "/transcribe",
            "docs": "/docs"
        }
    }))
}

/// 健康检查端点
pub async fn health_handler(State(state): State<AppState>) -> Response {
    match state.models.health_check() {
        Ok(stats) => Json(json!({
            "status": "healthy",
            "models": {
                "whisper": "available",
                "paddleocr": "available"
            },
            "loaded": stats,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }))
        .into_response(),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "error": e.to_string()
                })),
            )
                .into_response()
        }
    }
}

/// OCR上传处理器
pub async fn ocr_handler(
    State(state): State<AppState>,
    Query(params): Query<OcrParams>,
    upload: MediaUpload,
) -> Json<OcrResponse> {
    let start_time = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();

    // multipart字段优先于查询参数
    let lang = upload
        .field("lang")
        .map(str::to_string)
        .or(params.lang)
        .unwrap_or_else(|| state.config.default_lang.clone());
    let debug_flag = upload
        .field("debug")
        .or(params.debug.as_deref())
        .map(parse_flag)
        .unwrap_or(false);

    tracing::info!(
        "Processing OCR request: request_id={}, lang={}, debug={}, bytes={}",
        request_id,
        lang,
        debug_flag,
        upload.data.len()
    );

    let response = match run_ocr(&state, &upload, &lang, debug_flag).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("OCR failed: request_id={}, error={}", request_id, e);
            OcrResponse::failed(lang, e.to_string())
        }
    };

    tracing::info!(
        "OCR completed: request_id={}, lines={}, time={:.3}s",
        request_id,
        response.lines.len(),
        start_time.elapsed().as_secs_f32()
    );

    Json(response)
}

async fn run_ocr(
    state: &AppState,
    upload: &MediaUpload,
    lang: &str,
    debug: bool,
) -> Result<OcrResponse> {
    // 临时文件在本函数返回时删除
    let tmp = upload.persist(".png")?;
    let path = tmp.path().to_path_buf();
    let models = state.models.clone();
    let lang = lang.to_string();

    tokio::task::spawn_blocking(move || -> Result<OcrResponse> {
        let image = match ImageLoader::from_path(&path) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!("Failed to decode upload: {}", e);
                return Ok(OcrResponse::failed(lang, IMAGE_DECODE_FAILED));
            }
        };
        let image = ImagePreprocessor::enhance_for_ocr(image);
        let image_size = ImageSize {
            width: image.width(),
            height: image.height(),
        };

        let engine = models.ocr(&lang)?;
        let raw = engine
            .recognize(OcrInput::Image(&image))
            .or_else(|e| {
                tracing::warn!("OCR on decoded image failed ({}), retrying with file path", e);
                engine.recognize(OcrInput::Path(&path))
            })?;

        Ok(build_ocr_response(&raw, lang, debug.then_some(image_size)))
    })
    .await?
}

/// 调试模式下附带原始结果的类型、摘要与图像尺寸
fn build_ocr_response(raw: &RawValue, lang: String, image_size: Option<ImageSize>) -> OcrResponse {
    let OcrText { raw_text, lines } = OcrText::from_raw(raw);
    let debug = image_size.is_some();

    OcrResponse {
        raw_text,
        lines,
        lang,
        error: None,
        result_type: debug.then(|| raw.type_name().to_string()),
        result_summary: debug.then(|| summarize(raw)),
        image_size,
    }
}

/// 语音转写处理器
pub async fn transcribe_handler(
    State(state): State<AppState>,
    Query(params): Query<TranscribeParams>,
    upload: MediaUpload,
) -> Json<TranscribeResponse> {
    let start_time = Instant::now();
    let language = upload
        .field("language")
        .map(str::to_string)
        .or(params.language)
        .unwrap_or_else(|| state.config.default_lang.clone());

    tracing::info!(
        "Processing transcription request: language={}, bytes={}",
        language,
        upload.data.len()
    );

    let response = match run_transcription(&state, &upload, &language).await {
        Ok(response) => {
            tracing::info!(
                "Transcription completed: duration={}s, chars={}, time={:.3}s",
                response.duration,
                response.text.chars().count(),
                start_time.elapsed().as_secs_f32()
            );
            response
        }
        Err(e) => {
            tracing::error!("Transcription failed: {}", e);
            TranscribeResponse::failed(language, e.to_string())
        }
    };

    Json(response)
}

async fn run_transcription(
    state: &AppState,
    upload: &MediaUpload,
    language: &str,
) -> Result<TranscribeResponse> {
    let tmp = upload.persist(".wav")?;
    let models = state.models.clone();
    let transcriber = tokio::task::spawn_blocking(move || models.transcriber()).await??;

    let transcription = transcriber.transcribe(tmp.path(), language).await?;
    Ok(TranscribeResponse {
        error: None,
        text: transcription.text(),
        language: transcription.language,
        duration: serde_json::Number::from_f64(transcription.duration)
            .unwrap_or_else(|| serde_json::Number::from(0)),
    })
}

/// "true" / "1" / "yes" / "on"，不区分大小写
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
