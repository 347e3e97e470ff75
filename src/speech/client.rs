use super::{Segment, Transcriber, Transcription};
use crate::config::WhisperConfig;
use crate::utils::error::AppError;
use crate::Result;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const TRANSCRIPTIONS_PATH: &str = "/v1/audio/transcriptions";

/// OpenAI兼容的Whisper转写服务客户端（faster-whisper-server、whisper.cpp server等）
pub struct WhisperClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl WhisperClient {
    pub fn new(config: &WhisperConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(AppError::Config("Whisper base URL is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()?;

        let endpoint = format!(
            "{}{}",
            config.base_url.trim_end_matches('/'),
            TRANSCRIPTIONS_PATH
        );
        tracing::info!("Whisper backend: {} (model: {})", endpoint, config.model);

        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl Transcriber for WhisperClient {
    async fn transcribe(&self, path: &Path, language: &str) -> Result<Transcription> {
        let audio = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("audio.wav")
            .to_string();

        tracing::debug!("Sending {} bytes of audio to {}", audio.len(), self.endpoint);

        let form = Form::new()
            .part("file", Part::bytes(audio).file_name(file_name))
            .text("model", self.model.clone())
            .text("language", language.to_string())
            .text("response_format", "verbose_json");

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Transcription(format!(
                "Backend returned {}: {}",
                status, body
            )));
        }

        let body: WhisperResponse = response.json().await?;
        Ok(body.into_transcription(language))
    }
}

/// `verbose_json` 响应，段落的其他字段（tokens、avg_logprob等）忽略
#[derive(Debug, Deserialize)]
struct WhisperResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    segments: Vec<Segment>,
}

impl WhisperResponse {
    fn into_transcription(self, requested_language: &str) -> Transcription {
        let duration = self
            .duration
            .or_else(|| self.segments.last().map(|segment| segment.end))
            .unwrap_or(0.0);

        let segments = match (self.segments.is_empty(), self.text) {
            // 仅返回整段文本的后端
            (true, Some(text)) if !text.trim().is_empty() => vec![Segment {
                text,
                start: 0.0,
                end: duration,
            }],
            _ => self.segments,
        };

        Transcription {
            segments,
            language: self
                .language
                .filter(|language| !language.is_empty())
                .unwrap_or_else(|| requested_language.to_string()),
            duration,
        }
    }
}
