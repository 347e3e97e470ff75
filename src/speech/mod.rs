//! 语音转写：引擎抽象与基于HTTP的Whisper后端

pub mod client;

pub use client::WhisperClient;

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 一段带时间戳的转写文本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transcription {
    pub segments: Vec<Segment>,
    /// 引擎检测到的语言
    pub language: String,
    /// 音频时长（秒）
    pub duration: f64,
}

impl Transcription {
    /// 各段文本直接拼接后去除首尾空白
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .map(|segment| segment.text.as_str())
            .collect::<String>()
            .trim()
            .to_string()
    }
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// `language` 为语言提示，如 "pt"
    async fn transcribe(&self, path: &Path, language: &str) -> Result<Transcription>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(text: &str) -> Segment {
        Segment {
            text: text.to_string(),
            start: 0.0,
            end: 1.0,
        }
    }

    #[test]
    fn test_text_joins_segments() {
        let transcription = Transcription {
            segments: vec![segment(" Olá"), segment(" mundo. ")],
            language: "pt".to_string(),
            duration: 2.5,
        };
        assert_eq!(transcription.text(), "Olá mundo.");
    }

    #[test]
    fn test_no_segments() {
        let transcription = Transcription {
            segments: Vec::new(),
            language: "pt".to_string(),
            duration: 0.0,
        };
        assert_eq!(transcription.text(), "");
    }
}
