use super::value::RawValue;
use super::walker::{normalize, Candidate};
use serde::{Deserialize, Serialize};

/// 归一化后的识别行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedLine {
    pub text: String,
    pub confidence: f64,
}

/// OCR文本输出
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrText {
    /// 所有行按顺序以换行连接
    pub raw_text: String,
    pub lines: Vec<RecognizedLine>,
}

impl OcrText {
    pub fn from_raw(raw: &RawValue) -> Self {
        collect_lines(normalize(raw))
    }
}

/// 分数转换为浮点数，无法解析时为 0.0
pub fn coerce_score(score: &RawValue) -> f64 {
    let value = match score {
        RawValue::Number(n) => *n,
        RawValue::Bool(true) => 1.0,
        RawValue::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    };

    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// 裁剪文本、丢弃空行并保持产出顺序
pub fn collect_lines<I>(candidates: I) -> OcrText
where
    I: IntoIterator<Item = Candidate>,
{
    let lines: Vec<RecognizedLine> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let text = candidate.text?.trim().to_string();
            if text.is_empty() {
                return None;
            }
            Some(RecognizedLine {
                text,
                confidence: coerce_score(&candidate.score),
            })
        })
        .collect();

    let raw_text = lines
        .iter()
        .map(|line| line.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    OcrText { raw_text, lines }
}
