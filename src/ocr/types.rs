use crate::models::Quad;
use crate::normalize::{ConversionError, RawValue, RecognitionObject};
use serde::Serialize;

/// 单张图像的PP-OCR识别结果
///
/// 与新版PaddleOCR的结果对象一致，以 `rec_texts` / `rec_scores` / `rec_polys`
/// 属性提供数据，同时支持转换为映射。
#[derive(Debug, Clone, Default, Serialize)]
pub struct OcrPage {
    pub rec_texts: Vec<String>,
    pub rec_scores: Vec<f32>,
    pub rec_polys: Vec<Quad>,
}

impl OcrPage {
    pub fn push(&mut self, text: String, score: f32, poly: Quad) {
        self.rec_texts.push(text);
        self.rec_scores.push(score);
        self.rec_polys.push(poly);
    }

    pub fn len(&self) -> usize {
        self.rec_texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rec_texts.is_empty()
    }

    fn polys(&self) -> RawValue {
        RawValue::Sequence(
            self.rec_polys
                .iter()
                .map(|quad| {
                    RawValue::Sequence(
                        quad.iter()
                            .map(|[x, y]| RawValue::from(vec![*x, *y]))
                            .collect(),
                    )
                })
                .collect(),
        )
    }
}

impl RecognitionObject for OcrPage {
    fn type_name(&self) -> &str {
        "OcrPage"
    }

    fn attribute(&self, name: &str) -> Option<RawValue> {
        match name {
            "rec_texts" => Some(self.rec_texts.clone().into()),
            "rec_scores" => Some(self.rec_scores.clone().into()),
            "rec_polys" => Some(self.polys()),
            _ => None,
        }
    }

    fn attribute_names(&self) -> Vec<String> {
        vec!["rec_texts".into(), "rec_scores".into(), "rec_polys".into()]
    }

    fn to_mapping(&self) -> Option<Result<RawValue, ConversionError>> {
        Some(Ok(RawValue::mapping([
            ("rec_texts", self.rec_texts.clone().into()),
            ("rec_scores", self.rec_scores.clone().into()),
            ("rec_polys", self.polys()),
        ])))
    }

    fn fields(&self) -> Option<Vec<(String, RawValue)>> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => {
                Some(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{summarize, OcrText};

    fn page() -> OcrPage {
        let mut page = OcrPage::default();
        let quad = [[0.0, 0.0], [10.0, 0.0], [10.0, 5.0], [0.0, 5.0]];
        page.push("Hello".to_string(), 0.99, quad);
        page.push("  ".to_string(), 0.6, quad);
        page.push("World".to_string(), 0.75, quad);
        page
    }

    #[test]
    fn test_page_normalizes_through_attributes() {
        let raw = RawValue::from(vec![RawValue::object(page())]);
        let text = OcrText::from_raw(&raw);
        assert_eq!(text.raw_text, "Hello\nWorld");
        assert_eq!(text.lines.len(), 2);
        assert!((text.lines[1].confidence - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_page_mapping() {
        let mapping = page().to_mapping().unwrap().unwrap();
        assert_eq!(mapping.get("rec_texts").and_then(RawValue::as_sequence).map(<[_]>::len), Some(3));
        assert_eq!(mapping.get("rec_polys").unwrap().as_sequence().unwrap()[0].as_sequence().unwrap().len(), 4);
    }

    #[test]
    fn test_page_preview_shows_contents() {
        let summary = summarize(&RawValue::from(vec![RawValue::object(page())]));
        assert_eq!(summary["firstType"], "OcrPage");
        let preview = summary["firstPreview"].as_str().unwrap();
        assert!(preview.contains("\"rec_texts\":[\"Hello\",\"  \",\"World\"]"));
        assert!(preview.contains("rec_polys"));
    }

    #[test]
    fn test_page_summary() {
        let summary = summarize(&RawValue::object(page()));
        assert_eq!(summary["kind"], "object");
        assert_eq!(summary["type"], "OcrPage");
        assert_eq!(summary["attrs"][0], "rec_texts");
    }
}
