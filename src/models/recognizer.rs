use super::session::OnnxModel;
use crate::image::ImagePreprocessor;
use crate::utils::error::AppError;
use crate::{Config, Result};
use image::{imageops, imageops::FilterType, RgbImage};
use ndarray::{s, ArrayView2, Axis};
use std::fs;
use std::path::Path;

const REC_HEIGHT: u32 = 48;
const MIN_REC_WIDTH: u32 = 320;
const MAX_REC_WIDTH: u32 = 3200;

pub struct Recognizer {
    model: OnnxModel,
    dict: Vec<String>,
}

impl Recognizer {
    pub fn new(config: &Config, lang: &str) -> Result<Self> {
        let dict_path = config.dict_path(lang);
        let dict = load_dictionary(&dict_path)?;

        let model = OnnxModel::load(
            &config.rec_model_path(lang),
            &config.onnx_config,
            "Recognition",
        )?;

        tracing::info!(
            "Loaded dictionary for '{}' with {} characters (including blank)",
            lang,
            dict.len()
        );

        Ok(Self { model, dict })
    }

    /// 逐行识别，返回 (文本, 置信度)
    pub fn recognize(&self, crops: &[RgbImage]) -> Result<Vec<(String, f32)>> {
        crops.iter().map(|crop| self.recognize_single(crop)).collect()
    }

    fn recognize_single(&self, crop: &RgbImage) -> Result<(String, f32)> {
        let ratio = crop.width() as f32 / crop.height().max(1) as f32;
        let resized_w = ((REC_HEIGHT as f32 * ratio).ceil() as u32).clamp(1, MAX_REC_WIDTH);
        let resized = imageops::resize(crop, resized_w, REC_HEIGHT, FilterType::Triangle);

        // 归一化到[-1, 1]，右侧补0
        let input = ImagePreprocessor::to_normalized_chw(
            &resized,
            [0.5; 3],
            [0.5; 3],
            MIN_REC_WIDTH as usize,
        )
        .insert_axis(Axis(0));

        let prediction = self.model.run(input)?;
        if prediction.ndim() != 3 || prediction.shape()[0] != 1 {
            return Err(AppError::Inference(format!(
                "Expected prediction of shape (1, T, C), got {:?}",
                prediction.shape()
            )));
        }

        let probs = prediction.slice(s![0, .., ..]);
        if probs.shape()[1] != self.dict.len() {
            tracing::warn!(
                "Model vocab size ({}) != dict size ({})",
                probs.shape()[1],
                self.dict.len()
            );
        }

        Ok(ctc_decode(&self.dict, &probs))
    }
}

/// 字典：index 0 为CTC blank，末尾追加空格
pub fn load_dictionary(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(AppError::ModelLoad(format!(
            "Dictionary file not found: {}",
            path.display()
        )));
    }

    let content = fs::read_to_string(path)
        .map_err(|e| AppError::ModelLoad(format!("Failed to read dictionary: {}", e)))?;

    let mut dict = vec!["blank".to_string()];
    dict.extend(
        content
            .lines()
            .map(|line| line.trim_end_matches(['\r', '\n']))
            .filter(|line| !line.is_empty())
            .map(str::to_string),
    );
    dict.push(" ".to_string());

    Ok(dict)
}

/// 贪心CTC解码：逐帧取argmax，合并重复并去除blank，置信度为保留字符的平均概率
pub fn ctc_decode(dict: &[String], probs: &ArrayView2<f32>) -> (String, f32) {
    let mut text = String::new();
    let mut confidences = Vec::new();
    let mut previous = None;

    for frame in probs.outer_iter() {
        let (index, prob) = frame
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, p)| if p > best.1 { (i, p) } else { best });

        if index != 0 && previous != Some(index) {
            match dict.get(index) {
                Some(ch) => {
                    text.push_str(ch);
                    confidences.push(prob);
                }
                None => tracing::warn!(
                    "Character index {} out of dictionary bounds ({})",
                    index,
                    dict.len()
                ),
            }
        }
        previous = Some(index);
    }

    let confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f32>() / confidences.len() as f32
    };

    (text, confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;
    use std::io::Write;

    fn dict() -> Vec<String> {
        ["blank", "a", "b", " "].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_ctc_collapses_repeats_and_blanks() {
        // a a blank a b b
        let probs = arr2(&[
            [0.1, 0.8, 0.05, 0.05],
            [0.1, 0.6, 0.2, 0.1],
            [0.9, 0.05, 0.05, 0.0],
            [0.2, 0.7, 0.05, 0.05],
            [0.0, 0.1, 0.9, 0.0],
            [0.0, 0.1, 0.5, 0.4],
        ]);
        let (text, confidence) = ctc_decode(&dict(), &probs.view());
        assert_eq!(text, "aab");
        assert!((confidence - (0.8 + 0.7 + 0.9) / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_ctc_all_blank() {
        let probs = arr2(&[[0.9, 0.1, 0.0, 0.0], [0.8, 0.1, 0.1, 0.0]]);
        assert_eq!(ctc_decode(&dict(), &probs.view()), (String::new(), 0.0));
    }

    #[test]
    fn test_load_dictionary() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "a\r\nb\n\nç\n").unwrap();
        let dict = load_dictionary(file.path()).unwrap();
        assert_eq!(dict, vec!["blank", "a", "b", "ç", " "]);
    }

    #[test]
    fn test_missing_dictionary() {
        let err = load_dictionary(Path::new("/nonexistent/dict.txt")).unwrap_err();
        assert!(matches!(err, AppError::ModelLoad(_)));
    }
}
