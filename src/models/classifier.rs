use super::session::OnnxModel;
use crate::image::ImagePreprocessor;
use crate::utils::error::AppError;
use crate::{Config, Result};
use image::{imageops, imageops::FilterType, RgbImage};
use ndarray::Axis;

/// 文本行方向分类器（0° / 180°）
pub struct Classifier {
    model: OnnxModel,
    input_size: (u32, u32), // (H, W)
    thresh: f32,
}

impl Classifier {
    pub fn new(config: &Config) -> Result<Self> {
        let model = OnnxModel::load(
            &config.cls_model_path(),
            &config.onnx_config,
            "Classification",
        )?;

        Ok(Self {
            model,
            input_size: (48, 192),
            thresh: 0.9,
        })
    }

    /// 将判定为倒置的文本行旋转180度
    pub fn correct(&self, crops: Vec<RgbImage>) -> Result<Vec<RgbImage>> {
        crops
            .into_iter()
            .map(|crop| {
                let scores = self.classify_single(&crop)?;
                Ok(if is_upside_down(&scores, self.thresh) {
                    imageops::rotate180(&crop)
                } else {
                    crop
                })
            })
            .collect()
    }

    fn classify_single(&self, crop: &RgbImage) -> Result<Vec<f32>> {
        let (target_h, target_w) = self.input_size;
        let ratio = crop.width() as f32 / crop.height().max(1) as f32;
        let resized_w = ((target_h as f32 * ratio).ceil() as u32).clamp(1, target_w);
        let resized = imageops::resize(crop, resized_w, target_h, FilterType::Triangle);

        let input =
            ImagePreprocessor::to_normalized_chw(&resized, [0.5; 3], [0.5; 3], target_w as usize)
                .insert_axis(Axis(0));
        let prediction = self.model.run(input)?;

        if prediction.ndim() != 2 || prediction.shape()[0] != 1 {
            return Err(AppError::Inference(format!(
                "Unexpected classification output shape: {:?}",
                prediction.shape()
            )));
        }

        Ok(prediction.iter().copied().collect())
    }
}

/// 类别顺序为 ["0", "180"]
fn is_upside_down(scores: &[f32], thresh: f32) -> bool {
    match scores {
        [upright, flipped, ..] => flipped > upright && *flipped >= thresh,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_decision() {
        assert!(is_upside_down(&[0.05, 0.95], 0.9));
        assert!(!is_upside_down(&[0.15, 0.85], 0.9));
        assert!(!is_upside_down(&[0.95, 0.05], 0.9));
        assert!(!is_upside_down(&[], 0.9));
    }
}
