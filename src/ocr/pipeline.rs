use super::{OcrEngine, OcrInput, OcrPage};
use crate::image::ImageLoader;
use crate::models::{Classifier, Detector, Quad, Recognizer};
use crate::normalize::RawValue;
use crate::{Config, Result};
use image::{imageops, RgbImage};
use std::cmp::Ordering;
use std::time::Instant;

/// 同一行文本框的纵向中心容差（像素）
const LINE_TOLERANCE: f32 = 10.0;

/// PP-OCR 流水线：检测 → 裁剪 → 方向分类 → 识别
pub struct PaddleOcr {
    lang: String,
    detector: Detector,
    classifier: Option<Classifier>,
    recognizer: Recognizer,
    drop_score: f32,
}

impl PaddleOcr {
    pub fn load(config: &Config, lang: &str) -> Result<Self> {
        let detector = Detector::new(config)?;
        let recognizer = Recognizer::new(config, lang)?;

        let classifier = if config.onnx_config.use_textline_orientation
            && config.cls_model_path().exists()
        {
            match Classifier::new(config) {
                Ok(classifier) => Some(classifier),
                Err(e) => {
                    tracing::warn!("Textline orientation classifier unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            lang: lang.to_string(),
            detector,
            classifier,
            recognizer,
            drop_score: config.onnx_config.drop_score,
        })
    }

    fn run(&self, image: &RgbImage) -> Result<OcrPage> {
        let start = Instant::now();

        let mut boxes = self.detector.detect(image)?;
        sort_reading_order(&mut boxes);

        let (boxes, crops): (Vec<Quad>, Vec<RgbImage>) = boxes
            .into_iter()
            .filter_map(|quad| crop_quad(image, &quad).map(|crop| (quad, crop)))
            .unzip();

        let crops = match &self.classifier {
            Some(classifier) => classifier.correct(crops)?,
            None => crops,
        };

        let recognized = self.recognizer.recognize(&crops)?;

        let mut page = OcrPage::default();
        for (quad, (text, score)) in boxes.into_iter().zip(recognized) {
            if score >= self.drop_score {
                page.push(text, score, quad);
            }
        }

        if page.is_empty() {
            tracing::debug!("OCR [{}] found no text above score {}", self.lang, self.drop_score);
        }

        tracing::info!(
            "OCR [{}] completed: detected={}, kept={}, time={:.3}s",
            self.lang,
            crops.len(),
            page.len(),
            start.elapsed().as_secs_f32()
        );

        Ok(page)
    }
}

impl OcrEngine for PaddleOcr {
    fn recognize(&self, input: OcrInput<'_>) -> Result<RawValue> {
        let image = match input {
            OcrInput::Image(image) => image.to_rgb8(),
            OcrInput::Path(path) => ImageLoader::from_path(path)?.to_rgb8(),
        };

        let page = self.run(&image)?;
        Ok(RawValue::Sequence(vec![RawValue::object(page)]))
    }
}

/// 自上而下、同一行内自左而右
fn sort_reading_order(boxes: &mut [Quad]) {
    let center_y = |quad: &Quad| (quad[0][1] + quad[2][1]) / 2.0;

    boxes.sort_by(|a, b| center_y(a).total_cmp(&center_y(b)));

    // 同一行内按左上角x坐标调整
    for i in 1..boxes.len() {
        let mut j = i;
        while j > 0
            && (center_y(&boxes[j]) - center_y(&boxes[j - 1])).abs() < LINE_TOLERANCE
            && boxes[j][0][0].total_cmp(&boxes[j - 1][0][0]) == Ordering::Less
        {
            boxes.swap(j, j - 1);
            j -= 1;
        }
    }
}

/// 按外接矩形裁剪，竖排文本旋转为横排
fn crop_quad(image: &RgbImage, quad: &Quad) -> Option<RgbImage> {
    let (width, height) = image.dimensions();
    let xs = quad.iter().map(|p| p[0]);
    let ys = quad.iter().map(|p| p[1]);

    let x0 = xs.clone().fold(f32::INFINITY, f32::min).max(0.0).floor() as u32;
    let x1 = (xs.fold(f32::NEG_INFINITY, f32::max).ceil() as u32).min(width);
    let y0 = ys.clone().fold(f32::INFINITY, f32::min).max(0.0).floor() as u32;
    let y1 = (ys.fold(f32::NEG_INFINITY, f32::max).ceil() as u32).min(height);

    if x1 <= x0 || y1 <= y0 {
        tracing::warn!("Skipping degenerate text box: {:?}", quad);
        return None;
    }

    let crop = imageops::crop_imm(image, x0, y0, x1 - x0, y1 - y0).to_image();
    if crop.height() as f32 >= crop.width() as f32 * 1.5 {
        Some(imageops::rotate270(&crop))
    } else {
        Some(crop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(x: f32, y: f32, w: f32, h: f32) -> Quad {
        [[x, y], [x + w, y], [x + w, y + h], [x, y + h]]
    }

    #[test]
    fn test_reading_order() {
        let mut boxes = vec![
            quad(300.0, 52.0, 80.0, 20.0),
            quad(10.0, 100.0, 80.0, 20.0),
            quad(10.0, 50.0, 80.0, 20.0),
            quad(150.0, 48.0, 80.0, 20.0),
        ];
        sort_reading_order(&mut boxes);

        let starts: Vec<[f32; 2]> = boxes.iter().map(|q| q[0]).collect();
        assert_eq!(
            starts,
            vec![[10.0, 50.0], [150.0, 48.0], [300.0, 52.0], [10.0, 100.0]]
        );
    }

    #[test]
    fn test_crop_clamped_to_image() {
        let image = RgbImage::new(100, 50);
        let crop = crop_quad(&image, &quad(-5.0, 10.0, 60.0, 20.0)).unwrap();
        assert_eq!(crop.dimensions(), (55, 20));

        let crop = crop_quad(&image, &quad(80.0, 40.0, 40.0, 20.0)).unwrap();
        assert_eq!(crop.dimensions(), (20, 10));
    }

    #[test]
    fn test_vertical_crop_rotated() {
        let image = RgbImage::new(100, 100);
        let crop = crop_quad(&image, &quad(10.0, 10.0, 10.0, 40.0)).unwrap();
        assert_eq!(crop.dimensions(), (40, 10));
    }

    #[test]
    fn test_degenerate_crop_skipped() {
        let image = RgbImage::new(100, 100);
        assert!(crop_quad(&image, &quad(120.0, 10.0, 10.0, 10.0)).is_none());
    }
}
