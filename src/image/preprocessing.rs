use image::{imageops, imageops::FilterType, DynamicImage, RgbImage};
use ndarray::Array3;

/// 小于该宽度的图像会被放大
const MIN_OCR_WIDTH: u32 = 1200;
/// 线性对比度增益
const CONTRAST_GAIN: f32 = 1.35;

pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// OCR前的轻量预处理：小图放大 + 对比度增强，输出RGB
    pub fn enhance_for_ocr(image: DynamicImage) -> DynamicImage {
        let mut rgb = image.to_rgb8();

        if let Some(scale) = Self::upscale_factor(rgb.width()) {
            let (w, h) = rgb.dimensions();
            tracing::debug!("Upscaling {}x{} by {}", w, h, scale);
            rgb = imageops::resize(&rgb, w * scale, h * scale, FilterType::CatmullRom);
        }

        Self::apply_gain(&mut rgb, CONTRAST_GAIN);
        DynamicImage::ImageRgb8(rgb)
    }

    /// 宽度不足时的放大倍数，限制在 2..=4
    pub fn upscale_factor(width: u32) -> Option<u32> {
        if width >= MIN_OCR_WIDTH {
            return None;
        }
        let scale = (MIN_OCR_WIDTH as f32 / width.max(1) as f32).ceil() as u32;
        Some(scale.clamp(2, 4))
    }

    /// 饱和线性增益
    pub fn apply_gain(image: &mut RgbImage, alpha: f32) {
        for pixel in image.pixels_mut() {
            for channel in pixel.0.iter_mut() {
                *channel = (*channel as f32 * alpha).round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    /// 转换为CHW张量：`(x / 255 - mean) / std`，右侧以0填充到 `target_width`
    pub fn to_normalized_chw(
        image: &RgbImage,
        mean: [f32; 3],
        std: [f32; 3],
        target_width: usize,
    ) -> Array3<f32> {
        let (width, height) = (image.width() as usize, image.height() as usize);
        let padded_width = target_width.max(width);
        let mut tensor = Array3::<f32>::zeros((3, height, padded_width));

        for (x, y, pixel) in image.enumerate_pixels() {
            for c in 0..3 {
                let value = pixel.0[c] as f32 / 255.0;
                tensor[[c, y as usize, x as usize]] = (value - mean[c]) / std[c];
            }
        }

        tensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb};

    #[test]
    fn test_upscale_factor() {
        assert_eq!(ImagePreprocessor::upscale_factor(1200), None);
        assert_eq!(ImagePreprocessor::upscale_factor(2000), None);
        assert_eq!(ImagePreprocessor::upscale_factor(1000), Some(2));
        assert_eq!(ImagePreprocessor::upscale_factor(500), Some(3));
        assert_eq!(ImagePreprocessor::upscale_factor(100), Some(4));
        assert_eq!(ImagePreprocessor::upscale_factor(0), Some(4));
    }

    #[test]
    fn test_gain_saturates() {
        let mut image = RgbImage::from_pixel(1, 1, Rgb([100, 200, 0]));
        ImagePreprocessor::apply_gain(&mut image, 1.35);
        assert_eq!(image.get_pixel(0, 0).0, [135, 255, 0]);
    }

    #[test]
    fn test_enhance_for_ocr_upscales_small_images() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(300, 50));
        let enhanced = ImagePreprocessor::enhance_for_ocr(image);
        assert_eq!(enhanced.dimensions(), (1200, 200));

        let image = DynamicImage::ImageRgb8(RgbImage::new(1600, 50));
        assert_eq!(ImagePreprocessor::enhance_for_ocr(image).dimensions(), (1600, 50));
    }

    #[test]
    fn test_normalized_chw_padding() {
        let image = RgbImage::from_pixel(2, 1, Rgb([255, 0, 255]));
        let tensor = ImagePreprocessor::to_normalized_chw(&image, [0.5; 3], [0.5; 3], 4);
        assert_eq!(tensor.dim(), (3, 1, 4));
        assert_eq!(tensor[[0, 0, 0]], 1.0);
        assert_eq!(tensor[[1, 0, 1]], -1.0);
        assert_eq!(tensor[[2, 0, 3]], 0.0);
    }
}
