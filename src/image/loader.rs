use crate::utils::error::AppError;
use crate::Result;
use image::{DynamicImage, GenericImageView};
use std::path::Path;

/// 解码后图像的最大边长
const MAX_SIDE: u32 = 8192;

pub struct ImageLoader;

impl ImageLoader {
    /// 从字节加载图像，格式按内容判断
    pub fn from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(AppError::InvalidInput("Empty image data".to_string()));
        }

        let image = image::load_from_memory(bytes)?;
        Self::validate_dimensions(&image)?;

        Ok(image)
    }

    /// 从文件路径加载图像（上传的临时文件后缀不可信，不按扩展名解码）
    pub fn from_path(path: &Path) -> Result<DynamicImage> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// 验证图像尺寸
    pub fn validate_dimensions(image: &DynamicImage) -> Result<()> {
        let (width, height) = image.dimensions();

        if width == 0 || height == 0 {
            return Err(AppError::InvalidInput(format!(
                "Image has no pixels: {}x{}",
                width, height
            )));
        }

        if width > MAX_SIDE || height > MAX_SIDE {
            return Err(AppError::InvalidInput(format!(
                "Image too large: {}x{}, maximum {}x{}",
                width, height, MAX_SIDE, MAX_SIDE
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_load_png() {
        let bytes = png_bytes(40, 20);
        assert_eq!(image::guess_format(&bytes).ok(), Some(ImageFormat::Png));
        let image = ImageLoader::from_bytes(&bytes).unwrap();
        assert_eq!(image.dimensions(), (40, 20));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            ImageLoader::from_bytes(b"not an image"),
            Err(AppError::ImageDecode(_))
        ));
        assert!(matches!(
            ImageLoader::from_bytes(b""),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_from_path_ignores_extension() {
        let mut file = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
        std::io::Write::write_all(&mut file, &png_bytes(8, 8)).unwrap();
        let image = ImageLoader::from_path(file.path()).unwrap();
        assert_eq!(image.dimensions(), (8, 8));
    }
}
