pub mod pipeline;
pub mod types;

pub use pipeline::PaddleOcr;
pub use types::OcrPage;

use crate::normalize::RawValue;
use crate::Result;
use image::DynamicImage;
use std::path::Path;

/// OCR引擎输入：解码后的图像，或由引擎自行读取的文件
#[derive(Debug, Clone, Copy)]
pub enum OcrInput<'a> {
    Image(&'a DynamicImage),
    Path(&'a Path),
}

/// OCR引擎，输出形状由具体实现决定，交给 [`crate::normalize`] 处理
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, input: OcrInput<'_>) -> Result<RawValue>;
}
