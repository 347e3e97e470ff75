pub mod config;
pub mod image;
pub mod models;
pub mod normalize;
pub mod ocr;
pub mod speech;
pub mod utils;
pub mod web;

// 重新导出主要类型
pub use config::Config;
pub use normalize::{normalize, OcrText, RawValue, RecognizedLine};
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
