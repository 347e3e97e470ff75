//! OCR识别结果归一化
//!
//! 不同版本的OCR引擎输出形状各不相同：纯字符串、单行字典、并行数组、
//! 嵌套容器、带属性的结果对象以及旧版 `[box, (text, score)]` 对。
//! 这里把它们统一展开为有序的 (text, score) 候选，再整理为识别行。
//! 遍历不返回错误，无法识别的形状只是不产出任何内容。

mod lines;
mod summary;
mod value;
mod walker;

pub use lines::{coerce_score, collect_lines, OcrText, RecognizedLine};
pub use summary::summarize;
pub use value::{ConversionError, RawValue, RecognitionObject, SerializedObject};
pub use walker::{normalize, Candidate, Candidates};
