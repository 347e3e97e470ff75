pub mod classifier;
pub mod detector;
pub mod manager;
pub mod recognizer;
mod session;

pub use classifier::Classifier;
pub use detector::{Detector, Quad};
pub use manager::{ModelManager, ModelStats};
pub use recognizer::Recognizer;
