use super::session::OnnxModel;
use crate::image::ImagePreprocessor;
use crate::utils::error::AppError;
use crate::{Config, Result};
use image::{imageops, imageops::FilterType, RgbImage};
use ndarray::{s, Array2, ArrayD, ArrayView2, Axis, Ix2};
use std::collections::VecDeque;

/// 四点文本框，顺时针，从左上角开始
pub type Quad = [[f32; 2]; 4];

const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// DBNet后处理参数
#[derive(Debug, Clone)]
pub struct DbParams {
    pub thresh: f32,
    pub box_thresh: f32,
    pub unclip_ratio: f32,
    pub max_candidates: usize,
    pub min_size: f32,
}

impl Default for DbParams {
    fn default() -> Self {
        Self {
            thresh: 0.3,
            box_thresh: 0.6,
            unclip_ratio: 1.5,
            max_candidates: 1000,
            min_size: 3.0,
        }
    }
}

pub struct Detector {
    model: OnnxModel,
    limit_side: u32,
    params: DbParams,
}

impl Detector {
    pub fn new(config: &Config) -> Result<Self> {
        let model = OnnxModel::load(&config.det_model_path(), &config.onnx_config, "Detection")?;

        Ok(Self {
            model,
            limit_side: 960,
            params: DbParams::default(),
        })
    }

    /// 文字检测，返回原图坐标系下的文本框
    pub fn detect(&self, image: &RgbImage) -> Result<Vec<Quad>> {
        let (orig_w, orig_h) = image.dimensions();
        let (target_w, target_h) = detection_size(orig_w, orig_h, self.limit_side);
        let resized = imageops::resize(image, target_w, target_h, FilterType::Triangle);

        let input = ImagePreprocessor::to_normalized_chw(&resized, MEAN, STD, 0).insert_axis(Axis(0));
        let prediction = self.model.run(input)?;
        let prob = probability_map(&prediction)?;

        let scale_x = orig_w as f32 / target_w as f32;
        let scale_y = orig_h as f32 / target_h as f32;
        let boxes = boxes_from_prob_map(&prob, &self.params, (scale_x, scale_y), (orig_w, orig_h));

        tracing::debug!("Detected {} text boxes", boxes.len());
        Ok(boxes)
    }
}

/// 最长边不超过 `limit_side`，两边取整到32的倍数
fn detection_size(width: u32, height: u32, limit_side: u32) -> (u32, u32) {
    let max_side = width.max(height).max(1) as f32;
    let ratio = if max_side > limit_side as f32 {
        limit_side as f32 / max_side
    } else {
        1.0
    };

    let round32 = |v: u32| -> u32 {
        let scaled = (v as f32 * ratio / 32.0).round() as u32 * 32;
        scaled.max(32)
    };

    (round32(width), round32(height))
}

/// 支持 (batch, H, W) 与 (batch, C, H, W) 两种输出
fn probability_map(prediction: &ArrayD<f32>) -> Result<ArrayView2<'_, f32>> {
    let view = match prediction.ndim() {
        3 => prediction.slice(s![0, .., ..]).into_dyn(),
        4 => prediction.slice(s![0, 0, .., ..]).into_dyn(),
        _ => {
            return Err(AppError::Inference(format!(
                "Unsupported detection output shape: {:?}",
                prediction.shape()
            )))
        }
    };

    view.into_dimensionality::<Ix2>()
        .map_err(|e| AppError::Inference(format!("Invalid detection map: {}", e)))
}

/// 从概率图提取文本框 - 连通域 + 外接矩形 + unclip
pub fn boxes_from_prob_map(
    prob: &ArrayView2<f32>,
    params: &DbParams,
    scale: (f32, f32),
    bounds: (u32, u32),
) -> Vec<Quad> {
    let bitmap = prob.mapv(|p| p > params.thresh);
    let components = connected_components(&bitmap);
    tracing::debug!("Found {} candidate regions", components.len());

    let mut boxes = Vec::new();
    for component in components.iter().take(params.max_candidates) {
        let rect = Rect::enclosing(component);
        if rect.min_side() < params.min_size {
            continue;
        }

        if rect_score(prob, &rect) < params.box_thresh {
            continue;
        }

        let expanded = rect.unclip(params.unclip_ratio);
        if expanded.min_side() < params.min_size + 2.0 {
            continue;
        }

        boxes.push(expanded.scaled(scale, bounds));
    }

    boxes
}

/// 8连通区域
fn connected_components(bitmap: &Array2<bool>) -> Vec<Vec<(usize, usize)>> {
    let (height, width) = bitmap.dim();
    let mut visited = Array2::<bool>::default((height, width));
    let mut components = Vec::new();

    for y in 0..height {
        for x in 0..width {
            if !bitmap[[y, x]] || visited[[y, x]] {
                continue;
            }

            let mut pixels = Vec::new();
            let mut queue = VecDeque::from([(x, y)]);
            visited[[y, x]] = true;

            while let Some((cx, cy)) = queue.pop_front() {
                pixels.push((cx, cy));

                for ny in cy.saturating_sub(1)..=(cy + 1).min(height - 1) {
                    for nx in cx.saturating_sub(1)..=(cx + 1).min(width - 1) {
                        if bitmap[[ny, nx]] && !visited[[ny, nx]] {
                            visited[[ny, nx]] = true;
                            queue.push_back((nx, ny));
                        }
                    }
                }
            }

            if pixels.len() >= 4 {
                components.push(pixels);
            }
        }
    }

    components
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Rect {
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
}

impl Rect {
    fn enclosing(pixels: &[(usize, usize)]) -> Self {
        let mut rect = Rect {
            x0: f32::INFINITY,
            y0: f32::INFINITY,
            x1: f32::NEG_INFINITY,
            y1: f32::NEG_INFINITY,
        };
        for &(x, y) in pixels {
            rect.x0 = rect.x0.min(x as f32);
            rect.y0 = rect.y0.min(y as f32);
            rect.x1 = rect.x1.max(x as f32 + 1.0);
            rect.y1 = rect.y1.max(y as f32 + 1.0);
        }
        rect
    }

    fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    fn min_side(&self) -> f32 {
        self.width().min(self.height())
    }

    /// 按 `area * ratio / perimeter` 向外扩展
    fn unclip(&self, ratio: f32) -> Self {
        let perimeter = 2.0 * (self.width() + self.height());
        if perimeter <= 0.0 {
            return *self;
        }
        let distance = self.width() * self.height() * ratio / perimeter;
        Rect {
            x0: self.x0 - distance,
            y0: self.y0 - distance,
            x1: self.x1 + distance,
            y1: self.y1 + distance,
        }
    }

    fn scaled(&self, (sx, sy): (f32, f32), (max_w, max_h): (u32, u32)) -> Quad {
        let x0 = (self.x0 * sx).clamp(0.0, max_w as f32);
        let x1 = (self.x1 * sx).clamp(0.0, max_w as f32);
        let y0 = (self.y0 * sy).clamp(0.0, max_h as f32);
        let y1 = (self.y1 * sy).clamp(0.0, max_h as f32);
        [[x0, y0], [x1, y0], [x1, y1], [x0, y1]]
    }
}

/// 框内平均概率
fn rect_score(prob: &ArrayView2<f32>, rect: &Rect) -> f32 {
    let (height, width) = prob.dim();
    let x0 = (rect.x0.max(0.0) as usize).min(width - 1);
    let y0 = (rect.y0.max(0.0) as usize).min(height - 1);
    let x1 = (rect.x1.ceil() as usize).clamp(x0 + 1, width);
    let y1 = (rect.y1.ceil() as usize).clamp(y0 + 1, height);

    prob.slice(s![y0..y1, x0..x1]).mean().unwrap_or(0.0)
}
