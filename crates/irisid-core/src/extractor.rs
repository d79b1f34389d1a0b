use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};
use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::segmentation::SegmentedIris;

/// Size the normalized iris strip is resampled to before encoding.
pub const DEFAULT_CROP_WIDTH: u32 = 200;
pub const DEFAULT_CROP_HEIGHT: u32 = 64;
pub const DEFAULT_LBP_ZONES: usize = 8;
const LBP_BINS: usize = 256;

/// Clockwise from the top-left neighbour; the first neighbour lands in the
/// most significant bit.
const NEIGHBOURS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
];

/// Maps a segmented iris to a fixed-length feature vector.
pub trait FeatureExtractor {
    fn extract(&self, iris: &SegmentedIris) -> AppResult<Vec<f64>>;
}

/// Zoned histogram of uniform local binary patterns.
///
/// When the segmenter supplied a normalized mask, only pixels where the mask
/// is non-zero are counted, which keeps eyelids and lashes out of the zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LbpExtractor {
    width: u32,
    height: u32,
    zones: usize,
}

impl LbpExtractor {
    pub fn new(zones: usize) -> AppResult<Self> {
        Self::with_size(DEFAULT_CROP_WIDTH, DEFAULT_CROP_HEIGHT, zones)
    }

    pub fn with_size(width: u32, height: u32, zones: usize) -> AppResult<Self> {
        if width == 0 || height == 0 {
            return Err(AppError::InvalidSetting {
                setting: "LBP crop size",
                message: format!("{width}x{height} has a zero side"),
            });
        }
        if zones == 0 || zones > height as usize {
            return Err(AppError::InvalidSetting {
                setting: "LBP zones",
                message: format!("expected between 1 and {height} zones, found {zones}"),
            });
        }
        Ok(Self {
            width,
            height,
            zones,
        })
    }

    /// Length of every vector this extractor produces.
    pub fn dimension(&self) -> usize {
        self.zones * LBP_BINS
    }

    fn resize_mask(&self, mask: &DynamicImage) -> Vec<bool> {
        mask.resize_exact(self.width, self.height, FilterType::Nearest)
            .to_luma8()
            .pixels()
            .map(|pixel| pixel[0] > 0)
            .collect()
    }
}

impl Default for LbpExtractor {
    fn default() -> Self {
        Self {
            width: DEFAULT_CROP_WIDTH,
            height: DEFAULT_CROP_HEIGHT,
            zones: DEFAULT_LBP_ZONES,
        }
    }
}

impl FeatureExtractor for LbpExtractor {
    fn extract(&self, iris: &SegmentedIris) -> AppResult<Vec<f64>> {
        let crop = &iris.normalized;
        if crop.width() == 0 || crop.height() == 0 {
            return Err(AppError::InvalidFeatures {
                message: "normalized crop is empty".into(),
            });
        }

        let gray = crop
            .resize_exact(self.width, self.height, FilterType::Triangle)
            .to_luma8();
        let (codes, uniform) = lbp_codes(&gray);
        let mask = iris
            .normalized_mask
            .as_ref()
            .filter(|mask| mask.width() > 0 && mask.height() > 0)
            .map(|mask| self.resize_mask(mask));

        let width = self.width as usize;
        let rows_per_zone = self.height as usize / self.zones;
        let mut features = vec![0.0; self.dimension()];
        for (zone, histogram) in features.chunks_mut(LBP_BINS).enumerate() {
            let first = zone * rows_per_zone * width;
            let last = first + rows_per_zone * width;
            for idx in first..last {
                let visible = mask.as_ref().map_or(true, |mask| mask[idx]);
                if uniform[idx] && visible {
                    histogram[codes[idx] as usize] += 1.0;
                }
            }
            normalize(histogram);
        }

        debug!(
            width = crop.width(),
            height = crop.height(),
            masked = mask.is_some(),
            dimension = features.len(),
            "extracted LBP features"
        );
        Ok(features)
    }
}

/// Per-pixel LBP code and whether that code is uniform (at most two circular
/// 0/1 transitions). Neighbours outside the image count as 0.
fn lbp_codes(image: &GrayImage) -> (Vec<u8>, Vec<bool>) {
    let (width, height) = image.dimensions();
    let mut codes = Vec::with_capacity((width * height) as usize);
    let mut uniform = Vec::with_capacity((width * height) as usize);

    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let center = image.get_pixel(x as u32, y as u32)[0];
            let mut code = 0u8;
            for (bit, (dx, dy)) in NEIGHBOURS.iter().enumerate() {
                let (nx, ny) = (x + dx, y + dy);
                let inside = nx >= 0 && ny >= 0 && nx < width as i64 && ny < height as i64;
                if inside && image.get_pixel(nx as u32, ny as u32)[0] > center {
                    code |= 1 << (7 - bit);
                }
            }
            codes.push(code);
            uniform.push((code ^ code.rotate_left(1)).count_ones() <= 2);
        }
    }

    (codes, uniform)
}

fn normalize(histogram: &mut [f64]) {
    let norm = histogram.iter().map(|value| value * value).sum::<f64>().sqrt();
    if norm > 0.0 {
        histogram.iter_mut().for_each(|value| *value /= norm);
    }
}
