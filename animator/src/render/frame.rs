use crate::workflow::config::{RenderConfig, RenderField};
use anyhow::Context;
use image::{Rgba, RgbaImage};
use krigcore::processing::VolumeEstimate;
use ndarray::ArrayView2;

/// Viridis anchor colours, low to high.
const VIRIDIS: [[u8; 3]; 5] = [
    [68, 1, 84],
    [59, 82, 139],
    [33, 145, 140],
    [94, 201, 98],
    [253, 231, 37],
];

const TARGET_IMAGE_PIXELS: u32 = 320;

/// Maps a value in `[0, 1]` onto the colormap.
pub fn colormap(t: f64) -> Rgba<u8> {
    if !t.is_finite() {
        return Rgba([0, 0, 0, 0]);
    }
    let scaled = t.clamp(0.0, 1.0) * (VIRIDIS.len() - 1) as f64;
    let lower = (scaled.floor() as usize).min(VIRIDIS.len() - 2);
    let frac = scaled - lower as f64;
    let (a, b) = (VIRIDIS[lower], VIRIDIS[lower + 1]);
    let channel = |c: usize| (a[c] as f64 + (b[c] as f64 - a[c] as f64) * frac).round() as u8;
    Rgba([channel(0), channel(1), channel(2), 255])
}

/// Draws one elevation plane of a [`VolumeEstimate`] as an RGBA raster.
///
/// Colours are normalised to a fixed range so that frames of one run share
/// a scale. x runs left to right and y bottom to top.
pub struct FrameRenderer {
    slice: usize,
    field: RenderField,
    min_cell_pixels: u32,
    range: (f64, f64),
}

impl FrameRenderer {
    pub fn new(config: &RenderConfig, range: (f64, f64)) -> Self {
        Self {
            slice: config.slice,
            field: config.field,
            min_cell_pixels: config.min_cell_pixels.max(1),
            range,
        }
    }

    /// Renderer whose colour range spans the selected plane across all `volumes`.
    pub fn for_volumes(config: &RenderConfig, volumes: &[VolumeEstimate]) -> Self {
        let mut renderer = Self::new(config, (0.0, 1.0));
        let (lo, hi) = volumes
            .iter()
            .filter_map(|v| renderer.plane(v))
            .flat_map(|plane| plane.iter().copied().collect::<Vec<_>>())
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |acc, v| (acc.0.min(v), acc.1.max(v)));
        if lo <= hi {
            renderer.range = (lo, hi);
        }
        renderer
    }

    pub fn range(&self) -> (f64, f64) {
        self.range
    }

    fn plane<'a>(&self, volume: &'a VolumeEstimate) -> Option<ArrayView2<'a, f64>> {
        match self.field {
            RenderField::Value => volume.value_slice(self.slice),
            RenderField::Variance => volume.variance_slice(self.slice),
        }
    }

    fn normalise(&self, value: f64) -> f64 {
        let (lo, hi) = self.range;
        if hi > lo {
            (value - lo) / (hi - lo)
        } else {
            0.5
        }
    }

    pub fn render(&self, volume: &VolumeEstimate) -> anyhow::Result<RgbaImage> {
        let plane = self.plane(volume).with_context(|| {
            format!(
                "slice {} is outside a volume of shape {:?}",
                self.slice,
                volume.shape()
            )
        })?;
        let (nx, ny) = plane.dim();
        let cells = nx.max(ny).max(1) as u32;
        let cell = (TARGET_IMAGE_PIXELS / cells).max(self.min_cell_pixels);
        let (width, height) = (nx as u32 * cell, ny as u32 * cell);

        let image = RgbaImage::from_fn(width, height, |px, py| {
            let i = (px / cell) as usize;
            // Row 0 of the image is the top, i.e. the largest y.
            let j = ny - 1 - (py / cell) as usize;
            colormap(self.normalise(plane[[i, j]]))
        });
        Ok(image)
    }
}
