use anyhow::Context;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};
use log::info;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Encodes an ordered image sequence as a looping GIF.
pub struct AnimationAssembler {
    delay_ms: u32,
    frames_dir: Option<PathBuf>,
}

impl AnimationAssembler {
    pub fn new(delay_ms: u32) -> Self {
        Self {
            delay_ms: delay_ms.max(1),
            frames_dir: None,
        }
    }

    /// Additionally write `frame_<index>.png` files into `dir`.
    pub fn with_frames_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.frames_dir = Some(dir.into());
        self
    }

    /// Returns the number of frames written.
    pub fn write(&self, images: &[RgbaImage], path: &Path) -> anyhow::Result<usize> {
        if images.is_empty() {
            anyhow::bail!("no frames to animate; every timestamp was skipped");
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating output folder {}", parent.display()))?;
        }

        if let Some(dir) = &self.frames_dir {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating frame folder {}", dir.display()))?;
            for (index, image) in images.iter().enumerate() {
                let frame_path = dir.join(format!("frame_{index:04}.png"));
                image
                    .save(&frame_path)
                    .with_context(|| format!("writing {}", frame_path.display()))?;
            }
        }

        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let mut encoder = GifEncoder::new(BufWriter::new(file));
        encoder
            .set_repeat(Repeat::Infinite)
            .context("configuring GIF loop")?;
        let delay = Delay::from_numer_denom_ms(self.delay_ms, 1);
        encoder
            .encode_frames(
                images
                    .iter()
                    .map(|image| Frame::from_parts(image.clone(), 0, 0, delay)),
            )
            .with_context(|| format!("encoding {}", path.display()))?;

        info!("wrote {} frames to {}", images.len(), path.display());
        Ok(images.len())
    }
}
