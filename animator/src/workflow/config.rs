use anyhow::Context;
use krigcore::dataset::DEFAULT_POD_SUFFIX;
use krigcore::processing::{GridConfig, ModelKind, VariogramSettings, DEFAULT_MARGIN_CELLS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Which volume of an estimate is drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderField {
    #[default]
    Value,
    Variance,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Elevation index of the rendered plane.
    pub slice: usize,
    pub field: RenderField,
    pub frame_delay_ms: u32,
    /// Also write one PNG per frame next to the animation.
    pub keep_frames: bool,
    pub min_cell_pixels: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            slice: 0,
            field: RenderField::Value,
            frame_delay_ms: 100,
            keep_frames: false,
            min_cell_pixels: 8,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub data_dir: Option<PathBuf>,
    pub file_suffix: String,
    /// Single-byte field separator of the pod files.
    pub delimiter: char,
    pub grid: GridConfig,
    pub variogram: VariogramSettings,
    pub render: RenderConfig,
    pub output: PathBuf,
    pub report: Option<PathBuf>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            file_suffix: DEFAULT_POD_SUFFIX.to_string(),
            delimiter: ',',
            grid: GridConfig::default(),
            variogram: VariogramSettings::default(),
            render: RenderConfig::default(),
            output: PathBuf::from("kriging.gif"),
            report: None,
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    /// Pod file delimiter as a byte; only ASCII separators are accepted.
    pub fn delimiter_byte(&self) -> anyhow::Result<u8> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            anyhow::bail!("delimiter `{}` is not a single ASCII character", self.delimiter)
        }
    }

    /// Auto-grid configuration with everything else left at defaults.
    pub fn from_args(data_dir: Option<PathBuf>, cells: [usize; 3], model: ModelKind) -> Self {
        Self {
            data_dir,
            grid: GridConfig::Auto {
                cells,
                margin_cells: DEFAULT_MARGIN_CELLS,
            },
            variogram: VariogramSettings {
                model,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}
