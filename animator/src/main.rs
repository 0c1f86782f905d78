use anyhow::Context;
use clap::Parser;
use generator::profile::{build_dataset, write_dataset, GeneratorConfig};
use krigcore::dataset::{PodReader, SpatialDataset};
use krigcore::processing::{Bounds3, GridConfig, ModelKind, VariogramModel};
use log::info;
use rayon::prelude::*;
use render::{AnimationAssembler, FrameRenderer};
use std::path::PathBuf;
use workflow::config::{RenderField, WorkflowConfig};
use workflow::report::RunReport;
use workflow::runner::Runner;

mod generator;
mod render;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Kriges pod sensor readings into an animated volume slice")]
struct Args {
    /// Load a workflow config from YAML; flags below override it
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Folder of per-pod `<name><suffix>` files
    #[arg(long)]
    data_dir: Option<PathBuf>,
    #[arg(long)]
    suffix: Option<String>,
    /// Field separator of the pod files
    #[arg(long)]
    delimiter: Option<char>,
    /// Auto grid: cells per axis between the observed extrema
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"])]
    cells: Option<Vec<usize>>,
    #[arg(long)]
    margin_cells: Option<usize>,
    /// Bounded grid: min_x min_y min_z max_x max_y max_z (needs --spacing)
    #[arg(long, num_args = 6, allow_negative_numbers = true, requires = "spacing")]
    bounds: Option<Vec<f64>>,
    #[arg(long, num_args = 3, value_names = ["DX", "DY", "DZ"], requires = "bounds")]
    spacing: Option<Vec<f64>>,
    /// linear, spherical, exponential or gaussian
    #[arg(long)]
    model: Option<ModelKind>,
    /// Skip fitting and krige with a flat-nugget linear model of this slope
    #[arg(long)]
    fixed_slope: Option<f64>,
    #[arg(long)]
    nlags: Option<usize>,
    #[arg(long)]
    output: Option<PathBuf>,
    /// Write a JSON run report here
    #[arg(long)]
    report: Option<PathBuf>,
    /// Elevation index of the rendered plane
    #[arg(long)]
    slice: Option<usize>,
    /// Render kriging variance instead of predicted values
    #[arg(long, default_value_t = false)]
    variance: bool,
    /// Also keep one PNG per frame in `<output>_frames/`
    #[arg(long, default_value_t = false)]
    keep_frames: bool,
    #[arg(long)]
    delay_ms: Option<u32>,
    /// Use a generated pod network instead of reading files
    #[arg(long, default_value_t = false)]
    synthetic: bool,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Write the generated network as pod files into this folder
    #[arg(long, requires = "synthetic")]
    write_synthetic: Option<PathBuf>,
}

impl Args {
    fn cells(&self) -> Option<[usize; 3]> {
        self.cells.as_ref().map(|c| [c[0], c[1], c[2]])
    }

    /// Base configuration: the workflow file if given, else the flags alone.
    fn base_config(&self) -> anyhow::Result<WorkflowConfig> {
        match &self.workflow {
            Some(path) => WorkflowConfig::load(path),
            None => Ok(WorkflowConfig::from_args(
                self.data_dir.clone(),
                self.cells().unwrap_or([5, 5, 5]),
                self.model.unwrap_or_default(),
            )),
        }
    }

    fn apply(&self, config: &mut WorkflowConfig) -> anyhow::Result<()> {
        if let Some(dir) = &self.data_dir {
            config.data_dir = Some(dir.clone());
        }
        if let Some(suffix) = &self.suffix {
            config.file_suffix = suffix.clone();
        }
        if let Some(delimiter) = self.delimiter {
            config.delimiter = delimiter;
        }
        if let (Some(bounds), Some(spacing)) = (&self.bounds, &self.spacing) {
            config.grid = GridConfig::Bounded {
                bounds: Bounds3 {
                    min: [bounds[0], bounds[1], bounds[2]],
                    max: [bounds[3], bounds[4], bounds[5]],
                },
                spacing: [spacing[0], spacing[1], spacing[2]],
            };
        } else if self.cells.is_some() || self.margin_cells.is_some() {
            let (mut cells, mut margin_cells) = match config.grid {
                GridConfig::Auto {
                    cells,
                    margin_cells,
                } => (cells, margin_cells),
                GridConfig::Bounded { .. } => {
                    anyhow::bail!("--cells/--margin-cells need an auto grid; drop --bounds or the YAML grid")
                }
            };
            if let Some(c) = self.cells() {
                cells = c;
            }
            if let Some(m) = self.margin_cells {
                margin_cells = m;
            }
            config.grid = GridConfig::Auto {
                cells,
                margin_cells,
            };
        }
        if let Some(model) = self.model {
            config.variogram.model = model;
        }
        if let Some(slope) = self.fixed_slope {
            config.variogram.fixed = Some(VariogramModel::Linear { nugget: 0.0, slope });
        }
        if let Some(nlags) = self.nlags {
            config.variogram.nlags = nlags;
        }
        if let Some(output) = &self.output {
            config.output = output.clone();
        }
        if let Some(report) = &self.report {
            config.report = Some(report.clone());
        }
        if let Some(slice) = self.slice {
            config.render.slice = slice;
        }
        if self.variance {
            config.render.field = RenderField::Variance;
        }
        if self.keep_frames {
            config.render.keep_frames = true;
        }
        if let Some(delay) = self.delay_ms {
            config.render.frame_delay_ms = delay;
        }
        Ok(())
    }

    fn dataset(&self, config: &WorkflowConfig) -> anyhow::Result<SpatialDataset> {
        if self.synthetic {
            let dataset = build_dataset(&GeneratorConfig {
                seed: self.seed,
                ..Default::default()
            })?;
            if let Some(dir) = &self.write_synthetic {
                write_dataset(&dataset, dir, &config.file_suffix)?;
                info!("wrote {} synthetic pods to {}", dataset.pod_count(), dir.display());
            }
            return Ok(dataset);
        }
        let dir = config
            .data_dir
            .as_ref()
            .context("no pod folder given; pass --data-dir, set data_dir in the workflow, or use --synthetic")?;
        let dataset = PodReader::new(config.file_suffix.clone())
            .with_delimiter(config.delimiter_byte()?)
            .read_dir(dir)
            .with_context(|| format!("loading pods from {}", dir.display()))?;
        Ok(dataset)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = args.base_config()?;
    args.apply(&mut config)?;

    let dataset = args.dataset(&config)?;
    info!(
        "loaded {} pods: {}",
        dataset.pod_count(),
        dataset.pod_names().join(", ")
    );

    let result = Runner::new(config.clone()).execute(&dataset)?;

    let renderer = FrameRenderer::for_volumes(&config.render, &result.volumes);
    let images = result
        .volumes
        .par_iter()
        .map(|volume| renderer.render(volume))
        .collect::<anyhow::Result<Vec<_>>>()
        .context("rendering frames")?;

    let mut assembler = AnimationAssembler::new(config.render.frame_delay_ms);
    if config.render.keep_frames {
        let mut frames_dir = config.output.clone().into_os_string();
        frames_dir.push("_frames");
        assembler = assembler.with_frames_dir(frames_dir);
    }
    // Report skipped frames even when nothing could be animated.
    let written = assembler.write(&images, &config.output);
    let rendered = written.as_ref().map_or(0, |count| *count);

    let report = RunReport::from_result(&result, rendered, &config.output);
    println!("{}", report.summary());
    if let Some(path) = &config.report {
        report.write(path)?;
    }

    written.map(|_| ())
}
