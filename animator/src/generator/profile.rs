use anyhow::Context;
use krigcore::dataset::{PodDataset, PodRecord, SpatialDataset, Timestamp, REQUIRED_COLUMNS};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Configuration for generating a synthetic pod network.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub pods: usize,
    pub timestamps: usize,
    /// Seconds between consecutive readings.
    pub interval: f64,
    /// Site centre as (longitude, latitude, elevation).
    pub center: [f64; 3],
    /// Full site extent per axis.
    pub extent: [f64; 3],
    pub background: f64,
    pub plume_amplitude: f64,
    pub noise: f64,
    /// Probability that a reading carries a NaN estimate.
    pub gap_probability: f64,
    /// Probability that a pod skips a timestamp entirely.
    pub dropout_probability: f64,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            pods: 8,
            timestamps: 12,
            interval: 60.0,
            center: [-104.8218, 40.5889, 5096.0],
            extent: [0.0199, 0.0141, 89.0],
            background: 2.0,
            plume_amplitude: 20.0,
            noise: 0.25,
            gap_probability: 0.05,
            dropout_probability: 0.03,
            seed: 0,
        }
    }
}

impl GeneratorConfig {
    fn normalized_pods(&self) -> usize {
        self.pods.max(3)
    }

    fn normalized_timestamps(&self) -> usize {
        self.timestamps.max(1)
    }
}

/// Gaussian plume whose centre drifts across the site over the run.
fn plume(config: &GeneratorConfig, position: [f64; 3], progress: f64) -> f64 {
    let drift = [
        config.center[0] + config.extent[0] * (progress - 0.5) * 0.6,
        config.center[1] + config.extent[1] * (0.25 - progress * 0.5) * 0.6,
        config.center[2] - config.extent[2] * 0.25,
    ];
    let dist_sq: f64 = (0..3)
        .map(|axis| ((position[axis] - drift[axis]) / (config.extent[axis] * 0.35)).powi(2))
        .sum();
    config.background + config.plume_amplitude * (-dist_sq).exp()
}

pub fn build_dataset(config: &GeneratorConfig) -> anyhow::Result<SpatialDataset> {
    let pods = config.normalized_pods();
    let timestamps = config.normalized_timestamps();

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut dataset = SpatialDataset::new();

    for pod_index in 0..pods {
        let position: [f64; 3] = std::array::from_fn(|axis| {
            config.center[axis] + config.extent[axis] * rng.gen_range(-0.5..0.5)
        });
        let mut pod = PodDataset::new(format!("YPOD{:02}", pod_index + 1));

        for step in 0..timestamps {
            // The first reading is always present so every pod has a position.
            if step > 0 && rng.gen_bool(config.dropout_probability.clamp(0.0, 1.0)) {
                continue;
            }
            let progress = step as f64 / timestamps.max(2).saturating_sub(1) as f64;
            let jitter = if config.noise > 0.0 {
                rng.gen_range(-config.noise..config.noise)
            } else {
                0.0
            };
            let estimate = if step > 0 && rng.gen_bool(config.gap_probability.clamp(0.0, 1.0)) {
                f64::NAN
            } else {
                plume(config, position, progress) + jitter
            };
            pod.push(PodRecord {
                time: Timestamp::from_seconds(step as f64 * config.interval),
                estimate,
                latitude: position[1],
                longitude: position[0],
                elevation: position[2],
            });
        }
        dataset.insert(pod);
    }

    Ok(dataset)
}

/// Writes one `<pod><suffix>` file per pod in the ingestion format.
pub fn write_dataset(dataset: &SpatialDataset, dir: &Path, suffix: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating synthetic data folder {}", dir.display()))?;
    for pod in dataset.pods() {
        let path = dir.join(format!("{}{}", pod.name, suffix));
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", REQUIRED_COLUMNS.join(","))?;
        for record in pod.records() {
            writeln!(
                writer,
                "{},{},{},{},{},{}",
                pod.name,
                record.time.label,
                record.estimate,
                record.latitude,
                record.longitude,
                record.elevation
            )?;
        }
        writer
            .flush()
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}
