use crate::dataset::observation::Timestamp;
use crate::dataset::pod::{PodDataset, PodRecord, SpatialDataset};
use crate::prelude::{KrigeError, KrigeResult};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

/// Columns every pod file must carry.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "podName",
    "time",
    "estimate",
    "latitude",
    "longitude",
    "elevation",
];

/// Suffix stripped from pod filenames to obtain the pod name.
pub const DEFAULT_POD_SUFFIX: &str = "_Field.txt";

/// Reads a folder of per-pod delimited files into a [`SpatialDataset`].
#[derive(Debug, Clone)]
pub struct PodReader {
    suffix: String,
    delimiter: u8,
}

impl Default for PodReader {
    fn default() -> Self {
        Self::new(DEFAULT_POD_SUFFIX)
    }
}

impl PodReader {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Pod name for a file, or `None` if the file does not carry the suffix.
    pub fn pod_name(&self, path: &Path) -> Option<String> {
        let file_name = path.file_name()?.to_str()?;
        let name = file_name.strip_suffix(self.suffix.as_str())?;
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }

    pub fn read_dir(&self, dir: &Path) -> KrigeResult<SpatialDataset> {
        let entries = fs::read_dir(dir).map_err(|e| KrigeError::ingestion(dir, e.to_string()))?;

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| KrigeError::ingestion(dir, e.to_string()))?;
            let path = entry.path();
            if path.is_file() && self.pod_name(&path).is_some() {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(KrigeError::ingestion(
                dir,
                format!("no pod files ending in `{}`", self.suffix),
            ));
        }

        let mut dataset = SpatialDataset::new();
        for path in files {
            let name = self
                .pod_name(&path)
                .ok_or_else(|| KrigeError::ingestion(&path, "not a pod file"))?;
            let pod = self.read_pod(&path, &name)?;
            debug!("pod {} -> {} records", name, pod.len());
            dataset.insert(pod);
        }

        info!(
            "ingested {} pods from {}",
            dataset.pod_count(),
            dir.display()
        );
        Ok(dataset)
    }

    pub fn read_pod(&self, path: &Path, name: &str) -> KrigeResult<PodDataset> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.delimiter)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| KrigeError::ingestion(path, e.to_string()))?;

        let headers = reader
            .headers()
            .map_err(|e| KrigeError::ingestion(path, format!("unreadable header: {e}")))?
            .clone();

        let mut columns = [0usize; 6];
        for (slot, column) in columns.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| KrigeError::ingestion(path, format!("missing column `{column}`")))?;
        }
        let [_, time_idx, estimate_idx, lat_idx, lon_idx, elev_idx] = columns;

        let mut pod = PodDataset::new(name);
        for (row_idx, result) in reader.records().enumerate() {
            // Header is line 1.
            let line = row_idx + 2;
            let record = result
                .map_err(|e| KrigeError::ingestion(path, format!("line {line}: {e}")))?;
            let field = |idx: usize| record.get(idx).unwrap_or("");

            let time = Timestamp::parse(field(time_idx)).ok_or_else(|| {
                KrigeError::ingestion(
                    path,
                    format!("line {line}: unrecognised time `{}`", field(time_idx)),
                )
            })?;

            pod.push(PodRecord {
                time,
                estimate: parse_numeric(field(estimate_idx), path, line, "estimate")?,
                latitude: parse_numeric(field(lat_idx), path, line, "latitude")?,
                longitude: parse_numeric(field(lon_idx), path, line, "longitude")?,
                elevation: parse_numeric(field(elev_idx), path, line, "elevation")?,
            });
        }

        Ok(pod)
    }
}

/// Parses a numeric field; blank and NaN markers become NaN.
fn parse_numeric(text: &str, path: &Path, line: usize, column: &str) -> KrigeResult<f64> {
    match text {
        "" | "NaN" | "nan" | "NA" | "N/A" => Ok(f64::NAN),
        other => other.parse::<f64>().map_err(|_| {
            KrigeError::ingestion(
                path,
                format!("line {line}: `{other}` is not a number in column `{column}`"),
            )
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "podName,time,estimate,latitude,longitude,elevation\n";

    fn write_pod(dir: &Path, file: &str, body: &str) {
        let mut handle = fs::File::create(dir.join(file)).unwrap();
        handle.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn reads_pods_and_strips_suffix() {
        let dir = tempfile::tempdir().unwrap();
        write_pod(
            dir.path(),
            "YPODA2_Field.txt",
            &format!(
                "{HEADER}YPODA2,0,10.0,40.58,-104.82,5100\n\
                 YPODA2,60,,40.58,-104.82,5100\n\
                 YPODA2,120,NA,40.58,-104.82,5100\n\
                 YPODA2,180,N/A,40.58,-104.82,5100\n\
                 YPODA2,240,12.5,nan,-104.82,NaN\n"
            ),
        );
        write_pod(
            dir.path(),
            "YPODB5_Field.txt",
            &format!("{HEADER}YPODB5,0,20.0,40.59,-104.82,5110\n"),
        );
        write_pod(dir.path(), "notes.md", "not a pod");

        let dataset = PodReader::default().read_dir(dir.path()).unwrap();
        assert_eq!(dataset.pod_names(), vec!["YPODA2", "YPODB5"]);

        let frames = dataset.frames();
        assert_eq!(frames.len(), 5);
        assert_eq!(frames[0].observations[0].value, 10.0);
        for frame in &frames[1..4] {
            assert!(frame.observations[0].value.is_nan(), "{}", frame.timestamp.label);
            assert_eq!(frame.observations[0].y, 40.58);
        }
        let last = frames[4].observations[0];
        assert_eq!(last.value, 12.5);
        assert!(last.y.is_nan());
        assert!(last.z.is_nan());
        assert_eq!(last.x, -104.82);
        assert!(frames[1].observations[1].has_gap());
    }

    #[test]
    fn custom_delimiter_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        write_pod(
            dir.path(),
            "P7.csv",
            "podName;time;estimate;latitude;longitude;elevation\n\
             P7;0;4.25;40.58;-104.82;5100\n",
        );
        let reader = PodReader::new(".csv").with_delimiter(b';');
        let dataset = reader.read_dir(dir.path()).unwrap();
        let pod = dataset.pods().next().unwrap();
        assert_eq!(pod.name, "P7");
        assert_eq!(pod.records().next().unwrap().estimate, 4.25);

        // The default comma reader sees a single unknown column.
        assert!(PodReader::new(".csv").read_dir(dir.path()).is_err());
    }

    #[test]
    fn extra_columns_are_ignored_and_order_is_free() {
        let dir = tempfile::tempdir().unwrap();
        write_pod(
            dir.path(),
            "P1_Field.txt",
            "time,humidity,elevation,longitude,latitude,estimate,podName\n\
             2022-06-10 06:21:41,55,5100,-104.82,40.58,3.5,P1\n",
        );
        let pod = PodReader::default()
            .read_pod(&dir.path().join("P1_Field.txt"), "P1")
            .unwrap();
        let record = pod.records().next().unwrap();
        assert_eq!(record.estimate, 3.5);
        assert_eq!(record.longitude, -104.82);
        assert_eq!(record.time.label, "2022-06-10 06:21:41");
    }

    #[test]
    fn missing_column_is_an_ingestion_error() {
        let dir = tempfile::tempdir().unwrap();
        write_pod(
            dir.path(),
            "P1_Field.txt",
            "podName,time,estimate,latitude,longitude\nP1,0,1,40.5,-104.8\n",
        );
        let err = PodReader::default().read_dir(dir.path()).unwrap_err();
        assert!(matches!(err, KrigeError::Ingestion { .. }));
        assert!(err.to_string().contains("elevation"));
    }

    #[test]
    fn malformed_number_is_an_ingestion_error() {
        let dir = tempfile::tempdir().unwrap();
        write_pod(
            dir.path(),
            "P1_Field.txt",
            &format!("{HEADER}P1,0,ten,40.58,-104.82,5100\n"),
        );
        let err = PodReader::default().read_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn empty_or_missing_folder_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(PodReader::default().read_dir(dir.path()).is_err());
        assert!(PodReader::default()
            .read_dir(&dir.path().join("absent"))
            .is_err());
    }
}
