//! Reader options and file format detection

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Options for dataset readers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    /// Maximum number of data rows used to infer column types
    pub type_inference_rows: usize,

    /// Distinct values a class table accepts before it locks
    pub lock_threshold: usize,

    /// Number of histogram bins per column
    pub histogram_bins: usize,

    /// Minimum seconds between two "lines parsed" progress messages
    pub progress_interval_secs: u64,
}

impl ReaderOptions {
    /// Progress interval as a duration
    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            type_inference_rows: 10,
            lock_threshold: 200,
            histogram_bins: 10,
            progress_interval_secs: 5,
        }
    }
}

/// Kind of content a file holds, judged by its name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Delimited tabular text (`.csv`)
    Tabular,
    /// Timeseries text (`.ts`)
    Timeseries,
    /// Image file inside an archive
    Image,
}

/// File format detection utilities
pub struct FileFormat;

impl FileFormat {
    /// Detect the format of a file based on its extension
    ///
    /// Compressed variants (`.csv.gz`, `.ts.bz2`) are recognised by the
    /// inner extension; decompression happens before parsing.
    pub fn detect_from_path(path: &Path) -> Option<SourceFormat> {
        let extension = path.extension()?.to_str()?.to_lowercase();

        match extension.as_str() {
            "csv" => Some(SourceFormat::Tabular),
            "ts" => Some(SourceFormat::Timeseries),
            "jpg" | "jpeg" | "png" | "gif" | "bmp" | "tiff" => Some(SourceFormat::Image),
            "gz" | "gzip" | "bz2" => {
                // Look at the file stem
                let stem = Path::new(path.file_stem()?);
                match Self::detect_from_path(stem)? {
                    SourceFormat::Image => None,
                    format => Some(format),
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("data.csv" => Some(SourceFormat::Tabular))]
    #[test_case("DATA.CSV" => Some(SourceFormat::Tabular))]
    #[test_case("data.csv.gz" => Some(SourceFormat::Tabular))]
    #[test_case("series.ts" => Some(SourceFormat::Timeseries))]
    #[test_case("series.ts.bz2" => Some(SourceFormat::Timeseries))]
    #[test_case("cats/1.png" => Some(SourceFormat::Image))]
    #[test_case("photo.png.gz" => None)]
    #[test_case("notes.txt" => None)]
    #[test_case("archive.gz" => None)]
    fn test_detect_from_path(path: &str) -> Option<SourceFormat> {
        FileFormat::detect_from_path(Path::new(path))
    }

    #[test]
    fn test_partial_options() {
        let options: ReaderOptions = serde_json::from_str(r#"{"lock_threshold": 5}"#).unwrap();
        assert_eq!(options.lock_threshold, 5);
        assert_eq!(options.type_inference_rows, 10);
        assert_eq!(options.progress_interval(), Duration::from_secs(5));
    }
}
