//! Raw text sources and file/archive dispatch

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use ml_prep_core::metadata::{ImagesMetadata, MetadataDetails};
use ml_prep_core::notify::plural;
use ml_prep_core::{Dataset, DatasetMetadata, Error, Notifier, Result};

use crate::common::{FileFormat, ReaderOptions, SourceFormat};
use crate::csv::TabularParser;
use crate::timeseries::TimeseriesParser;

/// Decoded text of one file, split into lines
///
/// Consumed once by a parser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSource {
    lines: Vec<String>,
    size: Option<u64>,
}

impl RawSource {
    /// Split text into lines; `\n`, `\r\n` and `\r` all end a line
    pub fn from_text(text: &str) -> Self {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
        let mut lines: Vec<String> = normalized.split('\n').map(str::to_string).collect();
        if lines.last().is_some_and(String::is_empty) {
            lines.pop();
        }
        Self {
            lines,
            size: Some(text.len() as u64),
        }
    }

    /// Read a whole UTF-8 stream
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Ok(Self::from_text(&text))
    }

    /// Lines in order
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Size of the decoded text in bytes
    pub fn size(&self) -> Option<u64> {
        self.size
    }
}

/// A dataset parsed from a file, plus its metadata
///
/// Image archives have metadata but no dataset.
#[derive(Debug, Clone)]
pub struct ParsedSource {
    /// Parsed data, absent for image archives
    pub dataset: Option<Dataset>,

    /// Derived metadata
    pub metadata: DatasetMetadata,
}

/// One member of an extracted archive
#[derive(Debug, Clone)]
pub struct ArchiveMember {
    /// Path inside the archive
    pub path: PathBuf,

    /// Decoded contents; empty for images
    pub source: RawSource,
}

impl ArchiveMember {
    /// Create a new archive member
    pub fn new(path: impl Into<PathBuf>, source: RawSource) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

/// Parse a single file, choosing the parser from its name
pub fn parse_file(
    path: &Path,
    source: &RawSource,
    options: &ReaderOptions,
    notifier: &dyn Notifier,
) -> Result<ParsedSource> {
    let (dataset, mut metadata) = match FileFormat::detect_from_path(path) {
        Some(SourceFormat::Tabular) => {
            let (data, meta) = TabularParser::new(options.clone()).parse(source, notifier)?;
            (Dataset::Tabular(data), meta)
        }
        Some(SourceFormat::Timeseries) => {
            let (data, meta) = TimeseriesParser::new(options.clone()).parse(source, notifier)?;
            (Dataset::Timeseries(data), meta)
        }
        _ => {
            let message = "Unknown file format.";
            notifier.send(message);
            return Err(Error::InvalidDataFile(message.to_string()));
        }
    };
    metadata.size = source.size();
    Ok(ParsedSource {
        dataset: Some(dataset),
        metadata,
    })
}

/// Parse an extracted archive
///
/// The first timeseries or CSV member wins. Without one, images are counted
/// per class directory.
pub fn parse_archive(
    members: &[ArchiveMember],
    options: &ReaderOptions,
    notifier: &dyn Notifier,
) -> Result<ParsedSource> {
    for member in members {
        let display = member.path.display();
        match FileFormat::detect_from_path(&member.path) {
            Some(SourceFormat::Timeseries) => {
                notifier.send(&format!("Timeseries data {display} unpacked. Parsing..."));
            }
            Some(SourceFormat::Tabular) => {
                notifier.send(&format!("CSV file {display} unpacked."));
            }
            _ => continue,
        }
        let mut parsed = parse_file(&member.path, &member.source, options, notifier)?;
        parsed.metadata.archive_path = Some(member.path.to_string_lossy().into_owned());
        return Ok(parsed);
    }

    let mut classes: BTreeMap<String, u64> = BTreeMap::new();
    let mut found = 0;
    for member in members {
        if FileFormat::detect_from_path(&member.path) != Some(SourceFormat::Image) {
            continue;
        }
        if let Some(class) = image_class(&member.path) {
            *classes.entry(class).or_insert(0) += 1;
            found += 1;
        }
    }
    if found == 0 {
        let message = "This file doesn't contain a supported data format.";
        notifier.send(message);
        return Err(Error::InvalidDataFile(message.to_string()));
    }

    notifier.send(&format!("{} found.", plural(found, "image")));
    Ok(ParsedSource {
        dataset: None,
        metadata: DatasetMetadata::new(MetadataDetails::Images(ImagesMetadata {
            data_rows: found,
            classes,
        })),
    })
}

/// Class of an image is its parent directory; hidden paths have none
fn image_class(path: &Path) -> Option<String> {
    let hidden = path
        .components()
        .any(|part| part.as_os_str().to_string_lossy().starts_with('.'));
    if hidden {
        return None;
    }
    let parent = path.parent()?.file_name()?;
    Some(parent.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml_prep_core::{CollectingNotifier, DataType, ErrorKind};

    #[test]
    fn test_line_endings() {
        let source = RawSource::from_text("\u{feff}a,b\r\n1,2\r3,4\n");
        assert_eq!(source.lines(), &["a,b", "1,2", "3,4"]);

        let source = RawSource::from_text("a,b\n\n1,2");
        assert_eq!(source.lines(), &["a,b", "", "1,2"]);
    }

    #[test]
    fn test_from_reader() {
        let source = RawSource::from_reader("x y\n1 2\n".as_bytes()).unwrap();
        assert_eq!(source.lines().len(), 2);
        assert_eq!(source.size(), Some(8));
    }

    #[test]
    fn test_parse_file_dispatch() {
        let notifier = CollectingNotifier::new();
        let options = ReaderOptions::default();

        let source = RawSource::from_text("1,2|1;3,4|0\n");
        let parsed = parse_file(Path::new("data.ts"), &source, &options, &notifier).unwrap();
        assert_eq!(parsed.metadata.data_type(), DataType::Timeseries);
        assert_eq!(parsed.metadata.size, Some(12));

        let err = parse_file(Path::new("data.xls"), &source, &options, &notifier).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDataFile);
        assert_eq!(notifier.messages().last().map(String::as_str), Some("Unknown file format."));
    }

    #[test]
    fn test_archive_prefers_data_member() {
        let notifier = CollectingNotifier::new();
        let members = vec![
            ArchiveMember::new("cats/1.png", RawSource::default()),
            ArchiveMember::new("train.csv", RawSource::from_text("a,b\n1,2\n3,4\n")),
        ];
        let parsed = parse_archive(&members, &ReaderOptions::default(), &notifier).unwrap();
        assert_eq!(parsed.metadata.archive_path.as_deref(), Some("train.csv"));
        assert_eq!(parsed.metadata.data_rows(), 2);
        assert_eq!(notifier.messages()[0], "CSV file train.csv unpacked.");
    }

    #[test]
    fn test_archive_of_images() {
        let notifier = CollectingNotifier::new();
        let members = vec![
            ArchiveMember::new("pets/cats/1.png", RawSource::default()),
            ArchiveMember::new("pets/cats/2.jpg", RawSource::default()),
            ArchiveMember::new("pets/dogs/1.png", RawSource::default()),
            ArchiveMember::new("__MACOSX/.cats/1.png", RawSource::default()),
            ArchiveMember::new("loose.png", RawSource::default()),
        ];
        let parsed = parse_archive(&members, &ReaderOptions::default(), &notifier).unwrap();
        assert!(parsed.dataset.is_none());
        assert_eq!(parsed.metadata.data_type(), DataType::Images);
        assert_eq!(parsed.metadata.data_rows(), 3);
        assert_eq!(notifier.messages(), vec!["3 images found."]);
    }

    #[test]
    fn test_empty_archive() {
        let notifier = CollectingNotifier::new();
        let members = vec![ArchiveMember::new("readme.txt", RawSource::from_text("hi"))];
        let err = parse_archive(&members, &ReaderOptions::default(), &notifier).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDataFile);
    }
}
