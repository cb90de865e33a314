//! JSON snapshot of the documents seen during a run

use crate::extract::Document;
use crate::IndexerError;
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes one pretty-printed JSON array of documents per run
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a snapshot taken at `at`: `snapshot_YYYYMMDD_HHMMSS.json`
    pub fn file_name(at: DateTime<Utc>) -> String {
        format!("snapshot_{}.json", at.format("%Y%m%d_%H%M%S"))
    }

    /// Writes the documents and returns the path of the new file
    ///
    /// The directory is created if it does not exist.
    pub fn write(&self, documents: &[Document], at: DateTime<Utc>) -> Result<PathBuf, IndexerError> {
        fs::create_dir_all(&self.dir)?;

        let path = self.dir.join(Self::file_name(at));
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, documents)?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn doc(url: &str) -> Document {
        Document {
            id: crate::extract::document_id(url),
            url: url.to_string(),
            title: "Καλημέρα".to_string(),
            meta_description: String::new(),
            body_text: "body".to_string(),
            headings: vec!["Intro".to_string()],
            category: "homepage".to_string(),
            word_count: 1,
            internal_links: Vec::new(),
            fetched_at: Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap(),
        }
    }

    #[test]
    fn test_file_name_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(SnapshotWriter::file_name(at), "snapshot_20240309_140507.json");
    }

    #[test]
    fn test_write_creates_dir_and_round_trips() {
        let temp = TempDir::new().unwrap();
        let writer = SnapshotWriter::new(temp.path().join("nested/out"));
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();

        let docs = vec![doc("https://example.org/"), doc("https://example.org/about")];
        let path = writer.write(&docs, at).unwrap();

        assert!(path.ends_with("snapshot_20240309_140507.json"));
        let content = fs::read_to_string(&path).unwrap();
        // Pretty printed and UTF-8 preserved
        assert!(content.starts_with("[\n  {"));
        assert!(content.contains("Καλημέρα"));

        let parsed: Vec<Document> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, docs);
    }

    #[test]
    fn test_write_empty_run() {
        let temp = TempDir::new().unwrap();
        let writer = SnapshotWriter::new(temp.path());
        let path = writer.write(&[], Utc::now()).unwrap();
        let parsed: Vec<Document> =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert!(parsed.is_empty());
    }
}
