use crate::inspect::TopicGroup;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;

pub const REPORT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub num_docs: usize,
    pub num_terms: usize,
    pub num_topics: usize,
    pub failed_docs: usize,
    pub created_at: String,
    pub version: u32,
}

impl RunSummary {
    pub fn new(num_docs: usize, num_terms: usize, num_topics: usize, failed_docs: usize) -> Self {
        Self {
            num_docs,
            num_terms,
            num_topics,
            failed_docs,
            created_at: time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
            version: REPORT_VERSION,
        }
    }
}

/// Layout of a review report directory.
pub struct ReportPaths {
    pub root: PathBuf,
}

impl ReportPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn summary(&self) -> PathBuf { self.root.join("summary.json") }
    fn topics(&self) -> PathBuf { self.root.join("topics.json") }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut f = File::create(path)?;
    let json = serde_json::to_string_pretty(value)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let mut f = File::open(path)?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    Ok(serde_json::from_str(&buf)?)
}

pub fn save_summary(paths: &ReportPaths, summary: &RunSummary) -> Result<()> {
    create_dir_all(&paths.root)?;
    write_json(&paths.summary(), summary)
}

pub fn load_summary(paths: &ReportPaths) -> Result<RunSummary> {
    read_json(&paths.summary())
}

pub fn save_topics(paths: &ReportPaths, groups: &[TopicGroup]) -> Result<()> {
    create_dir_all(&paths.root)?;
    write_json(&paths.topics(), &groups)?;
    tracing::info!(root = %paths.root.display(), topics = groups.len(), "wrote topic report");
    Ok(())
}

pub fn load_topics(paths: &ReportPaths) -> Result<Vec<TopicGroup>> {
    read_json(&paths.topics())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_and_topics_survive_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ReportPaths::new(dir.path().join("report"));
        let summary = RunSummary::new(10, 200, 3, 1);
        save_summary(&paths, &summary).unwrap();
        assert_eq!(load_summary(&paths).unwrap(), summary);

        let groups = vec![TopicGroup { topic: 2, images: vec![PathBuf::from("box/p1.tif")], top_words: vec!["deed".into()] }];
        save_topics(&paths, &groups).unwrap();
        assert_eq!(load_topics(&paths).unwrap(), groups);
    }

    #[test]
    fn missing_report_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_summary(&ReportPaths::new(dir.path())).is_err());
    }
}
