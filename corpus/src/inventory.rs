use crate::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Bucket a file falls into, decided by its name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Image,
    Metadata,
    Text,
    Other,
}

impl FileKind {
    pub fn classify(path: &Path) -> Self {
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return FileKind::Other,
        };
        if name.ends_with(".tif") {
            FileKind::Image
        } else if name.ends_with(".xml") {
            FileKind::Metadata
        } else if name.ends_with(".txt") {
            FileKind::Text
        } else {
            FileKind::Other
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct Inventory {
    pub images: Vec<PathBuf>,
    pub metadata: Vec<PathBuf>,
    pub texts: Vec<PathBuf>,
    pub other: Vec<PathBuf>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InventoryCounts {
    pub images: usize,
    pub metadata: usize,
    pub texts: usize,
    pub other: usize,
}

impl InventoryCounts {
    pub fn total(&self) -> usize {
        self.images + self.metadata + self.texts + self.other
    }
}

impl Inventory {
    pub fn push(&mut self, path: PathBuf) {
        match FileKind::classify(&path) {
            FileKind::Image => self.images.push(path),
            FileKind::Metadata => self.metadata.push(path),
            FileKind::Text => self.texts.push(path),
            FileKind::Other => self.other.push(path),
        }
    }

    pub fn counts(&self) -> InventoryCounts {
        InventoryCounts {
            images: self.images.len(),
            metadata: self.metadata.len(),
            texts: self.texts.len(),
            other: self.other.len(),
        }
    }
}

/// Walk `root` recursively and bucket every entry that is not a directory.
/// Links are not followed; a link to a file counts as a file. Entries are
/// visited in file-name order so repeated scans agree.
pub fn scan<P: AsRef<Path>>(root: P) -> Result<Inventory> {
    let mut inventory = Inventory::default();
    for entry in WalkDir::new(root.as_ref()).sort_by_file_name() {
        let entry = entry?;
        let is_dir = entry.file_type().is_dir() || (entry.path_is_symlink() && entry.path().is_dir());
        if !is_dir {
            inventory.push(entry.into_path());
        }
    }
    let counts = inventory.counts();
    tracing::info!(
        root = %root.as_ref().display(),
        images = counts.images,
        metadata = counts.metadata,
        texts = counts.texts,
        other = counts.other,
        "scanned directory"
    );
    Ok(inventory)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_suffix() {
        assert_eq!(FileKind::classify(Path::new("a/b/page.tif")), FileKind::Image);
        assert_eq!(FileKind::classify(Path::new("page.xml")), FileKind::Metadata);
        assert_eq!(FileKind::classify(Path::new("page.txt")), FileKind::Text);
        assert_eq!(FileKind::classify(Path::new("page.TIF")), FileKind::Other);
        assert_eq!(FileKind::classify(Path::new("page.tiff")), FileKind::Other);
    }

    #[test]
    fn missing_root_is_an_error() {
        assert!(scan("/definitely/not/here").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_files_are_counted() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("a.tif");
        std::fs::write(&page, b"II*\0").unwrap();
        std::os::unix::fs::symlink(&page, dir.path().join("b.tif")).unwrap();
        std::fs::create_dir(dir.path().join("box")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("box"), dir.path().join("box-link")).unwrap();

        let counts = scan(dir.path()).unwrap().counts();
        assert_eq!(counts.images, 2);
        assert_eq!(counts.total(), 2);
    }
}
