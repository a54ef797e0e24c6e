//! OCR of scanned page images through an external engine.
//!
//! Each image gets a transcript written beside it with the same stem and a
//! `.txt` extension, which the inventory then picks up as a text document.

use crate::pool::{map_sequential, TaskPool, TaskReport};
use crate::OcrError;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

/// Something that turns an image into a transcript file on disk.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the engine can run on this machine.
    fn is_available(&self) -> bool;

    /// Recognize `image` and return the path of the transcript written.
    fn recognize(&self, image: &Path) -> Result<PathBuf, OcrError>;
}

/// Transcript location for an image: same directory and stem, `.txt` extension.
pub fn transcript_path(image: &Path) -> PathBuf {
    image.with_extension("txt")
}

/// Tesseract via its command-line binary.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: PathBuf,
    language: Option<String>,
}

impl TesseractCli {
    pub fn new() -> Self {
        Self { binary: PathBuf::from("tesseract"), language: None }
    }

    pub fn with_binary<P: Into<PathBuf>>(mut self, binary: P) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    fn command(&self, image: &Path) -> Command {
        // tesseract appends ".txt" to the output base itself
        let stem = image.with_extension("");
        let mut cmd = Command::new(&self.binary);
        cmd.arg(image).arg(stem);
        if let Some(lang) = &self.language {
            cmd.args(["-l", lang]);
        }
        cmd
    }
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for TesseractCli {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn is_available(&self) -> bool {
        if self.binary.components().count() > 1 {
            return self.binary.is_file();
        }
        Command::new("which")
            .arg(&self.binary)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn recognize(&self, image: &Path) -> Result<PathBuf, OcrError> {
        let start = Instant::now();
        let output = match self.command(image).output() {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(OcrError::BinaryNotFound(self.binary.display().to_string()));
            }
            Err(e) => return Err(OcrError::Io(e)),
        };
        if !output.status.success() {
            return Err(OcrError::Failed {
                path: image.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        tracing::debug!(image = %image.display(), elapsed_ms = start.elapsed().as_millis() as u64, "ocr complete");
        Ok(transcript_path(image))
    }
}

/// Options shared by the sequential and parallel runners.
#[derive(Debug, Clone, Copy, Default)]
pub struct OcrOptions {
    /// Leave images alone when their transcript already exists.
    pub skip_existing: bool,
}

fn recognize_one(engine: &dyn OcrEngine, image: &Path, opts: OcrOptions) -> Result<PathBuf, OcrError> {
    let out = transcript_path(image);
    if opts.skip_existing && out.is_file() {
        tracing::debug!(image = %image.display(), "transcript exists, skipping");
        return Ok(out);
    }
    engine.recognize(image)
}

/// OCR every image one after another.
pub fn ocr_sequential(engine: &dyn OcrEngine, images: &[PathBuf], opts: OcrOptions) -> TaskReport<PathBuf> {
    let report = map_sequential(images, |p| recognize_one(engine, p, opts));
    finish(engine, report)
}

/// OCR every image on the pool's workers.
pub fn ocr_parallel(engine: &dyn OcrEngine, images: &[PathBuf], pool: &TaskPool, opts: OcrOptions) -> TaskReport<PathBuf> {
    let report = pool.map(images, |p| recognize_one(engine, p, opts));
    finish(engine, report)
}

fn finish(engine: &dyn OcrEngine, report: TaskReport<PathBuf>) -> TaskReport<PathBuf> {
    report.log_failures("ocr");
    tracing::info!(engine = engine.name(), transcripts = report.completed.len(), failed = report.failure_count(), "ocr finished");
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_replaces_extension() {
        assert_eq!(transcript_path(Path::new("/data/box1/p001.tif")), PathBuf::from("/data/box1/p001.txt"));
    }

    #[test]
    fn tesseract_command_line() {
        let cmd = TesseractCli::new().with_language("eng").command(Path::new("/scans/a.tif"));
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(cmd.get_program(), "tesseract");
        assert_eq!(args, vec!["/scans/a.tif", "/scans/a", "-l", "eng"]);
    }

    #[test]
    fn missing_binary_is_reported() {
        let engine = TesseractCli::new().with_binary("tesseract-binary-that-does-not-exist");
        assert!(!engine.is_available());
        let err = engine.recognize(Path::new("x.tif")).unwrap_err();
        assert!(matches!(err, OcrError::BinaryNotFound(_)));
    }
}
