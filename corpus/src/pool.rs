use crate::{CorpusError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use std::fmt::Display;
use std::path::{Path, PathBuf};

pub const DEFAULT_WORKERS: usize = 4;

/// A file that a task could not process, and why.
#[derive(Debug, Clone, Serialize)]
pub struct TaskFailure {
    pub index: usize,
    pub item: PathBuf,
    pub error: String,
}

/// Outcome of running a task over a list of files. `completed` keeps input order.
#[derive(Debug)]
pub struct TaskReport<R> {
    pub completed: Vec<R>,
    pub failures: Vec<TaskFailure>,
}

impl<R> Default for TaskReport<R> {
    fn default() -> Self {
        Self { completed: Vec::new(), failures: Vec::new() }
    }
}

impl<R> TaskReport<R> {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn total(&self) -> usize {
        self.completed.len() + self.failures.len()
    }

    /// Collapse into the completed results, or an error if anything failed.
    pub fn into_result(self) -> Result<Vec<R>> {
        if self.failures.is_empty() {
            Ok(self.completed)
        } else {
            Err(CorpusError::TaskFailures { failed: self.failures.len(), total: self.total() })
        }
    }

    /// Emit one warning per failure.
    pub fn log_failures(&self, stage: &str) {
        for f in &self.failures {
            tracing::warn!(stage, index = f.index, item = %f.item.display(), error = %f.error, "task failed");
        }
    }

    pub(crate) fn from_outcomes<E: Display>(paths: &[PathBuf], outcomes: Vec<std::result::Result<R, E>>) -> Self {
        let mut report = TaskReport::default();
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(r) => report.completed.push(r),
                Err(e) => report.failures.push(TaskFailure {
                    index,
                    item: paths[index].clone(),
                    error: e.to_string(),
                }),
            }
        }
        report
    }
}

/// Number of items per chunk when `len` items are spread over `cores`. Never zero.
pub fn chunk_size_for(len: usize, cores: usize) -> usize {
    let cores = cores.max(1);
    ((len + cores - 1) / cores).max(1)
}

/// Fixed-size worker pool that runs a fallible task per file and reports
/// every failure instead of aborting.
pub struct TaskPool {
    pool: rayon::ThreadPool,
    workers: usize,
    progress_label: Option<String>,
}

impl TaskPool {
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(CorpusError::InvalidParameter { name: "workers", reason: "must be at least 1".into() });
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("corpus-worker-{i}"))
            .build()?;
        Ok(Self { pool, workers, progress_label: None })
    }

    /// Show a progress bar labelled `label` while tasks run.
    pub fn with_progress(mut self, label: impl Into<String>) -> Self {
        self.progress_label = Some(label.into());
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `op` inside the pool so nested rayon iterators use its threads.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    /// One task per file.
    pub fn map<R, E, F>(&self, paths: &[PathBuf], f: F) -> TaskReport<R>
    where
        R: Send,
        E: Display + Send,
        F: Fn(&Path) -> std::result::Result<R, E> + Sync,
    {
        self.map_chunked(paths, 1, f)
    }

    /// Split `paths` into contiguous chunks of `chunk_size` and hand one chunk
    /// to each task. Results are concatenated in input order.
    pub fn map_chunked<R, E, F>(&self, paths: &[PathBuf], chunk_size: usize, f: F) -> TaskReport<R>
    where
        R: Send,
        E: Display + Send,
        F: Fn(&Path) -> std::result::Result<R, E> + Sync,
    {
        let chunk_size = chunk_size.max(1);
        let bar = self.progress_bar(paths.len());
        let outcomes: Vec<std::result::Result<R, String>> = self.pool.install(|| {
            paths
                .par_chunks(chunk_size)
                .map(|chunk| {
                    chunk
                        .iter()
                        .map(|p| {
                            let out = f(p.as_path()).map_err(|e| e.to_string());
                            bar.inc(1);
                            out
                        })
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>()
                .into_iter()
                .flatten()
                .collect()
        });
        bar.finish_and_clear();
        let report = TaskReport::from_outcomes(paths, outcomes);
        tracing::debug!(
            workers = self.workers,
            chunk_size,
            completed = report.completed.len(),
            failed = report.failures.len(),
            "pool run finished"
        );
        report
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        let label = match &self.progress_label {
            Some(label) => label,
            None => return ProgressBar::hidden(),
        };
        let bar = ProgressBar::new(len as u64);
        let style = ProgressStyle::with_template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {elapsed_precise} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        bar.set_style(style);
        bar.set_message(label.clone());
        bar
    }
}

/// Sequential counterpart of [`TaskPool::map`], same reporting.
pub fn map_sequential<R, E, F>(paths: &[PathBuf], f: F) -> TaskReport<R>
where
    E: Display,
    F: Fn(&Path) -> std::result::Result<R, E>,
{
    let outcomes = paths.iter().map(|p| f(p.as_path())).collect();
    TaskReport::from_outcomes(paths, outcomes)
}
