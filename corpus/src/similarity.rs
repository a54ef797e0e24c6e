use crate::dictionary::image_path_for;
use crate::{CorpusError, Result, StopWords, TermId};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

lazy_static! {
    static ref WORD: Regex = Regex::new(r"(?u)\b\w\w+\b").expect("valid regex");
}

/// L2-normalized sparse row, sorted by term id.
pub type SparseRow = Vec<(TermId, f32)>;

/// TF-IDF weights over raw text, one row per document in input order.
#[derive(Debug, Clone, Default)]
pub struct TfidfMatrix {
    pub vocabulary: HashMap<String, TermId>,
    pub idf: Vec<f32>,
    pub rows: Vec<SparseRow>,
}

fn words<'a>(text: &'a str, stop_words: &'a StopWords) -> impl Iterator<Item = String> + 'a {
    WORD.find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(move |w| !stop_words.contains(w))
}

impl TfidfMatrix {
    /// Raw counts weighted by smoothed idf `ln((1 + n) / (1 + df)) + 1`, rows L2-normalized.
    pub fn fit<S: AsRef<str>>(documents: &[S], stop_words: &StopWords) -> Self {
        let mut vocabulary: HashMap<String, TermId> = HashMap::new();
        let mut df: Vec<u32> = Vec::new();
        let mut counts: Vec<BTreeMap<TermId, u32>> = Vec::with_capacity(documents.len());

        for doc in documents {
            let mut tf: BTreeMap<TermId, u32> = BTreeMap::new();
            for word in words(doc.as_ref(), stop_words) {
                let next = vocabulary.len() as TermId;
                let tid = *vocabulary.entry(word).or_insert(next);
                if tid == next {
                    df.push(0);
                }
                *tf.entry(tid).or_insert(0) += 1;
            }
            for tid in tf.keys() {
                df[*tid as usize] += 1;
            }
            counts.push(tf);
        }

        let n = documents.len() as f32;
        let idf: Vec<f32> = df.iter().map(|&d| ((1.0 + n) / (1.0 + d as f32)).ln() + 1.0).collect();
        let rows = counts
            .into_iter()
            .map(|tf| {
                let mut row: SparseRow = tf.into_iter().map(|(tid, c)| (tid, c as f32 * idf[tid as usize])).collect();
                let norm = row.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
                if norm > 0.0 {
                    for (_, w) in row.iter_mut() {
                        *w /= norm;
                    }
                }
                row
            })
            .collect();
        tracing::info!(documents = documents.len(), terms = vocabulary.len(), "built tf-idf matrix");
        Self { vocabulary, idf, rows }
    }

    pub fn from_paths(paths: &[PathBuf], stop_words: &StopWords) -> Result<Self> {
        let mut documents = Vec::with_capacity(paths.len());
        for p in paths {
            let bytes = fs::read(p)?;
            documents.push(String::from_utf8_lossy(&bytes).into_owned());
        }
        Ok(Self::fit(&documents, stop_words))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Cosine similarity of two L2-normalized sparse rows.
pub fn cosine(a: &SparseRow, b: &SparseRow) -> f32 {
    let (mut i, mut j) = (0, 0);
    let mut dot = 0.0f32;
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                dot += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    dot
}

/// The `k` documents most similar to `query`, best first. `query` itself is
/// included and normally ranks first. `paths` must list the documents in the
/// order the matrix rows were built from.
pub fn most_similar(paths: &[PathBuf], query: &Path, matrix: &TfidfMatrix, k: usize) -> Result<Vec<(PathBuf, f32)>> {
    if paths.len() != matrix.len() {
        return Err(CorpusError::InvalidParameter {
            name: "paths",
            reason: format!("{} paths for a matrix of {} rows", paths.len(), matrix.len()),
        });
    }
    let q = paths
        .iter()
        .position(|p| p == query)
        .ok_or_else(|| CorpusError::QueryNotFound(query.to_path_buf()))?;
    let qrow = &matrix.rows[q];
    let mut scored: Vec<(usize, f32)> = matrix.rows.iter().map(|r| cosine(qrow, r)).enumerate().collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
    Ok(scored.into_iter().take(k).map(|(i, s)| (paths[i].clone(), s)).collect())
}

/// [`most_similar`] mapped to the scanned images.
pub fn similar_images(paths: &[PathBuf], query: &Path, matrix: &TfidfMatrix, k: usize) -> Result<Vec<(PathBuf, f32)>> {
    Ok(most_similar(paths, query, matrix, k)?
        .into_iter()
        .map(|(p, s)| (image_path_for(&p), s))
        .collect())
}
