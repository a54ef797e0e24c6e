use crate::tokenizer::NormalizedText;
use crate::{CorpusError, Result, TermId};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Sparse term counts for one document, sorted by term id.
pub type BowVector = Vec<(TermId, u32)>;

/// Token ↔ id mapping with per-token document frequency.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    token2id: HashMap<String, TermId>,
    id2token: Vec<String>,
    df: Vec<u32>,
    num_docs: u32,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from tokenized documents. Ids are handed out on first sight,
    /// visiting each document's distinct tokens in sorted order.
    pub fn from_documents<D, T>(docs: D) -> Self
    where
        D: IntoIterator<Item = T>,
        T: AsRef<[String]>,
    {
        let mut dict = Self::new();
        for doc in docs {
            dict.add_document(doc.as_ref());
        }
        dict
    }

    pub fn add_document(&mut self, tokens: &[String]) {
        self.num_docs += 1;
        let distinct: BTreeSet<&str> = tokens.iter().map(|t| t.as_str()).collect();
        for token in distinct {
            let next = self.id2token.len() as TermId;
            let tid = *self.token2id.entry(token.to_string()).or_insert(next);
            if tid == next {
                self.id2token.push(token.to_string());
                self.df.push(0);
            }
            self.df[tid as usize] += 1;
        }
    }

    /// Drop tokens seen in fewer than `no_below` documents or in more than
    /// `no_above` (fraction) of them, then keep at most `keep_n` of the most
    /// frequent. Surviving ids are compacted in their original order.
    pub fn filter_extremes(&mut self, no_below: u32, no_above: f64, keep_n: Option<usize>) {
        let max_df = no_above * self.num_docs as f64;
        let mut good: Vec<TermId> = (0..self.id2token.len() as TermId)
            .filter(|&id| {
                let df = self.df[id as usize];
                df >= no_below && (df as f64) <= max_df
            })
            .collect();
        if let Some(n) = keep_n {
            if good.len() > n {
                good.sort_by(|a, b| self.df[*b as usize].cmp(&self.df[*a as usize]).then(a.cmp(b)));
                good.truncate(n);
                good.sort_unstable();
            }
        }
        let before = self.id2token.len();
        let keep: HashSet<TermId> = good.into_iter().collect();
        self.retain_ids(&keep);
        tracing::info!(before, after = self.id2token.len(), no_below, no_above, "filtered dictionary");
    }

    fn retain_ids(&mut self, keep: &HashSet<TermId>) {
        let mut id2token = Vec::with_capacity(keep.len());
        let mut df = Vec::with_capacity(keep.len());
        for (id, token) in self.id2token.drain(..).enumerate() {
            if keep.contains(&(id as TermId)) {
                id2token.push(token);
                df.push(self.df[id]);
            }
        }
        self.token2id = id2token.iter().enumerate().map(|(i, t)| (t.clone(), i as TermId)).collect();
        self.id2token = id2token;
        self.df = df;
    }

    /// Count known tokens; unknown ones are ignored.
    pub fn doc2bow(&self, tokens: &[String]) -> BowVector {
        let mut counts: BTreeMap<TermId, u32> = BTreeMap::new();
        for token in tokens {
            if let Some(&tid) = self.token2id.get(token) {
                *counts.entry(tid).or_insert(0) += 1;
            }
        }
        counts.into_iter().collect()
    }

    pub fn id(&self, token: &str) -> Option<TermId> {
        self.token2id.get(token).copied()
    }

    pub fn token(&self, id: TermId) -> Option<&str> {
        self.id2token.get(id as usize).map(|s| s.as_str())
    }

    pub fn doc_freq(&self, id: TermId) -> u32 {
        self.df.get(id as usize).copied().unwrap_or(0)
    }

    pub fn tokens(&self) -> &[String] {
        &self.id2token
    }

    pub fn len(&self) -> usize {
        self.id2token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id2token.is_empty()
    }

    pub fn num_docs(&self) -> u32 {
        self.num_docs
    }
}

/// Thresholds for [`Dictionary::filter_extremes`].
#[derive(Debug, Clone, Copy)]
pub struct FilterParams {
    pub no_below: u32,
    pub no_above: f64,
    pub keep_n: Option<usize>,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self { no_below: 5, no_above: 0.5, keep_n: Some(100_000) }
    }
}

/// One text document with everything derived from it.
#[derive(Debug, Clone)]
pub struct Document {
    pub text_path: PathBuf,
    pub tokens: Vec<String>,
    pub bow: BowVector,
}

impl Document {
    /// Scanned page this transcript came from.
    pub fn image_path(&self) -> PathBuf {
        image_path_for(&self.text_path)
    }
}

pub fn image_path_for(text_path: &Path) -> PathBuf {
    text_path.with_extension("tif")
}

/// Dictionary plus documents in input order.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub dictionary: Dictionary,
    pub documents: Vec<Document>,
}

impl Corpus {
    pub fn build(normalized: Vec<NormalizedText>, params: FilterParams) -> Result<Self> {
        if !(0.0..=1.0).contains(&params.no_above) {
            return Err(CorpusError::InvalidParameter {
                name: "no_above",
                reason: format!("{} is not a fraction", params.no_above),
            });
        }
        let mut dictionary = Dictionary::from_documents(normalized.iter().map(|d| &d.tokens));
        dictionary.filter_extremes(params.no_below, params.no_above, params.keep_n);
        let documents = normalized
            .into_iter()
            .map(|n| {
                let bow = dictionary.doc2bow(&n.tokens);
                Document { text_path: n.path, tokens: n.tokens, bow }
            })
            .collect::<Vec<_>>();
        tracing::info!(documents = documents.len(), terms = dictionary.len(), "built bag-of-words corpus");
        Ok(Self { dictionary, documents })
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn bows(&self) -> impl Iterator<Item = &BowVector> {
        self.documents.iter().map(|d| &d.bow)
    }

    pub fn text_paths(&self) -> Vec<PathBuf> {
        self.documents.iter().map(|d| d.text_path.clone()).collect()
    }
}
