//! Latent Dirichlet Allocation fitted with online variational Bayes
//! (Hoffman, Blei & Bach 2010).
//!
//! Training walks the corpus in chunks. For every chunk the per-document
//! E-step runs on a dedicated worker pool; sufficient statistics are then
//! summed in document order, so a fixed seed always yields the same model
//! regardless of thread scheduling.

use crate::pool::TaskPool;
use crate::{BowVector, Corpus, CorpusError, Result, TopicId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct LdaParams {
    pub num_topics: usize,
    pub passes: usize,
    pub chunk_size: usize,
    pub workers: usize,
    pub random_seed: u64,
    /// Max E-step iterations per document.
    pub iterations: usize,
    /// Stop a document's E-step once the mean change of gamma drops below this.
    pub gamma_threshold: f64,
    /// Learning-rate decay (kappa).
    pub decay: f64,
    /// Learning-rate offset (tau0).
    pub offset: f64,
    /// Topics below this probability are left out of [`LdaModel::topic_distribution`].
    pub minimum_probability: f64,
}

impl Default for LdaParams {
    fn default() -> Self {
        Self {
            num_topics: 35,
            passes: 40,
            chunk_size: 500,
            workers: 4,
            random_seed: 1,
            iterations: 50,
            gamma_threshold: 0.001,
            decay: 0.5,
            offset: 1.0,
            minimum_probability: 0.01,
        }
    }
}

/// A trained topic model. Read-only after [`LdaModel::train`].
#[derive(Debug, Clone)]
pub struct LdaModel {
    params: LdaParams,
    num_terms: usize,
    alpha: f64,
    eta: f64,
    /// Variational topic-word parameters, `num_topics` rows of `num_terms`.
    lambda: Vec<Vec<f64>>,
    exp_elog_beta: Vec<Vec<f64>>,
    id2token: Vec<String>,
}

/// Per-document E-step output: final gamma and the document's share of the
/// sufficient statistics, laid out topic-major over the document's terms.
struct DocStats {
    gamma: Vec<f64>,
    sstats: Vec<f64>,
}

impl LdaModel {
    pub fn train(corpus: &Corpus, params: LdaParams) -> Result<Self> {
        if corpus.is_empty() {
            return Err(CorpusError::EmptyCorpus("no documents to train on"));
        }
        if corpus.dictionary.is_empty() {
            return Err(CorpusError::EmptyCorpus("dictionary has no terms after filtering"));
        }
        if params.num_topics == 0 {
            return Err(CorpusError::InvalidParameter { name: "num_topics", reason: "must be at least 1".into() });
        }
        if params.chunk_size == 0 {
            return Err(CorpusError::InvalidParameter { name: "chunk_size", reason: "must be at least 1".into() });
        }
        let pool = TaskPool::new(params.workers)?;

        let k = params.num_topics;
        let num_terms = corpus.dictionary.len();
        let mut rng = StdRng::seed_from_u64(params.random_seed);
        let lambda: Vec<Vec<f64>> = (0..k)
            .map(|_| (0..num_terms).map(|_| rng.gen_range(0.9..1.1)).collect())
            .collect();
        let exp_elog_beta = lambda.iter().map(|row| dirichlet_expectation_exp(row)).collect();
        let mut model = Self {
            alpha: 1.0 / k as f64,
            eta: 1.0 / k as f64,
            num_terms,
            lambda,
            exp_elog_beta,
            id2token: corpus.dictionary.tokens().to_vec(),
            params,
        };

        let bows: Vec<&BowVector> = corpus.bows().collect();
        let num_docs = bows.len() as f64;
        let mut docs_seen: usize = 0;
        let start = Instant::now();
        tracing::info!(
            documents = bows.len(),
            terms = num_terms,
            topics = k,
            passes = model.params.passes,
            chunk_size = model.params.chunk_size,
            workers = model.params.workers,
            "training LDA"
        );

        for pass in 0..model.params.passes {
            for chunk in bows.chunks(model.params.chunk_size) {
                let stats: Vec<DocStats> = pool.install(|| chunk.par_iter().map(|bow| model.e_step(bow)).collect());
                let rho = (model.params.offset + pass as f64 + (docs_seen / model.params.chunk_size) as f64)
                    .powf(-model.params.decay);
                model.m_step(chunk, &stats, rho, num_docs);
                docs_seen += chunk.len();
            }
            tracing::debug!(pass, "finished pass");
            if (pass + 1) % 10 == 0 || pass + 1 == model.params.passes {
                tracing::info!(pass = pass + 1, of = model.params.passes, elapsed_s = start.elapsed().as_secs_f64(), "LDA progress");
            }
        }

        for topic in 0..k {
            let words: Vec<String> = model.top_words(topic, 10).into_iter().map(|(w, p)| format!("{p:.3}*{w}")).collect();
            tracing::info!(topic, words = %words.join(" + "), "topic");
        }
        Ok(model)
    }

    fn e_step(&self, bow: &BowVector) -> DocStats {
        let k = self.params.num_topics;
        let n = bow.len();
        let mut gamma = vec![1.0; k];
        if n == 0 {
            return DocStats { gamma: vec![self.alpha; k], sstats: Vec::new() };
        }
        // betad[t * n + j] = exp(E[log beta_t,w_j])
        let mut betad = vec![0.0; k * n];
        for t in 0..k {
            for (j, &(id, _)) in bow.iter().enumerate() {
                betad[t * n + j] = self.exp_elog_beta[t][id as usize];
            }
        }
        let mut exp_elog_theta = dirichlet_expectation_exp(&gamma);
        let mut phinorm = phi_norm(&exp_elog_theta, &betad, n);

        for _ in 0..self.params.iterations {
            let last = gamma.clone();
            for t in 0..k {
                let mut acc = 0.0;
                for (j, &(_, count)) in bow.iter().enumerate() {
                    acc += count as f64 / phinorm[j] * betad[t * n + j];
                }
                gamma[t] = self.alpha + exp_elog_theta[t] * acc;
            }
            exp_elog_theta = dirichlet_expectation_exp(&gamma);
            phinorm = phi_norm(&exp_elog_theta, &betad, n);
            let mean_change = gamma.iter().zip(&last).map(|(a, b)| (a - b).abs()).sum::<f64>() / k as f64;
            if mean_change < self.params.gamma_threshold {
                break;
            }
        }

        let mut sstats = vec![0.0; k * n];
        for t in 0..k {
            for (j, &(_, count)) in bow.iter().enumerate() {
                sstats[t * n + j] = exp_elog_theta[t] * count as f64 / phinorm[j] * betad[t * n + j];
            }
        }
        DocStats { gamma, sstats }
    }

    fn m_step(&mut self, chunk: &[&BowVector], stats: &[DocStats], rho: f64, num_docs: f64) {
        let k = self.params.num_topics;
        let mut sstats = vec![vec![0.0; self.num_terms]; k];
        for (bow, doc) in chunk.iter().zip(stats) {
            let n = bow.len();
            for t in 0..k {
                for (j, &(id, _)) in bow.iter().enumerate() {
                    sstats[t][id as usize] += doc.sstats[t * n + j];
                }
            }
        }
        let scale = num_docs / chunk.len() as f64;
        for t in 0..k {
            for w in 0..self.num_terms {
                let target = self.eta + scale * sstats[t][w];
                self.lambda[t][w] = (1.0 - rho) * self.lambda[t][w] + rho * target;
            }
            self.exp_elog_beta[t] = dirichlet_expectation_exp(&self.lambda[t]);
        }
    }

    pub fn num_topics(&self) -> usize {
        self.params.num_topics
    }

    pub fn num_terms(&self) -> usize {
        self.num_terms
    }

    pub fn params(&self) -> &LdaParams {
        &self.params
    }

    /// Full posterior over topics for one document; sums to 1.
    pub fn posterior(&self, bow: &BowVector) -> Vec<f64> {
        let gamma = self.e_step(bow).gamma;
        let total: f64 = gamma.iter().sum();
        gamma.into_iter().map(|g| g / total).collect()
    }

    /// Topics at or above `minimum_probability`, by topic id.
    pub fn topic_distribution(&self, bow: &BowVector) -> Vec<(TopicId, f64)> {
        self.posterior(bow)
            .into_iter()
            .enumerate()
            .filter(|(_, p)| *p >= self.params.minimum_probability)
            .collect()
    }

    /// Most probable topic. Ties go to the lower topic id.
    pub fn top_topic(&self, bow: &BowVector) -> (TopicId, f64) {
        let mut best = (0, f64::MIN);
        for (topic, p) in self.posterior(bow).into_iter().enumerate() {
            if p > best.1 {
                best = (topic, p);
            }
        }
        best
    }

    /// The `n` highest-weight words of `topic` with their probabilities.
    pub fn top_words(&self, topic: TopicId, n: usize) -> Vec<(String, f64)> {
        let row = match self.lambda.get(topic) {
            Some(row) => row,
            None => return Vec::new(),
        };
        let total: f64 = row.iter().sum();
        let mut words: Vec<(usize, f64)> = row.iter().map(|l| l / total).enumerate().collect();
        words.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
        words
            .into_iter()
            .take(n)
            .map(|(id, p)| (self.id2token[id].clone(), p))
            .collect()
    }
}

fn phi_norm(exp_elog_theta: &[f64], betad: &[f64], n: usize) -> Vec<f64> {
    let mut norm = vec![1e-100; n];
    for (t, theta) in exp_elog_theta.iter().enumerate() {
        for j in 0..n {
            norm[j] += theta * betad[t * n + j];
        }
    }
    norm
}

/// `exp(E[log x])` for `x ~ Dir(params)`.
fn dirichlet_expectation_exp(params: &[f64]) -> Vec<f64> {
    let psi_total = digamma(params.iter().sum());
    params.iter().map(|&p| (digamma(p) - psi_total).exp()).collect()
}

/// Digamma via recurrence up to x >= 6, then the asymptotic series.
pub(crate) fn digamma(mut x: f64) -> f64 {
    let mut result = 0.0;
    while x < 6.0 {
        result -= 1.0 / x;
        x += 1.0;
    }
    let f = 1.0 / (x * x);
    result + x.ln() - 0.5 / x
        - f * (1.0 / 12.0 - f * (1.0 / 120.0 - f * (1.0 / 252.0 - f * (1.0 / 240.0 - f / 132.0))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::NormalizedText;
    use crate::FilterParams;
    use std::path::PathBuf;

    fn corpus(docs: &[&str]) -> Corpus {
        let normalized = docs
            .iter()
            .enumerate()
            .map(|(i, d)| NormalizedText {
                path: PathBuf::from(format!("doc{i}.txt")),
                tokens: d.split_whitespace().map(String::from).collect(),
            })
            .collect();
        Corpus::build(normalized, FilterParams { no_below: 1, no_above: 1.0, keep_n: None }).unwrap()
    }

    fn small_params() -> LdaParams {
        LdaParams { num_topics: 3, passes: 5, chunk_size: 4, workers: 2, ..LdaParams::default() }
    }

    #[test]
    fn digamma_known_values() {
        // psi(1) = -euler_gamma
        assert!((digamma(1.0) + 0.5772156649015329).abs() < 1e-9);
        assert!((digamma(0.5) + 1.9635100260214235).abs() < 1e-9);
        assert!((digamma(10.0) - 2.251752589066721).abs() < 1e-9);
    }

    #[test]
    fn posterior_is_a_distribution() {
        let c = corpus(&["loan bank rate", "bank loan", "river boat water", "water river fish", "bank rate"]);
        let model = LdaModel::train(&c, small_params()).unwrap();
        for doc in &c.documents {
            let p = model.posterior(&doc.bow);
            assert_eq!(p.len(), 3);
            assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9);
            let (top, prob) = model.top_topic(&doc.bow);
            assert!(top < 3);
            assert!(p.iter().all(|&x| x <= prob));
        }
    }

    #[test]
    fn same_seed_same_model() {
        let c = corpus(&["a b c", "b c d", "d e f", "e f g", "a g", "c d e"]);
        let m1 = LdaModel::train(&c, small_params()).unwrap();
        let m2 = LdaModel::train(&c, LdaParams { workers: 3, ..small_params() }).unwrap();
        assert_eq!(m1.lambda, m2.lambda);
        let t1: Vec<_> = c.bows().map(|b| m1.top_topic(b).0).collect();
        let t2: Vec<_> = c.bows().map(|b| m2.top_topic(b).0).collect();
        assert_eq!(t1, t2);
    }

    #[test]
    fn different_seed_different_init() {
        let c = corpus(&["a b c", "b c d", "d e f"]);
        let m1 = LdaModel::train(&c, small_params()).unwrap();
        let m2 = LdaModel::train(&c, LdaParams { random_seed: 7, ..small_params() }).unwrap();
        assert_ne!(m1.lambda, m2.lambda);
    }

    #[test]
    fn empty_corpus_is_an_error() {
        let c = corpus(&[]);
        assert!(matches!(LdaModel::train(&c, small_params()), Err(CorpusError::EmptyCorpus(_))));
    }

    #[test]
    fn zero_topics_rejected() {
        let c = corpus(&["a b"]);
        let params = LdaParams { num_topics: 0, ..small_params() };
        assert!(matches!(LdaModel::train(&c, params), Err(CorpusError::InvalidParameter { .. })));
    }

    #[test]
    fn top_words_are_dictionary_tokens() {
        let c = corpus(&["alpha beta", "beta gamma", "gamma alpha"]);
        let model = LdaModel::train(&c, small_params()).unwrap();
        let words = model.top_words(0, 2);
        assert_eq!(words.len(), 2);
        assert!(words.iter().all(|(w, _)| c.dictionary.id(w).is_some()));
        assert!(model.top_words(99, 2).is_empty());
    }
}
