use crate::{Corpus, LdaModel, TopicId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopicAssignment {
    pub doc_index: usize,
    pub topic: TopicId,
    pub probability: f64,
}

/// Documents grouped under one topic, as image paths for manual review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicGroup {
    pub topic: TopicId,
    pub images: Vec<PathBuf>,
    #[serde(default)]
    pub top_words: Vec<String>,
}

impl TopicGroup {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Highest-probability topic for every document, in corpus order.
pub fn assign_topics(corpus: &Corpus, model: &LdaModel) -> Vec<TopicAssignment> {
    corpus
        .documents
        .iter()
        .enumerate()
        .map(|(doc_index, doc)| {
            let (topic, probability) = model.top_topic(&doc.bow);
            TopicAssignment { doc_index, topic, probability }
        })
        .collect()
}

/// Document indices per topic. Every topic in `0..num_topics` has an entry.
pub fn group_by_topic(assignments: &[TopicAssignment], num_topics: usize) -> BTreeMap<TopicId, Vec<usize>> {
    let mut groups: BTreeMap<TopicId, Vec<usize>> = (0..num_topics).map(|t| (t, Vec::new())).collect();
    for a in assignments {
        groups.entry(a.topic).or_default().push(a.doc_index);
    }
    groups
}

/// Image paths of the documents the model puts under each topic, for every topic.
pub fn inspect_classification(corpus: &Corpus, model: &LdaModel) -> BTreeMap<TopicId, Vec<PathBuf>> {
    let assignments = assign_topics(corpus, model);
    group_by_topic(&assignments, model.num_topics())
        .into_iter()
        .map(|(topic, docs)| {
            let images = docs.into_iter().map(|i| corpus.documents[i].image_path()).collect();
            (topic, images)
        })
        .collect()
}

/// Topics ordered by how many documents they hold, largest first; ties by topic id.
pub fn rank_by_size(groups: BTreeMap<TopicId, Vec<PathBuf>>) -> Vec<TopicGroup> {
    let mut ranked: Vec<TopicGroup> = groups
        .into_iter()
        .map(|(topic, images)| TopicGroup { topic, images, top_words: Vec::new() })
        .collect();
    ranked.sort_by(|a, b| b.len().cmp(&a.len()).then(a.topic.cmp(&b.topic)));
    ranked
}

/// The group at position `rank` of a size-ranked list and up to `limit` of its
/// images. `None` when `rank` is past the end.
pub fn review_slice(ranked: &[TopicGroup], rank: usize, limit: usize) -> Option<(&TopicGroup, &[PathBuf])> {
    let group = ranked.get(rank)?;
    Some((group, &group.images[..limit.min(group.len())]))
}

/// Attach each group's top words from the model.
pub fn label_groups(groups: &mut [TopicGroup], model: &LdaModel, n: usize) {
    for g in groups {
        g.top_words = model.top_words(g.topic, n).into_iter().map(|(w, _)| w).collect();
    }
}

/// System command used to open a file for viewing.
pub fn default_viewer() -> &'static str {
    if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    }
}

/// Hand each path to `viewer`. Failures to launch are ignored.
/// Returns how many viewers were launched.
pub fn open_for_review(paths: &[PathBuf], viewer: &str) -> usize {
    paths.iter().filter(|p| open_one(p, viewer)).count()
}

fn open_one(path: &Path, viewer: &str) -> bool {
    match Command::new(viewer).arg(path).stdout(Stdio::null()).stderr(Stdio::null()).spawn() {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!(path = %path.display(), viewer, error = %e, "could not open");
            false
        }
    }
}
