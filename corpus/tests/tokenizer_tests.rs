use corpus::tokenizer::{normalize, normalize_corpus, normalize_corpus_parallel, normalize_file, tokenize, Lemmatizer, StopWords};
use corpus::TaskPool;
use std::fs;

#[test]
fn it_lemmatizes_and_lowercases() {
    let lem = Lemmatizer::english();
    let words = tokenize("Running Runners RUN! Deeds recorded.", &lem, &StopWords::english());
    assert!(words.contains(&"run".to_string()));
    assert!(words.contains(&"deed".to_string()));
    assert!(words.iter().all(|w| w.chars().all(|c| !c.is_uppercase())));
}

#[test]
fn it_filters_stopwords() {
    let stop = StopWords::english();
    let words = tokenize("The quick brown fox and the lazy dog", &Lemmatizer::english(), &stop);
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
    assert!(words.iter().all(|w| !stop.contains(w)));
}

#[test]
fn output_has_no_punctuation_or_stopwords() {
    let stop = StopWords::english();
    let text = "Mr. O'Neil's well-drilling permit (No. 4471) — approved; fee: $25.00!\n\"Filed\" & recorded @ county office…";
    let out = normalize(text, &Lemmatizer::english(), &stop);
    assert!(!out.is_empty());
    assert!(out.chars().all(|c| c.is_alphanumeric() || c == ' '), "{out}");
    assert!(!out.contains("  "));
    assert!(out.split(' ').all(|w| !w.is_empty() && !stop.contains(w)));
}

#[test]
fn parallel_normalization_keeps_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = Vec::new();
    for i in 0..13 {
        let p = dir.path().join(format!("{i:02}.txt"));
        fs::write(&p, format!("well number {i} permit drilling depth")).unwrap();
        paths.push(p);
    }
    paths.push(dir.path().join("missing.txt"));

    let lem = Lemmatizer::english();
    let stop = StopWords::english();
    let pool = TaskPool::new(4).unwrap();
    let par = normalize_corpus_parallel(&paths, &lem, &stop, &pool);
    let seq = normalize_corpus(&paths, &lem, &stop);

    assert_eq!(par.completed, seq.completed);
    let got: Vec<_> = par.completed.iter().map(|d| d.path.clone()).collect();
    assert_eq!(got, paths[..13].to_vec());
    assert_eq!(par.failure_count(), 1);
    assert_eq!(par.failures[0].index, 13);
}

#[test]
fn invalid_utf8_is_replaced_not_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbled.txt");
    fs::write(&path, b"drilling \xff\xfe permit").unwrap();

    let doc = normalize_file(&path, &Lemmatizer::english(), &StopWords::english()).unwrap();
    assert_eq!(doc.path, path);
    assert_eq!(doc.tokens, vec!["drill", "permit"]);
}
