use corpus::inspect::{inspect_classification, rank_by_size};
use corpus::inventory::{scan, FileKind};
use corpus::ocr::{ocr_parallel, ocr_sequential, transcript_path, OcrEngine, OcrOptions};
use corpus::report::{load_topics, save_topics, ReportPaths};
use corpus::similarity::{similar_images, TfidfMatrix};
use corpus::tokenizer::normalize_corpus;
use corpus::{Corpus, FilterParams, LdaModel, LdaParams, Lemmatizer, OcrError, StopWords, TaskPool};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Writes a transcript derived from the image file name.
struct FakeOcr;

impl OcrEngine for FakeOcr {
    fn name(&self) -> &str {
        "fake"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn recognize(&self, image: &Path) -> Result<PathBuf, OcrError> {
        let out = transcript_path(image);
        let stem = image.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if stem.starts_with("bad") {
            return Err(OcrError::Failed { path: image.to_path_buf(), stderr: "unreadable page".into() });
        }
        fs::write(&out, format!("transcript of {stem}"))?;
        Ok(out)
    }
}

fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"x").unwrap();
}

#[test]
fn inventory_counts_each_kind() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    for name in ["a.tif", "b/c.tif", "b/d/e.tif", "a.xml", "b/c.xml", "notes.txt", "thumbs.db"] {
        touch(&root.join(name));
    }

    let inv = scan(root).unwrap();
    let counts = inv.counts();
    assert_eq!((counts.images, counts.metadata, counts.texts, counts.other), (3, 2, 1, 1));
    assert_eq!(counts.total(), 7);
    assert!(inv.images.iter().all(|p| FileKind::classify(p) == FileKind::Image));
}

#[test]
fn sequential_and_parallel_ocr_write_the_same_files() {
    let seq_dir = tempfile::tempdir().unwrap();
    let par_dir = tempfile::tempdir().unwrap();
    let names = ["p1.tif", "p2.tif", "sub/p3.tif", "bad.tif", "p4.tif"];
    let mut seq_images = Vec::new();
    let mut par_images = Vec::new();
    for name in names {
        seq_images.push(seq_dir.path().join(name));
        par_images.push(par_dir.path().join(name));
        touch(seq_images.last().unwrap());
        touch(par_images.last().unwrap());
    }

    let seq = ocr_sequential(&FakeOcr, &seq_images, OcrOptions::default());
    let pool = TaskPool::new(3).unwrap();
    let par = ocr_parallel(&FakeOcr, &par_images, &pool, OcrOptions::default());

    let rel = |root: &Path, files: &[PathBuf]| -> BTreeSet<PathBuf> {
        files.iter().map(|p| p.strip_prefix(root).unwrap().to_path_buf()).collect()
    };
    assert_eq!(rel(seq_dir.path(), &seq.completed), rel(par_dir.path(), &par.completed));
    assert_eq!(seq.completed.len(), 4);
    assert_eq!(seq.failure_count(), 1);
    assert_eq!(par.failure_count(), 1);

    let on_disk = scan(par_dir.path()).unwrap();
    assert_eq!(on_disk.counts().texts, 4);
}

#[test]
fn skip_existing_leaves_transcripts_alone() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("page.tif");
    touch(&image);
    fs::write(transcript_path(&image), "corrected by hand").unwrap();

    let report = ocr_sequential(&FakeOcr, &[image.clone()], OcrOptions { skip_existing: true });
    assert!(report.is_clean());
    assert_eq!(fs::read_to_string(transcript_path(&image)).unwrap(), "corrected by hand");
}

const PAGES: &[&str] = &[
    "Oil well drilling permit. The well depth and casing were approved by the county drilling board.",
    "Drilling log for the oil well: casing depth recorded, drilling resumed after inspection of the well.",
    "Permit for oil well drilling issued. Casing and depth to be reported to the board.",
    "Property tax assessment for the parcel. The assessor valued the land and the tax was paid.",
    "Tax receipt: parcel assessment paid in full, land value confirmed by the county assessor.",
    "Assessment notice for parcel land; tax due to the county assessor by the end of the year.",
];

fn write_pages(root: &Path) -> Vec<PathBuf> {
    PAGES
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let p = root.join(format!("doc{i}.txt"));
            fs::write(&p, text).unwrap();
            p
        })
        .collect()
}

fn small_params(workers: usize) -> LdaParams {
    LdaParams { num_topics: 2, passes: 10, chunk_size: 4, workers, ..LdaParams::default() }
}

#[test]
fn corpus_to_topics_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let texts = write_pages(dir.path());
    let lem = Lemmatizer::english();
    let stop = StopWords::english();

    let normalized = normalize_corpus(&texts, &lem, &stop).into_result().unwrap();
    let filter = FilterParams { no_below: 2, no_above: 0.9, keep_n: None };
    let corpus = Corpus::build(normalized, filter).unwrap();

    assert_eq!(corpus.len(), texts.len());
    assert_eq!(corpus.text_paths(), texts);
    let terms = corpus.dictionary.len() as u32;
    assert!(terms > 0);
    assert!(corpus.bows().all(|bow| bow.iter().all(|&(id, n)| id < terms && n > 0)));

    let model = LdaModel::train(&corpus, small_params(2)).unwrap();
    let groups = inspect_classification(&corpus, &model);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups.values().map(Vec::len).sum::<usize>(), texts.len());
    assert!(groups.values().flatten().all(|p| p.extension().is_some_and(|e| e == "tif")));

    let ranked = rank_by_size(groups);
    assert!(ranked[0].len() >= ranked[1].len());

    let out = ReportPaths::new(dir.path().join("report"));
    save_topics(&out, &ranked).unwrap();
    assert_eq!(load_topics(&out).unwrap(), ranked);
}

#[test]
fn same_seed_same_assignments() {
    let dir = tempfile::tempdir().unwrap();
    let texts = write_pages(dir.path());
    let normalized = normalize_corpus(&texts, &Lemmatizer::english(), &StopWords::english())
        .into_result()
        .unwrap();
    let corpus = Corpus::build(normalized, FilterParams { no_below: 1, no_above: 1.0, keep_n: None }).unwrap();

    let a = LdaModel::train(&corpus, small_params(1)).unwrap();
    let b = LdaModel::train(&corpus, small_params(4)).unwrap();
    assert_eq!(inspect_classification(&corpus, &a), inspect_classification(&corpus, &b));
}

#[test]
fn similar_pages_share_a_subject() {
    let dir = tempfile::tempdir().unwrap();
    let texts = write_pages(dir.path());
    let stop = StopWords::english();
    let matrix = TfidfMatrix::from_paths(&texts, &stop).unwrap();

    let hits = similar_images(&texts, &texts[3], &matrix, 3).unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].0, dir.path().join("doc3.tif"));
    let expected: BTreeSet<PathBuf> = ["doc3.tif", "doc4.tif", "doc5.tif"].iter().map(|n| dir.path().join(n)).collect();
    let got: BTreeSet<PathBuf> = hits.into_iter().map(|(p, _)| p).collect();
    assert_eq!(got, expected);
}
