use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use corpus::imaging::{collect_image_info, summarize, ImageSummary};
use corpus::inspect::{default_viewer, inspect_classification, label_groups, open_for_review, rank_by_size, review_slice, TopicGroup};
use corpus::inventory::{scan, InventoryCounts};
use corpus::ocr::{ocr_parallel, ocr_sequential, OcrEngine, OcrOptions, TesseractCli};
use corpus::report::{save_summary, save_topics, ReportPaths, RunSummary};
use corpus::similarity::{similar_images, TfidfMatrix};
use corpus::tokenizer::{normalize_corpus, normalize_corpus_parallel};
use corpus::{Corpus, FilterParams, LdaModel, LdaParams, Lemmatizer, StopWords, TaskPool};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "classifier")]
#[command(about = "Classify scanned documents by topic", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count images, metadata and transcripts under a directory
    Inventory {
        #[arg(long)]
        input: PathBuf,
        /// Also summarize TIFF compression and resolution
        #[arg(long, default_value_t = false)]
        image_info: bool,
        #[arg(long, default_value_t = 4)]
        workers: usize,
    },
    /// Write a .txt transcript beside every .tif image
    Ocr {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value_t = 4)]
        workers: usize,
        /// Run on the calling thread instead of a worker pool
        #[arg(long, default_value_t = false)]
        sequential: bool,
        /// Keep transcripts that already exist
        #[arg(long, default_value_t = false)]
        skip_existing: bool,
        #[arg(long, default_value = "tesseract")]
        tesseract: PathBuf,
        #[arg(long)]
        lang: Option<String>,
    },
    /// Fit a topic model over the transcripts and group their images
    Topics {
        #[arg(long)]
        input: PathBuf,
        /// Drop words found in fewer documents than this
        #[arg(long, default_value_t = 50)]
        no_below: u32,
        /// Drop words found in more than this fraction of documents
        #[arg(long, default_value_t = 0.5)]
        no_above: f64,
        #[arg(long, default_value_t = 100_000)]
        keep_n: usize,
        #[arg(long, default_value_t = 35)]
        topics: usize,
        #[arg(long, default_value_t = 40)]
        passes: usize,
        #[arg(long, default_value_t = 500)]
        chunk_size: usize,
        #[arg(long, default_value_t = 4)]
        workers: usize,
        #[arg(long, default_value_t = 1)]
        seed: u64,
        /// Position, largest first from 0, of the topic whose images are reviewed
        #[arg(long, default_value_t = 15)]
        rank: usize,
        /// Images listed (and opened) for the reviewed topic
        #[arg(long, default_value_t = 30)]
        review: usize,
        /// Open the reviewed images in a viewer
        #[arg(long, default_value_t = false)]
        open: bool,
        #[arg(long)]
        viewer: Option<String>,
        /// Write summary.json and topics.json here
        #[arg(long)]
        output: Option<PathBuf>,
        /// Normalize text on the calling thread
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
    /// Rank transcripts by TF-IDF similarity to one of them
    Similar {
        #[arg(long)]
        input: PathBuf,
        /// Transcript to compare against, as listed under --input
        #[arg(long)]
        query: PathBuf,
        #[arg(long, default_value_t = 5)]
        top: usize,
        #[arg(long, default_value_t = false)]
        open: bool,
        #[arg(long)]
        viewer: Option<String>,
    },
}

#[derive(Serialize)]
struct InventoryOutput {
    counts: InventoryCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<ImageSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unreadable_images: Option<usize>,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Inventory { input, image_info, workers } => run_inventory(input, image_info, workers),
        Commands::Ocr { input, workers, sequential, skip_existing, tesseract, lang } => {
            let mut engine = TesseractCli::new().with_binary(tesseract);
            if let Some(lang) = lang {
                engine = engine.with_language(lang);
            }
            run_ocr(input, &engine, workers, sequential, OcrOptions { skip_existing })
        }
        Commands::Topics {
            input,
            no_below,
            no_above,
            keep_n,
            topics,
            passes,
            chunk_size,
            workers,
            seed,
            rank,
            review,
            open,
            viewer,
            output,
            sequential,
        } => {
            let filter = FilterParams { no_below, no_above, keep_n: Some(keep_n) };
            let lda = LdaParams { num_topics: topics, passes, chunk_size, workers, random_seed: seed, ..LdaParams::default() };
            let viewer = open.then(|| viewer.unwrap_or_else(|| default_viewer().to_string()));
            run_topics(input, filter, lda, rank, review, viewer, output, sequential)
        }
        Commands::Similar { input, query, top, open, viewer } => {
            let viewer = open.then(|| viewer.unwrap_or_else(|| default_viewer().to_string()));
            run_similar(input, query, top, viewer)
        }
    }
}

fn run_inventory(input: PathBuf, image_info: bool, workers: usize) -> Result<()> {
    let inv = scan(&input).with_context(|| format!("scanning {}", input.display()))?;
    let mut out = InventoryOutput { counts: inv.counts(), images: None, unreadable_images: None };
    if image_info {
        let pool = TaskPool::new(workers)?.with_progress("image info");
        let report = collect_image_info(&inv.images, &pool);
        out.unreadable_images = Some(report.failure_count());
        out.images = Some(summarize(&report.completed));
    }
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn run_ocr(input: PathBuf, engine: &dyn OcrEngine, workers: usize, sequential: bool, opts: OcrOptions) -> Result<()> {
    if !engine.is_available() {
        bail!("{} is not installed or not on PATH", engine.name());
    }
    let inv = scan(&input).with_context(|| format!("scanning {}", input.display()))?;
    let report = if sequential {
        ocr_sequential(engine, &inv.images, opts)
    } else {
        let pool = TaskPool::new(workers)?.with_progress("ocr");
        ocr_parallel(engine, &inv.images, &pool, opts)
    };
    tracing::info!(
        input = %input.display(),
        transcribed = report.completed.len(),
        failed = report.failure_count(),
        "ocr run complete"
    );
    println!("transcribed {} of {} images ({} failed)", report.completed.len(), report.total(), report.failure_count());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_topics(
    input: PathBuf,
    filter: FilterParams,
    lda: LdaParams,
    rank: usize,
    review: usize,
    viewer: Option<String>,
    output: Option<PathBuf>,
    sequential: bool,
) -> Result<()> {
    let inv = scan(&input).with_context(|| format!("scanning {}", input.display()))?;
    let lemmatizer = Lemmatizer::english();
    let stop_words = StopWords::english();

    let normalized = if sequential {
        normalize_corpus(&inv.texts, &lemmatizer, &stop_words)
    } else {
        let pool = TaskPool::new(lda.workers)?.with_progress("normalize");
        normalize_corpus_parallel(&inv.texts, &lemmatizer, &stop_words, &pool)
    };
    let failed_docs = normalized.failure_count();
    let corpus = Corpus::build(normalized.completed, filter)?;
    let model = LdaModel::train(&corpus, lda)?;

    let mut ranked = rank_by_size(inspect_classification(&corpus, &model));
    label_groups(&mut ranked, &model, 10);
    if let Some(dir) = output {
        let paths = ReportPaths::new(&dir);
        let summary = RunSummary::new(corpus.len(), corpus.dictionary.len(), model.num_topics(), failed_docs);
        save_summary(&paths, &summary).with_context(|| format!("writing report to {}", dir.display()))?;
        save_topics(&paths, &ranked)?;
    }

    let Some((chosen, shown)) = review_slice(&ranked, rank, review) else {
        bail!("--rank {rank} is out of range: the model has {} topics", ranked.len());
    };
    for group in &ranked {
        println!("topic {} ({} documents): {}", group.topic, group.len(), group.top_words.join(" "));
    }
    println!();
    print_review(chosen, rank, shown);
    if let Some(viewer) = &viewer {
        open_for_review(shown, viewer);
    }
    tracing::info!(
        documents = corpus.len(),
        vocabulary = corpus.dictionary.len(),
        topics = model.num_topics(),
        failed = failed_docs,
        reviewed_topic = chosen.topic,
        reviewed_documents = chosen.len(),
        "topic run complete"
    );
    Ok(())
}

fn print_review(group: &TopicGroup, rank: usize, shown: &[PathBuf]) {
    println!("review: rank {rank}, topic {} ({} documents)", group.topic, group.len());
    for image in shown {
        println!("  {}", image.display());
    }
}

fn run_similar(input: PathBuf, query: PathBuf, top: usize, viewer: Option<String>) -> Result<()> {
    let inv = scan(&input).with_context(|| format!("scanning {}", input.display()))?;
    let matrix = TfidfMatrix::from_paths(&inv.texts, &StopWords::english())?;
    let hits = similar_images(&inv.texts, &query, &matrix, top)?;
    tracing::info!(query = %query.display(), documents = matrix.len(), hits = hits.len(), "similarity search complete");
    for (image, score) in &hits {
        println!("{score:.4}  {}", image.display());
    }
    if let Some(viewer) = viewer {
        let images: Vec<PathBuf> = hits.into_iter().map(|(p, _)| p).collect();
        open_for_review(&images, &viewer);
    }
    Ok(())
}
