use crate::pool::{chunk_size_for, map_sequential, TaskPool, TaskReport};
use crate::Result;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref PUNCT: Regex = Regex::new(r"[\p{P}\p{S}]").expect("valid regex");
    static ref ENGLISH: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","across","after","afterwards","again","against","all","almost","alone","along","already","also","although","always","am","among","amongst","amoungst","amount","an","and","another","any","anyhow","anyone","anything","anyway","anywhere","are","around","as","at",
            "back","be","became","because","become","becomes","becoming","been","before","beforehand","behind","being","below","beside","besides","between","beyond","bill","both","bottom","but","by",
            "call","can","cannot","cant","co","computer","con","could","couldnt","cry",
            "de","describe","detail","did","didn","do","does","doesn","doing","don","done","down","due","during",
            "each","eg","eight","either","eleven","else","elsewhere","empty","enough","etc","even","ever","every","everyone","everything","everywhere","except",
            "few","fifteen","fifty","fill","find","fire","first","five","for","former","formerly","forty","found","four","from","front","full","further",
            "get","give","go",
            "had","has","hasnt","have","he","hence","her","here","hereafter","hereby","herein","hereupon","hers","herself","him","himself","his","how","however","hundred",
            "i","ie","if","in","inc","indeed","interest","into","is","it","its","itself",
            "just","keep","kg","km",
            "last","latter","latterly","least","less","ltd",
            "made","make","many","may","me","meanwhile","might","mill","mine","more","moreover","most","mostly","move","much","must","my","myself",
            "name","namely","neither","never","nevertheless","next","nine","no","nobody","none","noone","nor","not","nothing","now","nowhere",
            "of","off","often","on","once","one","only","onto","or","other","others","otherwise","our","ours","ourselves","out","over","own",
            "part","per","perhaps","please","put",
            "quite","rather","re","really","regarding",
            "same","say","see","seem","seemed","seeming","seems","serious","several","she","should","show","side","since","sincere","six","sixty","so","some","somehow","someone","something","sometime","sometimes","somewhere","still","such","system",
            "take","ten","than","that","the","their","them","themselves","then","thence","there","thereafter","thereby","therefore","therein","thereupon","these","they","thick","thin","third","this","those","though","three","through","throughout","thru","thus","to","together","too","top","toward","towards","twelve","twenty","two",
            "un","under","unless","until","up","upon","us","used","using",
            "various","very","via",
            "was","we","well","were","what","whatever","when","whence","whenever","where","whereafter","whereas","whereby","wherein","whereupon","wherever","whether","which","while","whither","who","whoever","whole","whom","whose","why","will","with","within","without","would",
            "yet","you","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// Lowercase words dropped from normalized text.
#[derive(Debug, Clone)]
pub struct StopWords {
    words: HashSet<String>,
}

impl StopWords {
    pub fn english() -> Self {
        Self { words: ENGLISH.iter().map(|w| w.to_string()).collect() }
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self { words: words.into_iter().map(|w| w.as_ref().to_lowercase()).collect() }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Default for StopWords {
    fn default() -> Self {
        Self::english()
    }
}

/// Loaded word-reduction resource. Build it once with [`Lemmatizer::load`] and
/// pass it to every normalization call; dropping it releases it.
pub struct Lemmatizer {
    stemmer: Stemmer,
}

impl Lemmatizer {
    pub fn load(algorithm: Algorithm) -> Self {
        let lemmatizer = Self { stemmer: Stemmer::create(algorithm) };
        tracing::debug!(?algorithm, "lemmatizer loaded");
        lemmatizer
    }

    pub fn english() -> Self {
        Self::load(Algorithm::English)
    }

    /// Base form of an already-lowercased word.
    pub fn lemma(&self, word: &str) -> String {
        self.stemmer.stem(word).into_owned()
    }
}

/// Tokenize text: NFKC normalization, lowercase, punctuation and symbols
/// stripped, whitespace collapsed, words lemmatized, stop-words removed
/// both before and after lemmatization.
pub fn tokenize(text: &str, lemmatizer: &Lemmatizer, stop_words: &StopWords) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    let stripped = PUNCT.replace_all(&normalized, "");
    let mut tokens = Vec::new();
    for word in stripped.split_whitespace() {
        if stop_words.contains(word) {
            continue;
        }
        let lemma = lemmatizer.lemma(word);
        if lemma.is_empty() || stop_words.contains(&lemma) {
            continue;
        }
        tokens.push(lemma);
    }
    tokens
}

/// [`tokenize`] joined with single spaces.
pub fn normalize(text: &str, lemmatizer: &Lemmatizer, stop_words: &StopWords) -> String {
    tokenize(text, lemmatizer, stop_words).join(" ")
}

/// A text document after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    pub path: PathBuf,
    pub tokens: Vec<String>,
}

impl NormalizedText {
    pub fn joined(&self) -> String {
        self.tokens.join(" ")
    }
}

/// Read and normalize one file. Invalid UTF-8 is replaced, not rejected.
pub fn normalize_file(path: &Path, lemmatizer: &Lemmatizer, stop_words: &StopWords) -> Result<NormalizedText> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    let tokens = tokenize(&text, lemmatizer, stop_words);
    tracing::trace!(path = %path.display(), tokens = tokens.len(), "normalized");
    Ok(NormalizedText { path: path.to_path_buf(), tokens })
}

pub fn normalize_corpus(paths: &[PathBuf], lemmatizer: &Lemmatizer, stop_words: &StopWords) -> TaskReport<NormalizedText> {
    let report = map_sequential(paths, |p| normalize_file(p, lemmatizer, stop_words));
    report.log_failures("normalize");
    report
}

/// Shard `paths` into one contiguous chunk per core and normalize the chunks
/// on `pool`. Output order matches `paths`.
pub fn normalize_corpus_parallel(
    paths: &[PathBuf],
    lemmatizer: &Lemmatizer,
    stop_words: &StopWords,
    pool: &TaskPool,
) -> TaskReport<NormalizedText> {
    let chunk_size = chunk_size_for(paths.len(), num_cpus::get());
    let report = pool.map_chunked(paths, chunk_size, |p| normalize_file(p, lemmatizer, stop_words));
    report.log_failures("normalize");
    tracing::info!(documents = report.completed.len(), failed = report.failure_count(), chunk_size, "normalized corpus");
    report
}
