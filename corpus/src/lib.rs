pub mod dictionary;
pub mod error;
pub mod imaging;
pub mod inspect;
pub mod inventory;
pub mod lda;
pub mod ocr;
pub mod pool;
pub mod report;
pub mod similarity;
pub mod tokenizer;

pub use dictionary::{BowVector, Corpus, Dictionary, Document, FilterParams};
pub use error::{CorpusError, OcrError, Result};
pub use lda::{LdaModel, LdaParams};
pub use pool::{TaskFailure, TaskPool, TaskReport};
pub use tokenizer::{Lemmatizer, StopWords};

pub type TermId = u32;
pub type TopicId = usize;
