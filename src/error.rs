use thiserror::Error;

#[derive(Error, Debug)]
pub enum SkosError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Document error: {0}")]
    Document(String),
    #[error("Parse error: {message}")]
    Parse { message: String, line: Option<usize>, col: Option<usize> },
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
    #[error("Unknown thesaurus: {0}")]
    UnknownThesaurus(String),
}

pub type Result<T> = std::result::Result<T, SkosError>;

// Helper conversions
impl From<rusqlite::Error> for SkosError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

impl From<quick_xml::Error> for SkosError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Document(e.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for SkosError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Self::Document(e.to_string())
    }
}

impl From<config::ConfigError> for SkosError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<regex::Error> for SkosError {
    fn from(e: regex::Error) -> Self {
        Self::MalformedInput(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for SkosError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Lock(e.to_string())
    }
}
