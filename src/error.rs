use crate::sequence::Category;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("row {row}: order {value:?} is not one of 1, 2, 3")]
    InvalidOrder { row: usize, value: String },
    #[error("row {row}: unknown image type {value:?}")]
    UnknownCategory { row: usize, value: String },
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("cannot read asset directory {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no image found for type(s): {}", join_categories(.0))]
    Missing(Vec<Category>),
    #[error("type {category} matches several images: {}", join_paths(.files))]
    Ambiguous {
        category: Category,
        files: Vec<PathBuf>,
    },
}

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("cannot read credentials {path}: {detail}")]
    Credentials { path: PathBuf, detail: String },
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("Google Sheets request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Google Sheets HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid request url: {0}")]
    Url(String),
    #[error("header pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("spreadsheet has no worksheets")]
    NoWorksheet,
    #[error("sheet is empty or has no data rows")]
    Empty,
    #[error("sheet headers incorrect: expected {expected:?}, found {found:?}")]
    HeaderMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Row(#[from] RowError),
    #[error("no image registered for type {0}")]
    MissingAsset(Category),
    #[error("segment {index} failed: {detail}")]
    Segment { index: usize, detail: String },
    #[error("concatenation failed: {0}")]
    Concat(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn join_categories(categories: &[Category]) -> String {
    categories
        .iter()
        .map(|c| c.token())
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
