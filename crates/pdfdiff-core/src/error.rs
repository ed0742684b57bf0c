use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiffError {
    #[error("Failed to open {}: {message}", path.display())]
    DocumentOpen { path: PathBuf, message: String },

    #[error("Failed to extract text from page {page}: {message}")]
    Extraction { page: usize, message: String },

    #[error("Diff failed on page {page}: {message}")]
    DiffComputation { page: usize, message: String },

    #[error("Failed to write annotations: {0}")]
    AnnotationWrite(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Comparison cancelled")]
    Cancelled,
}

impl DiffError {
    /// Page index for errors scoped to one page.
    pub fn page(&self) -> Option<usize> {
        match self {
            DiffError::Extraction { page, .. } | DiffError::DiffComputation { page, .. } => {
                Some(*page)
            }
            _ => None,
        }
    }

    /// Whether the error aborts the whole run rather than one page.
    pub fn is_fatal(&self) -> bool {
        self.page().is_none()
    }
}
