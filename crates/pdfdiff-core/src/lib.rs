//! Master/edited PDF comparison
//!
//! Extracts positioned text from two revisions of a document, diffs them page
//! by page and annotates the edited revision with the changes:
//!
//! - `Granularity::Char`: whole-page character diff, each changed fragment
//!   located by text search (insertions on the edited page, deletions on the
//!   master page)
//! - `Granularity::Paragraph`: each edited paragraph paired with its nearest
//!   master paragraph, changed paragraphs outlined in place
//!
//! [`compare_documents`] runs the whole pipeline; the pieces are public for
//! callers that already hold layouts or want a different sink.

pub mod annotate;
pub mod config;
pub mod diff;
pub mod error;
pub mod extract;
pub mod font;
pub mod geometry;
pub mod layout;
pub mod locate;
pub mod orchestrator;
pub mod paragraph;
pub mod report;
pub mod source;

#[cfg(test)]
#[allow(dead_code)]
#[path = "../tests/common/pdf.rs"]
mod test_pdf;

use std::path::{Path, PathBuf};

use tracing::info;

pub use annotate::Annotator;
pub use config::{DiffConfig, Granularity, HighlightStyle, Rgb};
pub use diff::{diff_text, DiffOp};
pub use error::DiffError;
pub use extract::{extract, DocumentText, PageSource, PageText, TextBlock};
pub use font::{FontMap, FontMetrics};
pub use geometry::Rect;
pub use layout::PageLayout;
pub use locate::{Anchor, ChangeKind, Region, SpanMiss};
pub use orchestrator::{CancellationFlag, Orchestrator, RegionSink};
pub use paragraph::{match_paragraphs, ParagraphMatch};
pub use report::{ComparisonReport, PageState};
pub use source::LopdfSource;

/// Compare `master` against `edited` and write the annotated edited document
/// to `output`.
pub async fn compare_documents(
    master: impl AsRef<Path>,
    edited: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &DiffConfig,
) -> Result<ComparisonReport, DiffError> {
    compare_documents_with_cancellation(master, edited, output, config, CancellationFlag::new())
        .await
}

/// [`compare_documents`] with an external stop signal. A cancelled run
/// returns [`DiffError::Cancelled`] and leaves `output` untouched.
pub async fn compare_documents_with_cancellation(
    master: impl AsRef<Path>,
    edited: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &DiffConfig,
    cancel: CancellationFlag,
) -> Result<ComparisonReport, DiffError> {
    config.validate()?;
    let (master, edited, output) = (
        master.as_ref().to_path_buf(),
        edited.as_ref().to_path_buf(),
        output.as_ref(),
    );

    info!(master = %master.display(), edited = %edited.display(), "loading documents");
    let master_pages = load_layouts(master).await?;
    let edited_pages = load_layouts(edited.clone()).await?;
    let mut annotator = open_annotator(edited, config.highlight.clone()).await?;

    let report = Orchestrator::new(config)
        .with_cancellation(cancel)
        .run(master_pages, edited_pages, &mut annotator)
        .await;
    if report.cancelled {
        return Err(DiffError::Cancelled);
    }

    let written = output.to_path_buf();
    tokio::task::spawn_blocking(move || annotator.save(&written))
        .await
        .map_err(|e| DiffError::AnnotationWrite(e.to_string()))??;
    info!(
        output = %output.display(),
        regions = report.regions.len(),
        "annotated document written"
    );
    Ok(report)
}

/// Load the document to annotate off the async runtime
async fn open_annotator(path: PathBuf, style: HighlightStyle) -> Result<Annotator, DiffError> {
    let label = path.clone();
    tokio::task::spawn_blocking(move || Annotator::open(&path, style))
        .await
        .map_err(|e| DiffError::DocumentOpen {
            path: label,
            message: e.to_string(),
        })?
}

/// Open a document and extract every page layout off the async runtime
async fn load_layouts(path: PathBuf) -> Result<Vec<Result<PageLayout, DiffError>>, DiffError> {
    let label = path.clone();
    tokio::task::spawn_blocking(move || -> Result<_, DiffError> {
        let source = LopdfSource::open(&path)?;
        Ok(extract::extract_layouts(&source))
    })
    .await
    .map_err(|e| DiffError::DocumentOpen {
        path: label,
        message: e.to_string(),
    })?
}
