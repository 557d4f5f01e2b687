//! Filename helpers for delivered reports.
//!
//! Report filenames are derived from the identifier or, when the caller came
//! in through a phone lookup, from the worker's names. Names are slugified
//! with the `slug` crate and joined with underscores so the result stays a
//! safe `Content-Disposition` token.

use slug::slugify;
use thiserror::Error;

use crate::domain::{entities::WorkerRecord, types::Identifier};

pub const REPORT_FILENAME_PREFIX: &str = "estracto_sueldo";
const MAX_STEM_LEN: usize = 96;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
}

/// Derive an underscore-separated stem from human-readable text.
pub fn derive_stem(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let candidate = slugify(input).replace('-', "_");
    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    let mut stem: String = candidate.chars().take(MAX_STEM_LEN).collect();
    while stem.ends_with('_') {
        stem.pop();
    }
    Ok(stem)
}

pub fn report_filename_for_identifier(identifier: Identifier) -> String {
    format!("{REPORT_FILENAME_PREFIX}_{identifier}.pdf")
}

/// Filename built from the worker's names, falling back to the identifier.
pub fn report_filename_for_worker(worker: &WorkerRecord) -> String {
    match derive_stem(&worker.full_name()) {
        Ok(stem) => format!("{REPORT_FILENAME_PREFIX}_{stem}.pdf"),
        Err(_) => report_filename_for_identifier(worker.identifier),
    }
}
