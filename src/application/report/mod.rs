//! Salary-extract report delivery.
//!
//! Content is produced by an external renderer process; this module only
//! launches it, validates what it claims to have written, and owns the
//! resulting file until its bytes are in memory and it has been deleted.

mod artifact;
mod renderer;
mod service;
mod types;

pub use artifact::{ArtifactReadError, with_artifact};
pub use renderer::{EmptyOutputPolicy, ProcessRenderer, RendererConfig, ReportRenderer};
pub use service::{ReportDocument, ReportError, ReportService};
pub use types::{RenderFailure, RenderFailureKind, RenderRequest, RenderResult, RenderedArtifact};
