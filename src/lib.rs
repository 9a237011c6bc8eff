//! unexport library for narrowing the visibility of unused exported
//! declarations.
//!
//! The library works on an already type-checked program model and never
//! parses source itself. The core workflow has four phases:
//!
//! 1. **Loading**: Obtain a [`Program`] from a front end's JSON document
//! 2. **Usage**: Collect declarations referenced from other packages, including
//!    methods pinned by cross-package interface satisfaction
//! 3. **Checking**: Propose the unexported spelling for every remaining exported
//!    declaration of the target package and detect naming conflicts
//! 4. **Rewriting**: Apply approved renames to every affected file at once
//!
//! # Example
//!
//! ```no_run
//! use unexport::loader::{JsonLoader, Loader};
//! use unexport::Unexporter;
//!
//! let program = JsonLoader::new("model.json").load().unwrap();
//! let session = Unexporter::new(program, "example.com/shapes").unwrap();
//!
//! for candidate in session.candidates() {
//!     println!("{} -> {}", candidate.id, candidate.to);
//! }
//!
//! // Rename every candidate that has no conflict.
//! let report = session.apply_all().unwrap();
//! println!("Renamed {} occurrences", report.occurrences);
//! ```

pub mod analyzer;
pub mod checker;
pub mod error;
pub mod loader;
pub mod methodset;
pub mod model;
pub mod renamer;
pub mod review;
pub mod rewriter;
pub mod satisfy;
pub mod session;
pub mod usage;

// Re-export commonly used types at crate root
pub use analyzer::{Candidate, DetectionResult, Diagnostics};
pub use error::{Error, Result};
pub use model::{Program, QualifiedName};
pub use renamer::{ModelRenamer, RenamePlan, Renamer};
pub use review::{Decision, Review};
pub use rewriter::ApplyReport;
pub use session::{Unexporter, compute_candidates};
