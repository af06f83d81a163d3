//! Domain models for SEODeploy.
//!
//! - `PageSnapshot` / `SnapshotValue`: structured page data per environment
//! - `SamplePath`, `ConvergenceRecord`, `PagePair`: pipeline records
//! - `DiffRecord`, `Message`, `PathError`: pipeline output

pub mod error;
pub mod records;
pub mod snapshot;

pub use error::{Result, SamplingError, SeoError, SnapshotError};
pub use records::{
    ConvergenceRecord, DiffKind, DiffRecord, Environment, Message, PagePair, PathError,
    SamplePath,
};
pub use snapshot::{PageSnapshot, Shape, SnapshotValue};
