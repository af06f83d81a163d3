//! Tolerance-aware structural diffing of page snapshots.
//!
//! This module provides:
//! - Shape-checked value comparison (`compare` submodule)
//! - The exclusion/tolerance tree read from configuration (`exclusion`)
//! - Per-path diffing of page pairs against that tree (`run`)

pub mod compare;
pub mod exclusion;
pub mod run;

pub use compare::{compare, within_tolerance};
pub use exclusion::{ExclusionRule, ExclusionSpec};
pub use run::run_diffs;
