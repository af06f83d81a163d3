//! Structured lifecycle events for a SEODeploy run.
//!
//! Every event is an `info!` (or `warn!`) line carrying an `event` field so
//! JSON log consumers can filter on it.

use tracing::{info, warn};

/// Span that tags everything logged during a run with its `run_id`.
///
/// ```ignore
/// orchestrator.run().instrument(run_span(&run_id)).await
/// ```
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("seodeploy.run", run_id = %run_id)
}

/// Span for a single provider module.
pub fn module_span(module: &str) -> tracing::Span {
    tracing::info_span!("seodeploy.module", module = %module)
}

pub fn emit_run_started(run_id: &str, modules: &[String]) {
    info!(event = "run.started", run_id = %run_id, modules = %modules.join(","));
}

/// Emit event: sample drawn from a discovered population.
pub fn emit_sampling_completed(source: &str, population: usize, samples: usize) {
    info!(
        event = "sampling.completed",
        source = %source,
        population = population,
        samples = samples,
    );
}

/// Emit event: one convergence batch finished for both environments.
pub fn emit_batch_finished(batch: usize, batches: usize, paths: usize) {
    info!(
        event = "convergence.batch_finished",
        batch = batch,
        batches = batches,
        paths = paths,
    );
}

pub fn emit_module_finished(module: &str, passing: bool, messages: usize, errors: usize) {
    info!(
        event = "module.finished",
        module = %module,
        passing = passing,
        messages = messages,
        errors = errors,
    );
}

pub fn emit_run_finished(run_id: &str, duration_ms: u64, samples: usize, passing: bool) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        samples = samples,
        passing = passing,
    );
}

/// Emit event: the run aborted on a fatal error.
pub fn emit_run_fatal(run_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.fatal", run_id = %run_id, error = %error);
}
