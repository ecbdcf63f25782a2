//! Error types for the CLI runtime.

use std::sync::Arc;

use thiserror::Error;
use vstart_engine::{LayoutError, OrchestratorError, ProbeError, TelemetryError};

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("failed to initialise telemetry: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("failed to build the status client: {0}")]
    StatusClient(#[from] ProbeError),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}
