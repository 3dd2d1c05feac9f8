use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use odoopanel_core::config::{GitConfig, PanelConfig, PollingConfig, load_config, resolve_config_path};
use odoopanel_core::confirm::ConfirmationRejected;
use odoopanel_core::doctor::{API_REACHABLE_CHECK, DoctorCheck, DoctorReport, run_local_checks};
use odoopanel_core::job::SlotKey;
use thiserror::Error;

pub mod branch;
pub mod catalog;
pub mod http;
pub mod jobs;
pub mod registry;
pub mod remote;
pub mod session;
pub mod tracker;
pub mod upload;

use registry::{AlreadyActiveError, JobRegistry};
use remote::{PanelApi, RemoteError};
use tracker::{TrackerPhase, TrackerState};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("{message}")]
    Validation { message: String },
    #[error(transparent)]
    AlreadyActive(#[from] AlreadyActiveError),
    #[error(transparent)]
    ConfirmationRejected(#[from] ConfirmationRejected),
    #[error("{error}")]
    UncommittedChanges {
        error: String,
        suggestion: Option<String>,
        changed_files: Option<u64>,
    },
    #[error("{slot} failed: {sentinel}")]
    RemoteJobFailure {
        slot: SlotKey,
        sentinel: String,
        remediation: Option<String>,
        log: String,
    },
    #[error("session expired or missing; run `odoopanel login`")]
    Unauthorized,
    #[error("request failed: {message}")]
    Transport { message: String },
}

impl From<RemoteError> for JobError {
    fn from(error: RemoteError) -> Self {
        match error {
            RemoteError::Unauthorized => Self::Unauthorized,
            RemoteError::Rejected { message, .. } => Self::Validation { message },
            RemoteError::UncommittedChanges {
                error,
                suggestion,
                changed_files,
            } => Self::UncommittedChanges {
                error,
                suggestion,
                changed_files,
            },
            RemoteError::Status { status, body } => Self::Validation {
                message: format!("remote answered {status}: {body}"),
            },
            RemoteError::Transport(message) => Self::Transport { message },
            RemoteError::Decode(message) => Self::Transport {
                message: format!("invalid remote response: {message}"),
            },
        }
    }
}

/// Turns a finished tracker state into the caller-facing outcome.
pub fn job_outcome(slot: &SlotKey, state: TrackerState) -> Result<TrackerState, JobError> {
    if state.phase != TrackerPhase::Failed {
        return Ok(state);
    }

    let (sentinel, remediation) = match state.terminal_reason.clone() {
        Some(reason) => (reason.sentinel, reason.remediation),
        None => ("remote job failed".to_string(), None),
    };
    Err(JobError::RemoteJobFailure {
        slot: slot.clone(),
        sentinel,
        remediation,
        log: state.raw_log,
    })
}

pub struct App {
    pub api: Arc<dyn PanelApi>,
    pub registry: JobRegistry,
    pub polling: PollingConfig,
    pub git: GitConfig,
}

impl App {
    pub fn new(api: Arc<dyn PanelApi>, config: &PanelConfig) -> Self {
        Self {
            api,
            registry: JobRegistry::new(),
            polling: config.polling.clone(),
            git: config.git.clone(),
        }
    }

    pub fn ensure_config_ready() -> Result<PanelConfig> {
        let config_path = resolve_config_path().context("failed to resolve config path")?;

        if !config_path.exists() {
            bail!(
                "missing config at {}\nCreate ~/.config/odoopanel/config.toml and see README.md for setup instructions.",
                config_path.display()
            );
        }

        load_config(&config_path).map_err(|error| {
            anyhow!(
                "invalid config at {}: {error}\nFix the config and retry. See README.md for setup instructions.",
                config_path.display()
            )
        })
    }

    /// Local checks, plus a reachability probe when an API client is available.
    pub async fn doctor(api: Option<&dyn PanelApi>) -> DoctorReport {
        let local = run_local_checks();
        let mut report = local.report;

        let check = match (api, local.config) {
            (Some(api), Some(config)) => match api.probe().await {
                Ok(status) => DoctorCheck::pass(
                    API_REACHABLE_CHECK,
                    format!("{} answered with status {status}", config.api.base_url),
                ),
                Err(error) => DoctorCheck::fail(API_REACHABLE_CHECK, error.to_string()),
            },
            _ => DoctorCheck::skipped(API_REACHABLE_CHECK, "config is not usable"),
        };
        report.checks.push(check);
        report
    }
}
