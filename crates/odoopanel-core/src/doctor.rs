use std::fmt;
use std::path::Path;

use crate::config::{PanelConfig, load_config, resolve_config_path};
use crate::session::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Pass,
    Fail,
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctorCheck {
    pub name: String,
    pub state: CheckState,
    pub details: String,
}

impl DoctorCheck {
    pub fn pass(name: &str, details: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            state: CheckState::Pass,
            details: details.into(),
        }
    }

    pub fn fail(name: &str, details: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            state: CheckState::Fail,
            details: details.into(),
        }
    }

    pub fn skipped(name: &str, reason: &str) -> Self {
        Self::fail(name, format!("skipped because {reason}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctorReport {
    pub checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    pub fn has_failures(&self) -> bool {
        self.checks
            .iter()
            .any(|check| check.state == CheckState::Fail)
    }

    pub fn summary(&self) -> String {
        let passed = self
            .checks
            .iter()
            .filter(|check| check.state == CheckState::Pass)
            .count();
        let failed = self.checks.len().saturating_sub(passed);
        format!("{passed} passed, {failed} failed")
    }
}

pub const API_REACHABLE_CHECK: &str = "api is reachable";

/// Local checks plus the config they loaded, so the caller can probe the remote side.
#[derive(Debug, Clone)]
pub struct LocalDoctor {
    pub report: DoctorReport,
    pub config: Option<PanelConfig>,
}

pub fn run_local_checks() -> LocalDoctor {
    let store = SessionStore::default_location().ok();
    match resolve_config_path() {
        Ok(config_path) => run_local_checks_at(&config_path, store.as_ref()),
        Err(error) => {
            let mut checks = vec![DoctorCheck::fail("config path resolves", error.to_string())];
            checks.extend(
                [
                    "config file exists",
                    "config parses and validates",
                    "session is present",
                ]
                .into_iter()
                .map(|name| DoctorCheck::skipped(name, "config path could not be resolved")),
            );
            LocalDoctor {
                report: DoctorReport { checks },
                config: None,
            }
        }
    }
}

pub fn run_local_checks_at(config_path: &Path, store: Option<&SessionStore>) -> LocalDoctor {
    let mut checks = vec![DoctorCheck::pass(
        "config path resolves",
        config_path.display().to_string(),
    )];
    let mut config = None;

    if config_path.exists() {
        checks.push(DoctorCheck::pass(
            "config file exists",
            format!("found at {}", config_path.display()),
        ));

        match load_config(config_path) {
            Ok(loaded) => {
                checks.push(DoctorCheck::pass(
                    "config parses and validates",
                    format!("api at {}", loaded.api.base_url),
                ));
                config = Some(loaded);
            }
            Err(error) => {
                checks.push(DoctorCheck::fail(
                    "config parses and validates",
                    error.to_string(),
                ));
            }
        }
    } else {
        checks.push(DoctorCheck::fail(
            "config file exists",
            format!("expected at {}", config_path.display()),
        ));
        checks.push(DoctorCheck::skipped(
            "config parses and validates",
            "config file is missing",
        ));
    }

    checks.push(check_session(store));

    LocalDoctor {
        report: DoctorReport { checks },
        config,
    }
}

fn check_session(store: Option<&SessionStore>) -> DoctorCheck {
    let Some(store) = store else {
        return DoctorCheck::fail("session is present", "session path could not be resolved");
    };

    match store.load() {
        Ok(Some(session)) => DoctorCheck::pass(
            "session is present",
            format!("logged in as {}", session.user.username),
        ),
        Ok(None) => DoctorCheck::fail(
            "session is present",
            format!("no session at {}; run `odoopanel login`", store.path().display()),
        ),
        Err(error) => DoctorCheck::fail("session is present", error.to_string()),
    }
}
