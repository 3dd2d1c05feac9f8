use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::Classifier;
use crate::config::PollingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    CreateDev,
    CreateProd,
    UpdateDb,
    UpdateFiles,
    SyncFilestore,
    RegenerateAssets,
    Restart,
    Delete,
    DeleteProduction,
    BackupCreate,
    BackupRestore,
    BackupUpload,
    GitCommit,
    GitPush,
    GitPull,
    GitResetHard,
    WebhookConfigure,
    WebhookTest,
}

pub const ALL_KINDS: [OperationKind; 18] = [
    OperationKind::CreateDev,
    OperationKind::CreateProd,
    OperationKind::UpdateDb,
    OperationKind::UpdateFiles,
    OperationKind::SyncFilestore,
    OperationKind::RegenerateAssets,
    OperationKind::Restart,
    OperationKind::Delete,
    OperationKind::DeleteProduction,
    OperationKind::BackupCreate,
    OperationKind::BackupRestore,
    OperationKind::BackupUpload,
    OperationKind::GitCommit,
    OperationKind::GitPush,
    OperationKind::GitPull,
    OperationKind::GitResetHard,
    OperationKind::WebhookConfigure,
    OperationKind::WebhookTest,
];

/// Groups kinds that must not run concurrently against the same target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SlotFamily {
    Creation,
    Update(OperationKind),
    Lifecycle,
    Backup,
    Git,
    Webhook,
}

/// How the outcome of a kind is observed after the begin call is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationMode {
    /// The remote side writes a log that must be polled until a sentinel appears.
    PolledLog,
    /// The begin call answers with the final outcome.
    Immediate,
    /// Byte-streamed transfer followed by a remote acknowledgement.
    Transfer,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateDev => "create-dev",
            Self::CreateProd => "create-prod",
            Self::UpdateDb => "update-db",
            Self::UpdateFiles => "update-files",
            Self::SyncFilestore => "sync-filestore",
            Self::RegenerateAssets => "regenerate-assets",
            Self::Restart => "restart",
            Self::Delete => "delete",
            Self::DeleteProduction => "delete-production",
            Self::BackupCreate => "backup-create",
            Self::BackupRestore => "backup-restore",
            Self::BackupUpload => "backup-upload",
            Self::GitCommit => "git-commit",
            Self::GitPush => "git-push",
            Self::GitPull => "git-pull",
            Self::GitResetHard => "git-reset-hard",
            Self::WebhookConfigure => "webhook-configure",
            Self::WebhookTest => "webhook-test",
        }
    }

    pub fn family(&self) -> SlotFamily {
        match self {
            Self::CreateDev | Self::CreateProd => SlotFamily::Creation,
            Self::UpdateDb | Self::UpdateFiles | Self::SyncFilestore | Self::RegenerateAssets => {
                SlotFamily::Update(*self)
            }
            Self::Restart | Self::Delete | Self::DeleteProduction => SlotFamily::Lifecycle,
            Self::BackupCreate | Self::BackupRestore | Self::BackupUpload => SlotFamily::Backup,
            Self::GitCommit | Self::GitPush | Self::GitPull | Self::GitResetHard => SlotFamily::Git,
            Self::WebhookConfigure | Self::WebhookTest => SlotFamily::Webhook,
        }
    }

    pub fn observation(&self) -> ObservationMode {
        match self {
            Self::CreateDev
            | Self::CreateProd
            | Self::UpdateDb
            | Self::UpdateFiles
            | Self::SyncFilestore
            | Self::RegenerateAssets
            | Self::BackupCreate
            | Self::BackupRestore => ObservationMode::PolledLog,
            Self::BackupUpload => ObservationMode::Transfer,
            Self::Restart
            | Self::Delete
            | Self::DeleteProduction
            | Self::GitCommit
            | Self::GitPush
            | Self::GitPull
            | Self::GitResetHard
            | Self::WebhookConfigure
            | Self::WebhookTest => ObservationMode::Immediate,
        }
    }

    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            Self::Delete | Self::DeleteProduction | Self::BackupRestore | Self::GitResetHard
        )
    }

    /// Provisioning and backup engines write slowly; everything else polls on the short interval.
    pub fn poll_interval(&self, polling: &PollingConfig) -> Duration {
        match self {
            Self::CreateProd | Self::BackupCreate | Self::BackupRestore => {
                Duration::from_millis(polling.provisioning_interval_ms)
            }
            _ => Duration::from_millis(polling.log_interval_ms),
        }
    }

    pub fn tracking_plan(&self, polling: &PollingConfig) -> TrackingPlan {
        match self.observation() {
            ObservationMode::PolledLog => TrackingPlan::Polled {
                interval: self.poll_interval(polling),
                classifier: Classifier::for_kind(*self),
                success_grace: Duration::from_millis(polling.success_grace_ms),
            },
            ObservationMode::Immediate | ObservationMode::Transfer => TrackingPlan::Immediate,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown operation kind '{value}'")]
pub struct UnknownOperationKind {
    pub value: String,
}

impl FromStr for OperationKind {
    type Err = UnknownOperationKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ALL_KINDS
            .iter()
            .copied()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| UnknownOperationKind {
                value: value.to_string(),
            })
    }
}

/// Per-kind tracking configuration handed to the operation tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingPlan {
    Polled {
        interval: Duration,
        classifier: Classifier,
        success_grace: Duration,
    },
    Immediate,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub kind: OperationKind,
    pub target: String,
}

impl SlotKey {
    pub fn new(kind: OperationKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
        }
    }

    pub fn lane(&self) -> Lane {
        Lane {
            family: self.kind.family(),
            target: self.target.clone(),
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.target)
    }
}

/// Single-flight key: one active job per family and target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lane {
    pub family: SlotFamily,
    pub target: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_their_labels() {
        for kind in ALL_KINDS {
            assert_eq!(kind.as_str().parse::<OperationKind>(), Ok(kind));
        }
        assert!("update-everything".parse::<OperationKind>().is_err());
    }

    #[test]
    fn serde_uses_kebab_case_labels() {
        let encoded = serde_json::to_string(&OperationKind::GitResetHard).expect("encode");
        assert_eq!(encoded, "\"git-reset-hard\"");
    }

    #[test]
    fn update_kinds_get_independent_lanes() {
        let db = SlotKey::new(OperationKind::UpdateDb, "dev-acme");
        let files = SlotKey::new(OperationKind::UpdateFiles, "dev-acme");
        assert_ne!(db.lane(), files.lane());
    }

    #[test]
    fn backup_and_restore_share_a_lane() {
        let backup = SlotKey::new(OperationKind::BackupCreate, "prod-acme");
        let restore = SlotKey::new(OperationKind::BackupRestore, "prod-acme");
        let upload = SlotKey::new(OperationKind::BackupUpload, "prod-acme");
        assert_eq!(backup.lane(), restore.lane());
        assert_eq!(backup.lane(), upload.lane());
    }

    #[test]
    fn git_actions_share_a_lane_per_target() {
        let commit = SlotKey::new(OperationKind::GitCommit, "dev-acme");
        let reset = SlotKey::new(OperationKind::GitResetHard, "dev-acme");
        let other = SlotKey::new(OperationKind::GitCommit, "dev-other");
        assert_eq!(commit.lane(), reset.lane());
        assert_ne!(commit.lane(), other.lane());
    }

    #[test]
    fn provisioning_kinds_poll_on_the_longer_interval() {
        let polling = PollingConfig::default();
        assert_eq!(
            OperationKind::CreateProd.poll_interval(&polling),
            Duration::from_millis(3000)
        );
        assert_eq!(
            OperationKind::UpdateDb.poll_interval(&polling),
            Duration::from_millis(2000)
        );
    }

    #[test]
    fn git_actions_are_observed_immediately() {
        let polling = PollingConfig::default();
        assert_eq!(
            OperationKind::GitPull.tracking_plan(&polling),
            TrackingPlan::Immediate
        );
        assert!(matches!(
            OperationKind::BackupRestore.tracking_plan(&polling),
            TrackingPlan::Polled { .. }
        ));
    }
}
