//! Records exchanged with the remote panel API.

use serde::{Deserialize, Serialize};

use crate::job::{OperationKind, SlotKey};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InstanceRecord {
    pub name: String,
    #[serde(rename = "type", default)]
    pub environment: Option<String>,
    #[serde(default = "unknown_status")]
    pub status: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub size_human: Option<String>,
}

impl InstanceRecord {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

fn unknown_status() -> String {
    "unknown".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BackupRecord {
    pub filename: String,
    pub date: String,
    #[serde(default)]
    pub size_bytes: u64,
    pub size_human: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeployLogRecord {
    pub action: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct BranchListingResponse {
    #[serde(default)]
    pub branches: Vec<String>,
    #[serde(default)]
    pub current_branch: Option<String>,
}

/// Latest full snapshot of a remote job log.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct LogSnapshot {
    #[serde(default)]
    pub exists: bool,
    #[serde(default)]
    pub log: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct StartAccepted {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub warning: Option<String>,
    #[serde(default)]
    pub instance_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UserProfile {
    pub username: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateDevParams {
    pub name: String,
    pub source_instance: Option<String>,
    pub neutralize: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateProdParams {
    pub name: String,
    pub version: String,
    pub edition: String,
    pub ssl_method: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookParams {
    pub auto_deploy: bool,
    pub update_modules: bool,
}

/// Parameters of the remote begin call for each kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRequest {
    CreateDev(CreateDevParams),
    CreateProd(CreateProdParams),
    UpdateDb { instance: String, neutralize: bool },
    UpdateFiles { instance: String },
    SyncFilestore { instance: String },
    RegenerateAssets { instance: String },
    Restart { instance: String },
    Delete { instance: String },
    DeleteProduction { instance: String, confirmation: String },
    BackupCreate { instance: String, custom_filename: Option<String> },
    BackupRestore { instance: String, filename: String },
    GitCommit { instance: String, message: String },
    GitPush { instance: String },
    GitPull { instance: String, branch: Option<String>, reset_hard: bool },
    WebhookConfigure { instance: String, params: WebhookParams },
    WebhookTest { instance: String },
}

impl JobRequest {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::CreateDev(_) => OperationKind::CreateDev,
            Self::CreateProd(_) => OperationKind::CreateProd,
            Self::UpdateDb { .. } => OperationKind::UpdateDb,
            Self::UpdateFiles { .. } => OperationKind::UpdateFiles,
            Self::SyncFilestore { .. } => OperationKind::SyncFilestore,
            Self::RegenerateAssets { .. } => OperationKind::RegenerateAssets,
            Self::Restart { .. } => OperationKind::Restart,
            Self::Delete { .. } => OperationKind::Delete,
            Self::DeleteProduction { .. } => OperationKind::DeleteProduction,
            Self::BackupCreate { .. } => OperationKind::BackupCreate,
            Self::BackupRestore { .. } => OperationKind::BackupRestore,
            Self::GitCommit { .. } => OperationKind::GitCommit,
            Self::GitPush { .. } => OperationKind::GitPush,
            Self::GitPull {
                reset_hard: true, ..
            } => OperationKind::GitResetHard,
            Self::GitPull { .. } => OperationKind::GitPull,
            Self::WebhookConfigure { .. } => OperationKind::WebhookConfigure,
            Self::WebhookTest { .. } => OperationKind::WebhookTest,
        }
    }

    /// Instance the job acts on; creation jobs target the name the remote side will assign.
    pub fn target(&self) -> String {
        match self {
            Self::CreateDev(params) => crate::names::dev_instance_name(&params.name),
            Self::CreateProd(params) => crate::names::prod_instance_name(&params.name),
            Self::UpdateDb { instance, .. }
            | Self::UpdateFiles { instance }
            | Self::SyncFilestore { instance }
            | Self::RegenerateAssets { instance }
            | Self::Restart { instance }
            | Self::Delete { instance }
            | Self::DeleteProduction { instance, .. }
            | Self::BackupCreate { instance, .. }
            | Self::BackupRestore { instance, .. }
            | Self::GitCommit { instance, .. }
            | Self::GitPush { instance }
            | Self::GitPull { instance, .. }
            | Self::WebhookConfigure { instance, .. }
            | Self::WebhookTest { instance } => instance.clone(),
        }
    }

    pub fn slot(&self) -> SlotKey {
        SlotKey::new(self.kind(), self.target())
    }
}
