use std::sync::Arc;

use futures::future::BoxFuture;
use odoopanel_core::job::SlotKey;
use odoopanel_core::models::{
    BackupRecord, BranchListingResponse, DeployLogRecord, InstanceRecord, JobRequest, LogSnapshot,
    LoginResponse, StartAccepted,
};
use thiserror::Error;

/// Byte-progress callback: `(loaded, total)`.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("session expired or missing; run `odoopanel login`")]
    Unauthorized,
    #[error("remote rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("{error}")]
    UncommittedChanges {
        error: String,
        suggestion: Option<String>,
        changed_files: Option<u64>,
    },
    #[error("remote answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("failed to decode remote response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupUpload {
    pub instance: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Remote panel surface. Implemented over HTTP in production and scripted in tests.
pub trait PanelApi: Send + Sync {
    fn begin<'a>(&'a self, request: &'a JobRequest)
    -> BoxFuture<'a, Result<StartAccepted, RemoteError>>;

    fn fetch_log<'a>(&'a self, slot: &'a SlotKey) -> BoxFuture<'a, Result<LogSnapshot, RemoteError>>;

    fn list_instances(&self) -> BoxFuture<'_, Result<Vec<InstanceRecord>, RemoteError>>;

    fn list_backups<'a>(
        &'a self,
        instance: &'a str,
    ) -> BoxFuture<'a, Result<Vec<BackupRecord>, RemoteError>>;

    fn list_branches<'a>(
        &'a self,
        instance: &'a str,
    ) -> BoxFuture<'a, Result<BranchListingResponse, RemoteError>>;

    fn deploy_logs<'a>(
        &'a self,
        instance: &'a str,
        limit: u32,
    ) -> BoxFuture<'a, Result<Vec<DeployLogRecord>, RemoteError>>;

    fn upload_backup(
        &self,
        upload: BackupUpload,
        progress: ProgressFn,
    ) -> BoxFuture<'_, Result<StartAccepted, RemoteError>>;

    fn login<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<LoginResponse, RemoteError>>;

    /// Any HTTP answer counts as reachable; returns the status code.
    fn probe(&self) -> BoxFuture<'_, Result<u16, RemoteError>>;
}
