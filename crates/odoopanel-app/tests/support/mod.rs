use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::BoxFuture;
use odoopanel_app::App;
use odoopanel_app::remote::{BackupUpload, PanelApi, ProgressFn, RemoteError};
use odoopanel_core::config::{ApiConfig, GitConfig, PanelConfig, PollingConfig};
use odoopanel_core::job::SlotKey;
use odoopanel_core::models::{
    BackupRecord, BranchListingResponse, DeployLogRecord, InstanceRecord, JobRequest, LogSnapshot,
    LoginResponse, StartAccepted, UserProfile,
};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Begin(JobRequest),
    FetchLog(SlotKey),
    ListBranches(String),
    Upload { instance: String, file_name: String },
}

#[derive(Default)]
pub struct ScriptedApi {
    begins: Mutex<VecDeque<Result<StartAccepted, RemoteError>>>,
    logs: Mutex<VecDeque<Result<LogSnapshot, RemoteError>>>,
    branches: Mutex<Option<Result<BranchListingResponse, RemoteError>>>,
    uploads: Mutex<VecDeque<Result<StartAccepted, RemoteError>>>,
    log_gate: Mutex<Option<Arc<Notify>>>,
    calls: Mutex<Vec<Call>>,
}

#[allow(dead_code)]
impl ScriptedApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_begin(&self, result: Result<StartAccepted, RemoteError>) {
        self.begins.lock().expect("begins lock").push_back(result);
    }

    pub fn push_log(&self, result: Result<LogSnapshot, RemoteError>) {
        self.logs.lock().expect("logs lock").push_back(result);
    }

    pub fn push_upload(&self, result: Result<StartAccepted, RemoteError>) {
        self.uploads.lock().expect("uploads lock").push_back(result);
    }

    pub fn set_branches(&self, result: Result<BranchListingResponse, RemoteError>) {
        *self.branches.lock().expect("branches lock") = Some(result);
    }

    /// Holds every log fetch until the returned gate is notified.
    pub fn gate_logs(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.log_gate.lock().expect("gate lock") = Some(Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn begin_calls(&self) -> Vec<JobRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Begin(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn fetch_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::FetchLog(_)))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

impl PanelApi for ScriptedApi {
    fn begin<'a>(
        &'a self,
        request: &'a JobRequest,
    ) -> BoxFuture<'a, Result<StartAccepted, RemoteError>> {
        self.record(Call::Begin(request.clone()));
        let next = self
            .begins
            .lock()
            .expect("begins lock")
            .pop_front()
            .unwrap_or_else(|| Err(RemoteError::Transport("missing scripted begin".to_string())));
        async move { next }.boxed()
    }

    fn fetch_log<'a>(&'a self, slot: &'a SlotKey) -> BoxFuture<'a, Result<LogSnapshot, RemoteError>> {
        self.record(Call::FetchLog(slot.clone()));
        let gate = self.log_gate.lock().expect("gate lock").clone();
        async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            self.logs
                .lock()
                .expect("logs lock")
                .pop_front()
                .unwrap_or_else(|| Ok(LogSnapshot::default()))
        }
        .boxed()
    }

    fn list_instances(&self) -> BoxFuture<'_, Result<Vec<InstanceRecord>, RemoteError>> {
        async move { Ok(Vec::new()) }.boxed()
    }

    fn list_backups<'a>(
        &'a self,
        _instance: &'a str,
    ) -> BoxFuture<'a, Result<Vec<BackupRecord>, RemoteError>> {
        async move { Ok(Vec::new()) }.boxed()
    }

    fn list_branches<'a>(
        &'a self,
        instance: &'a str,
    ) -> BoxFuture<'a, Result<BranchListingResponse, RemoteError>> {
        self.record(Call::ListBranches(instance.to_string()));
        let next = self
            .branches
            .lock()
            .expect("branches lock")
            .clone()
            .unwrap_or_else(|| Err(RemoteError::Transport("missing scripted branches".to_string())));
        async move { next }.boxed()
    }

    fn deploy_logs<'a>(
        &'a self,
        _instance: &'a str,
        _limit: u32,
    ) -> BoxFuture<'a, Result<Vec<DeployLogRecord>, RemoteError>> {
        async move { Ok(Vec::new()) }.boxed()
    }

    fn upload_backup(
        &self,
        upload: BackupUpload,
        progress: ProgressFn,
    ) -> BoxFuture<'_, Result<StartAccepted, RemoteError>> {
        self.record(Call::Upload {
            instance: upload.instance.clone(),
            file_name: upload.file_name.clone(),
        });
        let next = self
            .uploads
            .lock()
            .expect("uploads lock")
            .pop_front()
            .unwrap_or_else(|| Err(RemoteError::Transport("missing scripted upload".to_string())));

        async move {
            let total = upload.bytes.len() as u64;
            for step in 1..=4u64 {
                progress(total * step / 4, total);
            }
            next
        }
        .boxed()
    }

    fn login<'a>(
        &'a self,
        username: &'a str,
        _password: &'a str,
    ) -> BoxFuture<'a, Result<LoginResponse, RemoteError>> {
        async move {
            Ok(LoginResponse {
                access_token: "scripted-token".to_string(),
                user: UserProfile {
                    username: username.to_string(),
                    role: Some("admin".to_string()),
                },
            })
        }
        .boxed()
    }

    fn probe(&self) -> BoxFuture<'_, Result<u16, RemoteError>> {
        async move { Ok(200) }.boxed()
    }
}

pub fn test_config() -> PanelConfig {
    PanelConfig {
        version: 1,
        api: ApiConfig {
            base_url: "https://panel.example.com".to_string(),
            timeout_secs: 30,
        },
        polling: PollingConfig::default(),
        git: GitConfig::default(),
    }
}

pub fn app_with(api: &Arc<ScriptedApi>) -> App {
    let api: Arc<dyn PanelApi> = api.clone();
    App::new(api, &test_config())
}

#[allow(dead_code)]
pub fn accepted(message: &str) -> Result<StartAccepted, RemoteError> {
    Ok(StartAccepted {
        message: Some(message.to_string()),
        ..StartAccepted::default()
    })
}

#[allow(dead_code)]
pub fn log(text: &str) -> Result<LogSnapshot, RemoteError> {
    Ok(LogSnapshot {
        exists: true,
        log: text.to_string(),
    })
}
