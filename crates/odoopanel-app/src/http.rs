use std::time::Duration;

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use odoopanel_core::config::ApiConfig;
use odoopanel_core::job::{OperationKind, SlotKey};
use odoopanel_core::models::{
    BackupRecord, BranchListingResponse, DeployLogRecord, InstanceRecord, JobRequest, LogSnapshot,
    LoginResponse, StartAccepted,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::remote::{BackupUpload, PanelApi, ProgressFn, RemoteError};

const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;
const COMMIT_FIRST: &str = "commit_first";

/// Method, path and JSON body of a begin call.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl Route {
    fn post(path: String, body: Option<Value>) -> Self {
        Self {
            method: Method::POST,
            path,
            body,
        }
    }
}

pub fn begin_route(request: &JobRequest) -> Route {
    match request {
        JobRequest::CreateDev(params) => Route::post(
            "/api/instances/create".to_string(),
            Some(json!({
                "name": params.name,
                "source_instance": params.source_instance,
                "neutralize": params.neutralize,
            })),
        ),
        JobRequest::CreateProd(params) => Route::post(
            "/api/instances/create-production".to_string(),
            Some(json!({
                "name": params.name,
                "version": params.version,
                "edition": params.edition,
                "ssl_method": params.ssl_method,
            })),
        ),
        JobRequest::UpdateDb {
            instance,
            neutralize,
        } => Route::post(
            format!("/api/instances/{instance}/update-db"),
            Some(json!({ "neutralize": neutralize })),
        ),
        JobRequest::UpdateFiles { instance } => {
            Route::post(format!("/api/instances/{instance}/update-files"), None)
        }
        JobRequest::SyncFilestore { instance } => {
            Route::post(format!("/api/instances/{instance}/sync-filestore"), None)
        }
        JobRequest::RegenerateAssets { instance } => {
            Route::post(format!("/api/instances/{instance}/regenerate-assets"), None)
        }
        JobRequest::Restart { instance } => {
            Route::post(format!("/api/instances/{instance}/restart"), None)
        }
        JobRequest::Delete { instance } => Route {
            method: Method::DELETE,
            path: format!("/api/instances/{instance}"),
            body: None,
        },
        JobRequest::DeleteProduction {
            instance,
            confirmation,
        } => Route {
            method: Method::DELETE,
            path: format!("/api/instances/production/{instance}"),
            body: Some(json!({ "confirmation": confirmation })),
        },
        JobRequest::BackupCreate {
            instance,
            custom_filename,
        } => Route::post(
            format!("/api/backup/v2/instances/{instance}/backup"),
            Some(json!({ "custom_filename": custom_filename })),
        ),
        JobRequest::BackupRestore { instance, filename } => Route::post(
            format!("/api/backup/v2/instances/{instance}/restore"),
            Some(json!({ "filename": filename })),
        ),
        JobRequest::GitCommit { instance, message } => Route::post(
            "/api/github/commit".to_string(),
            Some(json!({ "instance_name": instance, "message": message })),
        ),
        JobRequest::GitPush { instance } => Route::post(
            "/api/github/push".to_string(),
            Some(json!({ "instance_name": instance })),
        ),
        JobRequest::GitPull {
            instance,
            branch,
            reset_hard,
        } => Route::post(
            "/api/github/pull".to_string(),
            Some(json!({
                "instance_name": instance,
                "branch": branch,
                "reset_hard": reset_hard,
            })),
        ),
        JobRequest::WebhookConfigure { instance, params } => Route::post(
            format!("/api/github/webhook/{instance}"),
            Some(json!({
                "auto_deploy": params.auto_deploy,
                "update_modules": params.update_modules,
            })),
        ),
        JobRequest::WebhookTest { instance } => {
            Route::post(format!("/api/github/webhook/{instance}/test"), None)
        }
    }
}

/// Log feed polled for a kind; `None` for kinds observed on acceptance.
pub fn log_path(slot: &SlotKey) -> Option<String> {
    let target = &slot.target;
    match slot.kind {
        OperationKind::CreateDev | OperationKind::CreateProd => {
            Some(format!("/api/instances/creation-log/{target}"))
        }
        OperationKind::UpdateDb
        | OperationKind::UpdateFiles
        | OperationKind::SyncFilestore
        | OperationKind::RegenerateAssets => Some(format!(
            "/api/instances/update-log/{target}/{}",
            slot.kind
        )),
        OperationKind::BackupCreate => {
            Some(format!("/api/backup/v2/instances/{target}/backup-log"))
        }
        OperationKind::BackupRestore => {
            Some(format!("/api/backup/v2/instances/{target}/restore-log"))
        }
        _ => None,
    }
}

#[derive(Debug, Default, Deserialize)]
struct EnvelopeBody {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    warning: Option<String>,
    #[serde(default)]
    suggested_action: Option<String>,
    #[serde(default)]
    changes_info: Option<ChangesInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct ChangesInfo {
    #[serde(default)]
    total: Option<u64>,
}

/// Maps the answer to a begin call onto acceptance or a typed rejection.
pub fn decode_begin(status: u16, body: &str) -> Result<StartAccepted, RemoteError> {
    if status == StatusCode::UNAUTHORIZED.as_u16() {
        return Err(RemoteError::Unauthorized);
    }

    let envelope: EnvelopeBody = serde_json::from_str(body).unwrap_or_default();
    let accepted = (200..300).contains(&status) && envelope.success != Some(false);

    if accepted {
        return Ok(serde_json::from_str(body).unwrap_or_default());
    }

    let message = envelope
        .error
        .clone()
        .or_else(|| envelope.message.clone())
        .unwrap_or_else(|| body.trim().to_string());

    if envelope.suggested_action.as_deref() == Some(COMMIT_FIRST) {
        return Err(RemoteError::UncommittedChanges {
            error: message,
            suggestion: envelope.warning,
            changed_files: envelope.changes_info.and_then(|info| info.total),
        });
    }

    Err(RemoteError::Rejected { status, message })
}

pub fn decode_get<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, RemoteError> {
    if status == StatusCode::UNAUTHORIZED.as_u16() {
        return Err(RemoteError::Unauthorized);
    }
    if !(200..300).contains(&status) {
        return Err(RemoteError::Status {
            status,
            body: body.trim().to_string(),
        });
    }
    serde_json::from_str(body).map_err(|error| RemoteError::Decode(error.to_string()))
}

/// A 404 on a log feed means the remote job has not written its log yet.
pub fn decode_log(status: u16, body: &str) -> Result<LogSnapshot, RemoteError> {
    if status == StatusCode::NOT_FOUND.as_u16() {
        return Ok(LogSnapshot::default());
    }
    decode_get(status, body)
}

#[derive(Deserialize)]
struct InstancesBody {
    #[serde(default)]
    instances: Vec<InstanceRecord>,
}

#[derive(Deserialize)]
struct BackupsBody {
    #[serde(default)]
    backups: Vec<BackupRecord>,
}

#[derive(Deserialize)]
struct DeployLogsBody {
    #[serde(default)]
    logs: Vec<DeployLogRecord>,
}

pub struct HttpPanelApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpPanelApi {
    pub fn new(api: &ApiConfig, token: Option<String>) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()
            .map_err(|error| RemoteError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            base_url: api.base_url.trim().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{path}", self.base_url));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<(u16, String), RemoteError> {
        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_error)?;
        Ok((status, body))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteError> {
        debug!(path, "GET");
        let (status, body) = self.send(self.request(Method::GET, path)).await?;
        decode_get(status, &body)
    }
}

fn transport_error(error: reqwest::Error) -> RemoteError {
    if error.is_timeout() {
        return RemoteError::Transport(format!("request timed out: {error}"));
    }
    RemoteError::Transport(error.to_string())
}

/// Splits `bytes` into a body stream that reports progress as each chunk is pulled.
fn progress_body(bytes: Vec<u8>, progress: ProgressFn) -> Body {
    let total = bytes.len() as u64;
    let chunks: Vec<Vec<u8>> = bytes
        .chunks(UPLOAD_CHUNK_BYTES)
        .map(<[u8]>::to_vec)
        .collect();

    let mut sent = 0u64;
    let stream = futures::stream::iter(chunks).map(move |chunk| {
        sent += chunk.len() as u64;
        progress(sent, total);
        Ok::<Vec<u8>, std::io::Error>(chunk)
    });
    Body::wrap_stream(stream)
}

impl PanelApi for HttpPanelApi {
    fn begin<'a>(
        &'a self,
        request: &'a JobRequest,
    ) -> BoxFuture<'a, Result<StartAccepted, RemoteError>> {
        async move {
            let route = begin_route(request);
            debug!(method = %route.method, path = %route.path, "begin call");
            let mut builder = self.request(route.method, &route.path);
            if let Some(body) = &route.body {
                builder = builder.json(body);
            }
            let (status, body) = self.send(builder).await?;
            decode_begin(status, &body)
        }
        .boxed()
    }

    fn fetch_log<'a>(
        &'a self,
        slot: &'a SlotKey,
    ) -> BoxFuture<'a, Result<LogSnapshot, RemoteError>> {
        async move {
            let Some(path) = log_path(slot) else {
                return Ok(LogSnapshot::default());
            };
            let (status, body) = self.send(self.request(Method::GET, &path)).await?;
            decode_log(status, &body)
        }
        .boxed()
    }

    fn list_instances(&self) -> BoxFuture<'_, Result<Vec<InstanceRecord>, RemoteError>> {
        async move {
            let body: InstancesBody = self.get_json("/api/instances").await?;
            Ok(body.instances)
        }
        .boxed()
    }

    fn list_backups<'a>(
        &'a self,
        instance: &'a str,
    ) -> BoxFuture<'a, Result<Vec<BackupRecord>, RemoteError>> {
        async move {
            let body: BackupsBody = self
                .get_json(&format!("/api/backup/v2/instances/{instance}/backups"))
                .await?;
            Ok(body.backups)
        }
        .boxed()
    }

    fn list_branches<'a>(
        &'a self,
        instance: &'a str,
    ) -> BoxFuture<'a, Result<BranchListingResponse, RemoteError>> {
        async move {
            self.get_json(&format!("/api/github/branches/{instance}"))
                .await
        }
        .boxed()
    }

    fn deploy_logs<'a>(
        &'a self,
        instance: &'a str,
        limit: u32,
    ) -> BoxFuture<'a, Result<Vec<DeployLogRecord>, RemoteError>> {
        async move {
            let body: DeployLogsBody = self
                .get_json(&format!("/api/github/deploy-logs/{instance}?limit={limit}"))
                .await?;
            Ok(body.logs)
        }
        .boxed()
    }

    fn upload_backup(
        &self,
        upload: BackupUpload,
        progress: ProgressFn,
    ) -> BoxFuture<'_, Result<StartAccepted, RemoteError>> {
        async move {
            let length = upload.bytes.len() as u64;
            let part = Part::stream_with_length(progress_body(upload.bytes, progress), length)
                .file_name(upload.file_name);
            let form = Form::new().part("file", part);
            let path = format!("/api/backup/v2/instances/{}/upload", upload.instance);

            let (status, body) = self
                .send(self.request(Method::POST, &path).multipart(form))
                .await?;
            decode_begin(status, &body)
        }
        .boxed()
    }

    fn login<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<LoginResponse, RemoteError>> {
        async move {
            let builder = self
                .request(Method::POST, "/api/auth/login")
                .json(&json!({ "username": username, "password": password }));
            let (status, body) = self.send(builder).await?;
            if status == StatusCode::UNAUTHORIZED.as_u16() {
                let envelope: EnvelopeBody = serde_json::from_str(&body).unwrap_or_default();
                return Err(RemoteError::Rejected {
                    status,
                    message: envelope
                        .error
                        .unwrap_or_else(|| "invalid username or password".to_string()),
                });
            }
            decode_get(status, &body)
        }
        .boxed()
    }

    fn probe(&self) -> BoxFuture<'_, Result<u16, RemoteError>> {
        async move {
            let (status, _) = self
                .send(self.request(Method::GET, "/api/instances"))
                .await?;
            Ok(status)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use odoopanel_core::models::{CreateDevParams, WebhookParams};

    use super::*;

    #[test]
    fn update_db_posts_neutralize_flag() {
        let route = begin_route(&JobRequest::UpdateDb {
            instance: "dev-acme".to_string(),
            neutralize: false,
        });
        assert_eq!(route.method, Method::POST);
        assert_eq!(route.path, "/api/instances/dev-acme/update-db");
        assert_eq!(route.body, Some(json!({ "neutralize": false })));
    }

    #[test]
    fn reset_hard_goes_through_pull_endpoint() {
        let route = begin_route(&JobRequest::GitPull {
            instance: "dev-acme".to_string(),
            branch: Some("main".to_string()),
            reset_hard: true,
        });
        assert_eq!(route.path, "/api/github/pull");
        assert_eq!(
            route.body,
            Some(json!({ "instance_name": "dev-acme", "branch": "main", "reset_hard": true }))
        );
    }

    #[test]
    fn deletes_use_delete_method() {
        let route = begin_route(&JobRequest::DeleteProduction {
            instance: "prod-acme".to_string(),
            confirmation: "BORRARprod-acme".to_string(),
        });
        assert_eq!(route.method, Method::DELETE);
        assert_eq!(route.path, "/api/instances/production/prod-acme");
    }

    #[test]
    fn create_and_webhook_routes() {
        let create = begin_route(&JobRequest::CreateDev(CreateDevParams {
            name: "acme".to_string(),
            source_instance: None,
            neutralize: true,
        }));
        assert_eq!(create.path, "/api/instances/create");
        assert_eq!(
            create.body,
            Some(json!({ "name": "acme", "source_instance": null, "neutralize": true }))
        );

        let webhook = begin_route(&JobRequest::WebhookConfigure {
            instance: "dev-acme".to_string(),
            params: WebhookParams {
                auto_deploy: true,
                update_modules: false,
            },
        });
        assert_eq!(webhook.path, "/api/github/webhook/dev-acme");
    }

    #[test]
    fn log_paths_follow_kind() {
        assert_eq!(
            log_path(&SlotKey::new(OperationKind::UpdateDb, "dev-acme")).as_deref(),
            Some("/api/instances/update-log/dev-acme/update-db")
        );
        assert_eq!(
            log_path(&SlotKey::new(OperationKind::CreateProd, "prod-acme")).as_deref(),
            Some("/api/instances/creation-log/prod-acme")
        );
        assert_eq!(
            log_path(&SlotKey::new(OperationKind::BackupRestore, "prod-acme")).as_deref(),
            Some("/api/backup/v2/instances/prod-acme/restore-log")
        );
        assert_eq!(log_path(&SlotKey::new(OperationKind::GitPush, "dev-acme")), None);
    }

    #[test]
    fn commit_first_body_becomes_uncommitted_changes() {
        let body = r#"{
            "success": false,
            "error": "Hay cambios sin commitear",
            "warning": "Haz commit antes de hacer pull",
            "suggested_action": "commit_first",
            "changes_info": {"total": 3}
        }"#;

        assert_eq!(
            decode_begin(400, body),
            Err(RemoteError::UncommittedChanges {
                error: "Hay cambios sin commitear".to_string(),
                suggestion: Some("Haz commit antes de hacer pull".to_string()),
                changed_files: Some(3),
            })
        );
    }

    #[test]
    fn success_false_on_2xx_is_rejected() {
        let result = decode_begin(200, r#"{"success": false, "error": "ya existe"}"#);
        assert_eq!(
            result,
            Err(RemoteError::Rejected {
                status: 200,
                message: "ya existe".to_string()
            })
        );
    }

    #[test]
    fn accepted_body_keeps_warning() {
        let accepted = decode_begin(
            200,
            r#"{"success": true, "message": "Pull completado", "warning": "2 conflictos resueltos"}"#,
        )
        .expect("accepted");
        assert_eq!(accepted.message.as_deref(), Some("Pull completado"));
        assert_eq!(accepted.warning.as_deref(), Some("2 conflictos resueltos"));
    }

    #[test]
    fn unauthorized_and_plain_text_errors() {
        assert_eq!(decode_begin(401, ""), Err(RemoteError::Unauthorized));
        assert_eq!(
            decode_begin(500, "Internal Server Error"),
            Err(RemoteError::Rejected {
                status: 500,
                message: "Internal Server Error".to_string()
            })
        );
    }

    #[test]
    fn missing_log_is_not_started() {
        assert_eq!(decode_log(404, "not found"), Ok(LogSnapshot::default()));
        assert_eq!(
            decode_log(200, r#"{"exists": true, "log": "line\n"}"#),
            Ok(LogSnapshot {
                exists: true,
                log: "line\n".to_string()
            })
        );
        assert!(matches!(
            decode_log(502, "bad gateway"),
            Err(RemoteError::Status { status: 502, .. })
        ));
    }

    #[test]
    fn client_builds_from_config() {
        let api = HttpPanelApi::new(
            &ApiConfig {
                base_url: "https://panel.example.com/".to_string(),
                timeout_secs: 5,
            },
            None,
        )
        .expect("client");
        assert_eq!(api.base_url, "https://panel.example.com");
    }
}
