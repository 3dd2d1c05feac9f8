use std::path::Path;
use std::sync::{Arc, Mutex};

use odoopanel_core::job::{OperationKind, SlotKey, TrackingPlan};
use odoopanel_core::progress::{Estimate, Sample, UploadPhase, archive_format, estimate};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::jobs::log_poller;
use crate::remote::{BackupUpload, ProgressFn};
use crate::{App, JobError};

#[derive(Debug, Clone, PartialEq)]
pub struct UploadReport {
    pub file_name: String,
    pub estimate: Estimate,
    pub phase: UploadPhase,
    pub message: Option<String>,
}

impl App {
    /// Streams a backup archive to `instance`. The final phase follows the remote
    /// acknowledgement: `Complete` when the archive validated, `Error` otherwise.
    pub async fn upload_backup(
        &self,
        instance: &str,
        path: &Path,
        on_progress: impl Fn(&Estimate) + Send + Sync + 'static,
    ) -> Result<UploadReport, JobError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| JobError::Validation {
                message: format!("{} is not a file", path.display()),
            })?;
        archive_format(&file_name).map_err(|error| JobError::Validation {
            message: error.to_string(),
        })?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|error| JobError::Validation {
                message: format!("failed to read {}: {error}", path.display()),
            })?;

        let slot = SlotKey::new(OperationKind::BackupUpload, instance);
        let tracker = self.registry.acquire(slot.clone())?;

        let samples: Arc<Mutex<Vec<Sample>>> = Arc::new(Mutex::new(Vec::new()));
        let started = Instant::now();
        let recorder = Arc::clone(&samples);
        let progress: ProgressFn = Arc::new(move |loaded, total| {
            let mut samples = recorder
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            samples.push(Sample {
                loaded,
                total,
                elapsed: started.elapsed(),
            });
            on_progress(&estimate(&samples));
        });

        info!(instance, file = %file_name, size = bytes.len(), "uploading backup archive");
        let upload = BackupUpload {
            instance: instance.to_string(),
            file_name: file_name.clone(),
            bytes,
        };
        let result = tracker
            .start(
                self.api.upload_backup(upload, progress),
                log_poller(Arc::clone(&self.api), slot),
                TrackingPlan::Immediate,
            )
            .await;

        let last = {
            let samples = samples
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            estimate(&samples)
        };
        // A rejected upload may not have streamed anything; it still waited on validation.
        let settled = match last.phase {
            UploadPhase::Idle => UploadPhase::Validating,
            phase => phase,
        };

        match result {
            Ok(handle) => {
                let state = handle.state();
                Ok(UploadReport {
                    file_name,
                    estimate: last,
                    phase: settled.acknowledge(true),
                    message: state.message,
                })
            }
            Err(JobError::Validation { message }) => {
                warn!(instance, %message, "backup archive was rejected");
                Ok(UploadReport {
                    file_name,
                    estimate: last,
                    phase: settled.acknowledge(false),
                    message: Some(message),
                })
            }
            Err(error) => Err(error),
        }
    }
}
