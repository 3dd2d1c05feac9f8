use std::sync::Arc;

use futures::FutureExt;
use odoopanel_core::confirm::{ConfirmationRejected, Confirmed, build_requirement};
use odoopanel_core::job::SlotKey;
use odoopanel_core::models::JobRequest;
use odoopanel_core::names::{validate_branch_name, validate_instance_name};

use crate::remote::PanelApi;
use crate::tracker::{PollFn, TrackerHandle};
use crate::{App, JobError};

impl App {
    /// Validates, gates and starts one remote job, returning a handle to follow it.
    pub async fn start_job(
        &self,
        request: JobRequest,
        confirmed: Option<&Confirmed>,
    ) -> Result<TrackerHandle, JobError> {
        validate_request(&request)?;
        authorize(&request, confirmed)?;

        let slot = request.slot();
        let tracker = self.registry.acquire(slot.clone())?;
        let plan = slot.kind.tracking_plan(&self.polling);
        let poll_fn = log_poller(Arc::clone(&self.api), slot);

        tracker
            .start(self.api.begin(&request), poll_fn, plan)
            .await
    }
}

pub(crate) fn log_poller(api: Arc<dyn PanelApi>, slot: SlotKey) -> PollFn {
    Arc::new(move || {
        let api = Arc::clone(&api);
        let slot = slot.clone();
        async move { api.fetch_log(&slot).await }.boxed()
    })
}

/// Identity a confirmation must be bound to: the branch for hard resets, the instance otherwise.
pub fn confirmation_target(request: &JobRequest) -> String {
    match request {
        JobRequest::GitPull {
            branch: Some(branch),
            reset_hard: true,
            ..
        } => branch.clone(),
        _ => request.target(),
    }
}

fn authorize(request: &JobRequest, confirmed: Option<&Confirmed>) -> Result<(), JobError> {
    let kind = request.kind();
    let target = confirmation_target(request);
    let requirement = build_requirement(kind, &target);
    if !requirement.is_gated() {
        return Ok(());
    }

    let Some(confirmed) = confirmed else {
        return Err(ConfirmationRejected::NotAcknowledged { kind, target }.into());
    };
    confirmed.authorize(kind, &target)?;

    if let JobRequest::DeleteProduction { confirmation, .. } = request {
        if Some(confirmation.as_str()) != requirement.required_phrase.as_deref() {
            return Err(ConfirmationRejected::PhraseMismatch {
                expected: requirement.required_phrase.unwrap_or_default(),
            }
            .into());
        }
    }

    Ok(())
}

fn validate_request(request: &JobRequest) -> Result<(), JobError> {
    let invalid = |message: String| JobError::Validation { message };

    match request {
        JobRequest::CreateDev(params) => {
            validate_instance_name(&params.name).map_err(|error| invalid(error.to_string()))?
        }
        JobRequest::CreateProd(params) => {
            validate_instance_name(&params.name).map_err(|error| invalid(error.to_string()))?
        }
        JobRequest::GitCommit { message, .. } if message.trim().is_empty() => {
            return Err(invalid("commit message cannot be empty".to_string()));
        }
        JobRequest::GitPull {
            branch,
            reset_hard,
            ..
        } => {
            if let Some(branch) = branch {
                validate_branch_name(branch).map_err(|error| invalid(error.to_string()))?;
            } else if *reset_hard {
                return Err(invalid("hard reset needs an explicit branch".to_string()));
            }
        }
        JobRequest::BackupRestore { filename, .. } if filename.trim().is_empty() => {
            return Err(invalid("backup file name cannot be empty".to_string()));
        }
        _ => {}
    }

    if request.target().trim().is_empty() {
        return Err(invalid(format!(
            "{} needs a target instance",
            request.kind()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use odoopanel_core::confirm::{ConfirmationFlow, RESTORE_PHRASE};
    use odoopanel_core::job::OperationKind;

    use super::*;

    fn reset(branch: &str) -> JobRequest {
        JobRequest::GitPull {
            instance: "dev-acme".to_string(),
            branch: Some(branch.to_string()),
            reset_hard: true,
        }
    }

    #[test]
    fn hard_reset_confirmation_is_bound_to_branch() {
        assert_eq!(confirmation_target(&reset("main")), "main");

        let mut flow = ConfirmationFlow::new(OperationKind::GitResetHard, "main");
        flow.set_typed("main").expect("typing");
        flow.set_acknowledged(true);
        let confirmed = flow.submit().expect("confirmed");

        assert!(authorize(&reset("main"), Some(&confirmed)).is_ok());
        assert!(matches!(
            authorize(&reset("develop"), Some(&confirmed)),
            Err(JobError::ConfirmationRejected(
                ConfirmationRejected::WrongTarget { .. }
            ))
        ));
    }

    #[test]
    fn gated_kinds_need_a_confirmation() {
        let request = JobRequest::BackupRestore {
            instance: "prod-acme".to_string(),
            filename: "backup_20240101_000000.tar.gz".to_string(),
        };
        assert!(matches!(
            authorize(&request, None),
            Err(JobError::ConfirmationRejected(
                ConfirmationRejected::NotAcknowledged { .. }
            ))
        ));

        let mut flow = ConfirmationFlow::new(OperationKind::BackupRestore, "prod-acme");
        flow.set_typed(RESTORE_PHRASE).expect("typing");
        flow.set_acknowledged(true);
        let confirmed = flow.submit().expect("confirmed");
        assert!(authorize(&request, Some(&confirmed)).is_ok());
    }

    #[test]
    fn ungated_kinds_pass_without_confirmation() {
        let request = JobRequest::GitPush {
            instance: "dev-acme".to_string(),
        };
        assert!(authorize(&request, None).is_ok());
    }

    #[test]
    fn delete_production_phrase_must_match_request() {
        let mut flow = ConfirmationFlow::new(OperationKind::DeleteProduction, "prod-acme");
        flow.acknowledge_consequences();
        flow.set_typed("BORRARprod-acme").expect("typing");
        let confirmed = flow.submit().expect("confirmed");

        let request = JobRequest::DeleteProduction {
            instance: "prod-acme".to_string(),
            confirmation: "BORRARprod-acm".to_string(),
        };
        assert!(matches!(
            authorize(&request, Some(&confirmed)),
            Err(JobError::ConfirmationRejected(
                ConfirmationRejected::PhraseMismatch { .. }
            ))
        ));
    }

    #[test]
    fn requests_are_validated_before_any_remote_call() {
        let request = JobRequest::GitCommit {
            instance: "dev-acme".to_string(),
            message: "   ".to_string(),
        };
        assert!(matches!(
            validate_request(&request),
            Err(JobError::Validation { .. })
        ));
    }
}
