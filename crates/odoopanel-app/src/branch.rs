use odoopanel_core::confirm::Confirmed;
use odoopanel_core::models::{BranchListingResponse, JobRequest};
use tracing::warn;

use crate::tracker::TrackerHandle;
use crate::{App, JobError};

const DEVELOP_BRANCH: &str = "develop";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchListing {
    pub branches: Vec<String>,
    pub selected: String,
    pub current: Option<String>,
    /// Set when the remote listing failed and the fallback set is shown instead.
    pub degraded: Option<String>,
}

impl App {
    /// Never fails: a listing error degrades to the fallback branch set.
    pub async fn list_branches(&self, instance: &str) -> BranchListing {
        match self.api.list_branches(instance).await {
            Ok(response) if !response.branches.is_empty() => listing_from_response(response),
            Ok(_) => self.fallback_listing(instance, "remote returned no branches".to_string()),
            Err(error) => {
                warn!(instance, %error, "branch listing failed; using fallback branches");
                self.fallback_listing(instance, error.to_string())
            }
        }
    }

    pub async fn merge_branch(
        &self,
        instance: &str,
        branch: &str,
    ) -> Result<TrackerHandle, JobError> {
        self.start_job(
            JobRequest::GitPull {
                instance: instance.to_string(),
                branch: Some(branch.trim().to_string()),
                reset_hard: false,
            },
            None,
        )
        .await
    }

    /// Discards local work on `instance`; `confirmed` must be bound to `branch`.
    pub async fn hard_reset_branch(
        &self,
        instance: &str,
        branch: &str,
        confirmed: &Confirmed,
    ) -> Result<TrackerHandle, JobError> {
        self.start_job(
            JobRequest::GitPull {
                instance: instance.to_string(),
                branch: Some(branch.to_string()),
                reset_hard: true,
            },
            Some(confirmed),
        )
        .await
    }

    fn fallback_listing(&self, instance: &str, reason: String) -> BranchListing {
        BranchListing {
            branches: fallback_branches(&self.git.default_branch, instance),
            selected: self.git.default_branch.clone(),
            current: None,
            degraded: Some(reason),
        }
    }
}

pub fn fallback_branches(default_branch: &str, instance: &str) -> Vec<String> {
    let mut branches: Vec<String> = Vec::new();
    for candidate in [default_branch, DEVELOP_BRANCH, instance] {
        if !candidate.is_empty() && !branches.iter().any(|branch| branch == candidate) {
            branches.push(candidate.to_string());
        }
    }
    branches
}

/// Current branch if listed, else `main` if listed, else the first branch.
pub fn select_branch(branches: &[String], current: Option<&str>) -> Option<String> {
    if let Some(current) = current {
        if branches.iter().any(|branch| branch == current) {
            return Some(current.to_string());
        }
    }

    if branches.iter().any(|branch| branch == "main") {
        return Some("main".to_string());
    }

    branches.first().cloned()
}

fn listing_from_response(response: BranchListingResponse) -> BranchListing {
    let selected = select_branch(&response.branches, response.current_branch.as_deref())
        .unwrap_or_default();
    BranchListing {
        branches: response.branches,
        selected,
        current: response.current_branch,
        degraded: None,
    }
}
