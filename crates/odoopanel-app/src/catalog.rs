use anyhow::{Context, Result};
use odoopanel_core::models::{BackupRecord, DeployLogRecord, InstanceRecord};

use crate::App;

pub const DEFAULT_DEPLOY_LOG_LIMIT: u32 = 20;

impl App {
    pub async fn list_instances(&self) -> Result<Vec<InstanceRecord>> {
        let mut instances = self
            .api
            .list_instances()
            .await
            .context("failed to list instances")?;
        instances.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(instances)
    }

    pub async fn list_backups(&self, instance: &str) -> Result<Vec<BackupRecord>> {
        self.api
            .list_backups(instance)
            .await
            .with_context(|| format!("failed to list backups for '{instance}'"))
    }

    pub async fn deploy_logs(&self, instance: &str, limit: u32) -> Result<Vec<DeployLogRecord>> {
        self.api
            .deploy_logs(instance, limit.max(1))
            .await
            .with_context(|| format!("failed to load deploy logs for '{instance}'"))
    }
}
