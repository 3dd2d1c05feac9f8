use anyhow::{Context, Result, bail};
use odoopanel_core::session::{Session, SessionStore};
use tracing::info;

use crate::remote::PanelApi;

/// Exchanges credentials for a token and persists it.
pub async fn login(
    api: &dyn PanelApi,
    store: &SessionStore,
    username: &str,
    password: &str,
) -> Result<Session> {
    if username.trim().is_empty() {
        bail!("username cannot be empty");
    }

    let response = api
        .login(username.trim(), password)
        .await
        .context("login failed")?;

    let session = Session {
        access_token: response.access_token,
        user: response.user,
    };
    store.save(&session).with_context(|| {
        format!("failed to store session at {}", store.path().display())
    })?;
    info!(username = %session.user.username, "logged in");
    Ok(session)
}

pub fn logout(store: &SessionStore) -> Result<bool> {
    store
        .clear()
        .with_context(|| format!("failed to remove session at {}", store.path().display()))
}

pub fn require_session(store: &SessionStore) -> Result<Session> {
    let session = store
        .load()
        .with_context(|| format!("failed to read session at {}", store.path().display()))?;

    match session {
        Some(session) => Ok(session),
        None => bail!("not logged in; run `odoopanel login --username <name>` first"),
    }
}
