use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use odoopanel_app::http::HttpPanelApi;
use odoopanel_app::jobs::confirmation_target;
use odoopanel_app::remote::PanelApi;
use odoopanel_app::session::{login, logout, require_session};
use odoopanel_app::{App, JobError};
use odoopanel_core::confirm::{Confirmed, build_requirement};
use odoopanel_core::job::OperationKind;
use odoopanel_core::models::{CreateDevParams, CreateProdParams, JobRequest, WebhookParams};
use odoopanel_core::progress::UploadPhase;
use odoopanel_core::session::SessionStore;

use crate::cli::{BackupCommand, BranchArgs, Command, GitCommand, WebhookCommand};
use crate::follow::{follow_job, progress_line};
use crate::prompt::{PromptDriver, run_confirmation};
use crate::render;

pub async fn run_with_deps(command: Command, prompt: &mut dyn PromptDriver) -> Result<()> {
    match command {
        Command::Doctor => run_doctor_command().await,
        Command::Login { username } => run_login_command(&username, prompt).await,
        Command::Logout => run_logout_command(),
        command => {
            let app = connect()?;
            run_connected(command, &app, prompt).await
        }
    }
}

fn session_store() -> Result<SessionStore> {
    SessionStore::default_location().context("failed to resolve session path")
}

fn connect() -> Result<App> {
    let config = App::ensure_config_ready()?;
    let session = require_session(&session_store()?)?;
    let api = HttpPanelApi::new(&config.api, Some(session.access_token))
        .context("failed to build API client")?;
    Ok(App::new(Arc::new(api), &config))
}

async fn run_doctor_command() -> Result<()> {
    let api = match App::ensure_config_ready() {
        Ok(config) => {
            let token = session_store()
                .ok()
                .and_then(|store| store.load().ok().flatten())
                .map(|session| session.access_token);
            HttpPanelApi::new(&config.api, token).ok()
        }
        Err(_) => None,
    };

    let report = App::doctor(api.as_ref().map(|api| api as &dyn PanelApi)).await;
    println!("{}", render::doctor_table(&report));
    println!("{}", report.summary());
    Ok(())
}

async fn run_login_command(username: &str, prompt: &mut dyn PromptDriver) -> Result<()> {
    let config = App::ensure_config_ready()?;
    let store = session_store()?;
    let api = HttpPanelApi::new(&config.api, None).context("failed to build API client")?;
    let password = prompt.password("Password")?;

    let session = login(&api, &store, username, &password).await?;
    println!("Logged in as {}", session.user.username);
    Ok(())
}

fn run_logout_command() -> Result<()> {
    if logout(&session_store()?)? {
        println!("Logged out");
    } else {
        println!("No stored session");
    }
    Ok(())
}

async fn run_connected(command: Command, app: &App, prompt: &mut dyn PromptDriver) -> Result<()> {
    match command {
        Command::Instances => {
            let instances = app.list_instances().await?;
            println!("{}", render::instances_table(&instances));
            Ok(())
        }
        Command::CreateDev {
            name,
            source,
            no_neutralize,
        } => {
            let request = JobRequest::CreateDev(CreateDevParams {
                name,
                source_instance: source,
                neutralize: !no_neutralize,
            });
            run_job(app, request, prompt).await
        }
        Command::CreateProd {
            name,
            version,
            edition,
            ssl_method,
        } => {
            let request = JobRequest::CreateProd(CreateProdParams {
                name,
                version,
                edition,
                ssl_method,
            });
            run_job(app, request, prompt).await
        }
        Command::UpdateDb {
            instance,
            no_neutralize,
        } => {
            let request = JobRequest::UpdateDb {
                instance,
                neutralize: !no_neutralize,
            };
            run_job(app, request, prompt).await
        }
        Command::UpdateFiles { instance } => {
            run_job(app, JobRequest::UpdateFiles { instance }, prompt).await
        }
        Command::SyncFilestore { instance } => {
            run_job(app, JobRequest::SyncFilestore { instance }, prompt).await
        }
        Command::RegenerateAssets { instance } => {
            run_job(app, JobRequest::RegenerateAssets { instance }, prompt).await
        }
        Command::Restart { instance } => {
            run_job(app, JobRequest::Restart { instance }, prompt).await
        }
        Command::Delete { instance } => run_job(app, JobRequest::Delete { instance }, prompt).await,
        Command::DeleteProduction { instance } => {
            let confirmed = require_confirmation(prompt, OperationKind::DeleteProduction, &instance)?;
            let confirmation = build_requirement(OperationKind::DeleteProduction, &instance)
                .required_phrase
                .unwrap_or_default();
            let request = JobRequest::DeleteProduction {
                instance,
                confirmation,
            };
            start_and_follow(app, request, Some(&confirmed)).await
        }
        Command::Backup(command) => run_backup_command(command, app, prompt).await,
        Command::Git(command) => run_git_command(command, app, prompt).await,
        Command::Webhook(command) => run_webhook_command(command, app, prompt).await,
        Command::Doctor | Command::Login { .. } | Command::Logout => {
            bail!("command does not need an API session")
        }
    }
}

async fn run_backup_command(
    command: BackupCommand,
    app: &App,
    prompt: &mut dyn PromptDriver,
) -> Result<()> {
    match command {
        BackupCommand::List { instance } => {
            let backups = app.list_backups(&instance).await?;
            println!("{}", render::backups_table(&backups));
            Ok(())
        }
        BackupCommand::Create {
            instance,
            custom_filename,
        } => {
            let request = JobRequest::BackupCreate {
                instance,
                custom_filename,
            };
            run_job(app, request, prompt).await
        }
        BackupCommand::Restore { instance, filename } => {
            run_job(app, JobRequest::BackupRestore { instance, filename }, prompt).await
        }
        BackupCommand::Upload { instance, path } => upload(app, &instance, &path).await,
    }
}

async fn run_git_command(
    command: GitCommand,
    app: &App,
    prompt: &mut dyn PromptDriver,
) -> Result<()> {
    match command {
        GitCommand::Branches { instance } => {
            let listing = app.list_branches(&instance).await;
            if let Some(reason) = &listing.degraded {
                eprintln!("Branch listing unavailable ({reason}); showing defaults.");
            }
            println!("{}", render::branches_table(&listing));
            Ok(())
        }
        GitCommand::Commit { instance, message } => {
            run_job(app, JobRequest::GitCommit { instance, message }, prompt).await
        }
        GitCommand::Push { instance } => run_job(app, JobRequest::GitPush { instance }, prompt).await,
        GitCommand::Pull(args) => {
            let branch = choose_branch(app, &args, prompt).await?;
            let handle = app
                .merge_branch(&args.instance, &branch)
                .await
                .map_err(describe_job_error)?;
            follow_job(handle).await.map(|_| ())
        }
        GitCommand::ResetHard(args) => {
            let branch = choose_branch(app, &args, prompt).await?;
            let confirmed = require_confirmation(prompt, OperationKind::GitResetHard, &branch)?;
            let handle = app
                .hard_reset_branch(&args.instance, &branch, &confirmed)
                .await
                .map_err(describe_job_error)?;
            follow_job(handle).await.map(|_| ())
        }
        GitCommand::DeployLogs { instance, limit } => {
            let logs = app.deploy_logs(&instance, limit).await?;
            println!("{}", render::deploy_logs_table(&logs));
            Ok(())
        }
    }
}

async fn run_webhook_command(
    command: WebhookCommand,
    app: &App,
    prompt: &mut dyn PromptDriver,
) -> Result<()> {
    let request = match command {
        WebhookCommand::Configure {
            instance,
            auto_deploy,
            update_modules,
        } => JobRequest::WebhookConfigure {
            instance,
            params: WebhookParams {
                auto_deploy,
                update_modules,
            },
        },
        WebhookCommand::Test { instance } => JobRequest::WebhookTest { instance },
    };
    run_job(app, request, prompt).await
}

async fn run_job(app: &App, request: JobRequest, prompt: &mut dyn PromptDriver) -> Result<()> {
    let confirmed = run_confirmation(prompt, request.kind(), &confirmation_target(&request))?;
    start_and_follow(app, request, confirmed.as_ref()).await
}

async fn start_and_follow(
    app: &App,
    request: JobRequest,
    confirmed: Option<&Confirmed>,
) -> Result<()> {
    let handle = app
        .start_job(request, confirmed)
        .await
        .map_err(describe_job_error)?;
    follow_job(handle).await.map(|_| ())
}

fn require_confirmation(
    prompt: &mut dyn PromptDriver,
    kind: OperationKind,
    target: &str,
) -> Result<Confirmed> {
    run_confirmation(prompt, kind, target)?
        .ok_or_else(|| anyhow!("{kind} has no confirmation gate"))
}

async fn choose_branch(
    app: &App,
    args: &BranchArgs,
    prompt: &mut dyn PromptDriver,
) -> Result<String> {
    if let Some(branch) = &args.branch {
        return Ok(branch.clone());
    }

    let listing = app.list_branches(&args.instance).await;
    if let Some(reason) = &listing.degraded {
        eprintln!("Branch listing unavailable ({reason}); showing defaults.");
    }
    let index = prompt.select("Branch", &listing.branches)?;
    listing
        .branches
        .get(index)
        .cloned()
        .ok_or_else(|| anyhow!("selected branch is out of range"))
}

async fn upload(app: &App, instance: &str, path: &Path) -> Result<()> {
    let report = app
        .upload_backup(instance, path, |estimate| {
            eprint!("\r{}", progress_line(estimate));
        })
        .await
        .map_err(describe_job_error)?;
    eprintln!();

    let message = report.message.unwrap_or_default();
    match report.phase {
        UploadPhase::Complete => {
            println!("{} uploaded to {instance}. {message}", report.file_name);
            Ok(())
        }
        _ => bail!("{} was rejected: {message}", report.file_name),
    }
}

fn describe_job_error(error: JobError) -> anyhow::Error {
    match error {
        JobError::UncommittedChanges {
            error,
            suggestion,
            changed_files,
        } => {
            let mut message = error;
            if let Some(count) = changed_files {
                message.push_str(&format!(" ({count} changed files)"));
            }
            if let Some(suggestion) = suggestion {
                message.push('\n');
                message.push_str(&suggestion);
            }
            anyhow!(message)
        }
        other => anyhow::Error::new(other),
    }
}
