use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "odoopanel")]
#[command(bin_name = "odoopanel")]
#[command(version)]
#[command(about = "Operate Odoo instances through the panel API")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[arg(long, global = true, help = "Write a diagnostics log under the config directory")]
    pub diagnostics: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[command(about = "Sign in and store a session token")]
    Login {
        #[arg(long)]
        username: String,
    },
    #[command(about = "Remove the stored session")]
    Logout,
    #[command(about = "Run configuration, session and API checks")]
    Doctor,
    #[command(about = "List instances and their status")]
    Instances,
    #[command(about = "Create a development instance from production")]
    CreateDev {
        name: String,
        #[arg(long = "source", help = "Production instance to clone")]
        source: Option<String>,
        #[arg(long, help = "Keep production data as is")]
        no_neutralize: bool,
    },
    #[command(about = "Provision a production instance")]
    CreateProd {
        name: String,
        #[arg(long, default_value = "19")]
        version: String,
        #[arg(long, default_value = "enterprise")]
        edition: String,
        #[arg(long = "ssl", default_value = "letsencrypt")]
        ssl_method: String,
    },
    #[command(about = "Replace a development database with a production copy")]
    UpdateDb {
        instance: String,
        #[arg(long)]
        no_neutralize: bool,
    },
    #[command(about = "Refresh a development instance's code from its branch")]
    UpdateFiles { instance: String },
    #[command(about = "Copy the production filestore into a development instance")]
    SyncFilestore { instance: String },
    #[command(about = "Rebuild web assets")]
    RegenerateAssets { instance: String },
    #[command(about = "Restart the instance service")]
    Restart { instance: String },
    #[command(about = "Delete a development instance")]
    Delete { instance: String },
    #[command(about = "Delete a production instance and all of its data")]
    DeleteProduction { instance: String },
    #[command(subcommand, about = "Create, restore and upload backups")]
    Backup(BackupCommand),
    #[command(subcommand, about = "Branch and repository operations")]
    Git(GitCommand),
    #[command(subcommand, about = "Deployment webhook settings")]
    Webhook(WebhookCommand),
}

#[derive(Debug, Subcommand)]
pub enum BackupCommand {
    #[command(about = "List backups of an instance")]
    List { instance: String },
    #[command(about = "Create a backup and follow its log")]
    Create {
        instance: String,
        #[arg(long = "name")]
        custom_filename: Option<String>,
    },
    #[command(about = "Restore a backup over the instance")]
    Restore { instance: String, filename: String },
    #[command(about = "Upload a .tar.gz or .zip backup archive")]
    Upload { instance: String, path: PathBuf },
}

#[derive(Debug, Subcommand)]
pub enum GitCommand {
    #[command(about = "List branches of an instance's repository")]
    Branches { instance: String },
    #[command(about = "Commit all changes in the instance repository")]
    Commit {
        instance: String,
        #[arg(short, long)]
        message: String,
    },
    #[command(about = "Push the current branch")]
    Push { instance: String },
    #[command(about = "Merge a branch into the current one")]
    Pull(BranchArgs),
    #[command(about = "Overwrite the current branch with another, discarding local work")]
    ResetHard(BranchArgs),
    #[command(about = "Show recent deployments")]
    DeployLogs {
        instance: String,
        #[arg(long, default_value_t = odoopanel_app::catalog::DEFAULT_DEPLOY_LOG_LIMIT)]
        limit: u32,
    },
}

#[derive(Debug, Args)]
pub struct BranchArgs {
    pub instance: String,
    #[arg(long, help = "Defaults to the selected branch of the listing")]
    pub branch: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum WebhookCommand {
    #[command(about = "Enable or change automatic deployment")]
    Configure {
        instance: String,
        #[arg(long)]
        auto_deploy: bool,
        #[arg(long)]
        update_modules: bool,
    },
    #[command(about = "Send a test delivery")]
    Test { instance: String },
}
