use comfy_table::{Cell, ContentArrangement, Table};
use odoopanel_app::branch::BranchListing;
use odoopanel_core::doctor::DoctorReport;
use odoopanel_core::models::{BackupRecord, DeployLogRecord, InstanceRecord};

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header);
    table
}

fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

pub fn instances_table(instances: &[InstanceRecord]) -> Table {
    let mut table = table(vec!["Name", "Type", "Status", "Domain", "Database", "Size"]);
    for instance in instances {
        table.add_row(vec![
            Cell::new(instance.name.as_str()),
            Cell::new(or_dash(instance.environment.as_deref())),
            Cell::new(instance.status.as_str()),
            Cell::new(or_dash(instance.domain.as_deref())),
            Cell::new(or_dash(instance.database.as_deref())),
            Cell::new(or_dash(instance.size_human.as_deref())),
        ]);
    }
    table
}

pub fn backups_table(backups: &[BackupRecord]) -> Table {
    let mut table = table(vec!["File", "Date", "Size"]);
    for backup in backups {
        table.add_row(vec![
            Cell::new(backup.filename.as_str()),
            Cell::new(backup.date.as_str()),
            Cell::new(backup.size_human.as_str()),
        ]);
    }
    table
}

pub fn branches_table(listing: &BranchListing) -> Table {
    let mut table = table(vec!["Branch", ""]);
    for branch in &listing.branches {
        let marker = if listing.current.as_deref() == Some(branch.as_str()) {
            "current"
        } else if *branch == listing.selected {
            "selected"
        } else {
            ""
        };
        table.add_row(vec![Cell::new(branch.as_str()), Cell::new(marker)]);
    }
    table
}

pub fn deploy_logs_table(logs: &[DeployLogRecord]) -> Table {
    let mut table = table(vec!["When", "Action", "Status", "Details"]);
    for entry in logs {
        table.add_row(vec![
            Cell::new(or_dash(entry.timestamp.as_deref())),
            Cell::new(entry.action.as_str()),
            Cell::new(or_dash(entry.status.as_deref())),
            Cell::new(or_dash(entry.details.as_deref())),
        ]);
    }
    table
}

pub fn doctor_table(report: &DoctorReport) -> Table {
    let mut table = table(vec!["Check", "Status", "Details"]);
    for check in &report.checks {
        table.add_row(vec![
            Cell::new(check.name.as_str()),
            Cell::new(check.state.to_string()),
            Cell::new(check.details.as_str()),
        ]);
    }
    table
}
