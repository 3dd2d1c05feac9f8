use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub fn now_utc_rfc3339() -> Result<String, time::error::Format> {
    OffsetDateTime::now_utc().format(&Rfc3339)
}

/// Start stamp for tracker state; falls back to the unix epoch offset when formatting fails.
pub fn job_started_at() -> String {
    now_utc_rfc3339()
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}
