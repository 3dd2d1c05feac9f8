use std::io::Write;

use anyhow::{Result, bail};
use odoopanel_app::job_outcome;
use odoopanel_app::tracker::{TrackerHandle, TrackerPhase, TrackerState};
use odoopanel_core::progress::{Estimate, format_eta, format_file_size, format_speed};

/// Part of `log` not yet printed. A snapshot shorter than what was printed means the
/// remote side rewrote the file, so it is printed again from the start.
pub fn unseen_suffix(log: &str, printed: usize) -> &str {
    if printed > log.len() || !log.is_char_boundary(printed) {
        return log;
    }
    &log[printed..]
}

/// Prints the job log as it grows until a terminal state. Ctrl-C cancels the job observation.
pub async fn follow_job(handle: TrackerHandle) -> Result<TrackerState> {
    let mut receiver = handle.subscribe();
    let mut printed = 0;
    let mut stdout = std::io::stdout();

    loop {
        let state = receiver.borrow_and_update().clone();
        let fresh = unseen_suffix(&state.raw_log, printed);
        if !fresh.is_empty() {
            let _ = write!(stdout, "{fresh}");
            let _ = stdout.flush();
        }
        printed = state.raw_log.len();

        if state.phase.is_terminal() || state.phase == TrackerPhase::Closed {
            return finish(&handle, state);
        }

        tokio::select! {
            changed = receiver.changed() => {
                if changed.is_err() {
                    return finish(&handle, handle.state());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                handle.cancel();
                bail!("stopped following {}; the remote job may still be running", handle.slot());
            }
        }
    }
}

fn finish(handle: &TrackerHandle, state: TrackerState) -> Result<TrackerState> {
    if state.phase == TrackerPhase::Closed && state.terminal_reason.is_none() {
        bail!("{} was cancelled", handle.slot());
    }

    let state = job_outcome(handle.slot(), state)?;
    if state.raw_log.is_empty() {
        if let Some(reason) = &state.terminal_reason {
            println!("{}", reason.sentinel);
        }
    }
    if let Some(remediation) = state
        .terminal_reason
        .as_ref()
        .and_then(|reason| reason.remediation.as_deref())
    {
        eprintln!("{remediation}");
    }
    Ok(state)
}

pub fn progress_line(estimate: &Estimate) -> String {
    format!(
        "{:>3}% {} / {} {} ETA {} ({})",
        estimate.percentage,
        format_file_size(estimate.loaded as f64),
        format_file_size(estimate.total as f64),
        format_speed(estimate.speed_bytes_per_sec),
        format_eta(estimate.eta),
        estimate.phase.label()
    )
}
