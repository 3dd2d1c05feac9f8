use std::time::Duration;

use thiserror::Error;

const BYTE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
const SPEED_UNITS: [&str; 4] = ["B/s", "KB/s", "MB/s", "GB/s"];
const UNIT_BASE: f64 = 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub loaded: u64,
    pub total: u64,
    /// Time since the transfer started, from a monotonic clock.
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Eta {
    Unknown,
    Seconds(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Idle,
    Uploading,
    Validating,
    Complete,
    Error,
}

impl UploadPhase {
    /// Applies the remote acknowledgement that follows the byte stream.
    pub fn acknowledge(self, accepted: bool) -> Self {
        match self {
            Self::Uploading | Self::Validating => {
                if accepted {
                    Self::Complete
                } else {
                    Self::Error
                }
            }
            other => other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "ready",
            Self::Uploading => "uploading",
            Self::Validating => "validating structure",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub percentage: u8,
    pub loaded: u64,
    pub total: u64,
    pub speed_bytes_per_sec: f64,
    pub eta: Eta,
    pub phase: UploadPhase,
}

pub fn percentage(loaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }

    let loaded = loaded.min(total);
    let value = (loaded as f64 * 100.0 / total as f64).round();
    value.clamp(0.0, 100.0) as u8
}

pub fn speed(loaded: u64, elapsed: Duration) -> f64 {
    let seconds = elapsed.as_secs_f64();
    if seconds <= 0.0 {
        return 0.0;
    }
    loaded as f64 / seconds
}

pub fn eta(loaded: u64, total: u64, speed_bytes_per_sec: f64) -> Eta {
    if speed_bytes_per_sec <= 0.0 || !speed_bytes_per_sec.is_finite() {
        return Eta::Unknown;
    }
    let remaining = total.saturating_sub(loaded) as f64;
    Eta::Seconds(remaining / speed_bytes_per_sec)
}

/// Derives the current transfer statistics from every sample seen so far.
pub fn estimate(samples: &[Sample]) -> Estimate {
    let Some(latest) = samples.last() else {
        return Estimate {
            percentage: 0,
            loaded: 0,
            total: 0,
            speed_bytes_per_sec: 0.0,
            eta: Eta::Unknown,
            phase: UploadPhase::Idle,
        };
    };

    let loaded = latest.loaded.min(latest.total);
    let speed_bytes_per_sec = speed(loaded, latest.elapsed);
    let reached_end = samples
        .iter()
        .any(|sample| percentage(sample.loaded, sample.total) == 100);

    Estimate {
        percentage: percentage(loaded, latest.total),
        loaded,
        total: latest.total,
        speed_bytes_per_sec,
        eta: eta(loaded, latest.total, speed_bytes_per_sec),
        phase: if reached_end {
            UploadPhase::Validating
        } else {
            UploadPhase::Uploading
        },
    }
}

pub fn format_file_size(bytes: f64) -> String {
    if bytes <= 0.0 || !bytes.is_finite() {
        return "0 Bytes".to_string();
    }
    scale(bytes, &BYTE_UNITS)
}

pub fn format_speed(bytes_per_second: f64) -> String {
    if bytes_per_second <= 0.0 || !bytes_per_second.is_finite() {
        return "0 KB/s".to_string();
    }
    scale(bytes_per_second, &SPEED_UNITS)
}

pub fn format_duration(seconds: f64) -> String {
    if seconds <= 0.0 || !seconds.is_finite() {
        return "--".to_string();
    }

    let minutes = (seconds / 60.0).floor() as u64;
    let rest = (seconds % 60.0).floor() as u64;
    if minutes > 0 {
        format!("{minutes}m {rest}s")
    } else {
        format!("{rest}s")
    }
}

pub fn format_eta(eta: Eta) -> String {
    match eta {
        Eta::Unknown => "--".to_string(),
        Eta::Seconds(seconds) => format_duration(seconds),
    }
}

fn scale(value: f64, units: &[&str; 4]) -> String {
    let mut scaled = value;
    let mut index = 0;
    while scaled >= UNIT_BASE && index < units.len() - 1 {
        scaled /= UNIT_BASE;
        index += 1;
    }
    let rounded = (scaled * 100.0).round() / 100.0;
    format!("{} {}", trim_decimal(rounded), units[index])
}

fn trim_decimal(value: f64) -> String {
    let formatted = format!("{value:.2}");
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Zip,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArchiveError {
    #[error("backup archive '{file_name}' must be a .tar.gz or .zip file")]
    UnsupportedExtension { file_name: String },
}

pub fn archive_format(file_name: &str) -> Result<ArchiveFormat, ArchiveError> {
    if file_name.ends_with(".tar.gz") {
        return Ok(ArchiveFormat::TarGz);
    }
    if file_name.ends_with(".zip") {
        return Ok(ArchiveFormat::Zip);
    }
    Err(ArchiveError::UnsupportedExtension {
        file_name: file_name.to_string(),
    })
}
