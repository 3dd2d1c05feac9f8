//! Sentinel vocabulary for remote job logs.
//!
//! Remote jobs expose no structured status; each writes a free-text log and
//! announces its outcome with a literal line. Every sentinel lives in the
//! table below so the poll loop only ever asks [`Classifier::classify`].

use serde::Serialize;

use crate::job::OperationKind;

const REMEDIATION_MARKERS: &[&str] = &["⚠️", "💡", "WARNING:", "ADVERTENCIA:"];

const CREATE_DEV_SUCCESS: &[&str] = &[
    "✅ Instancia de desarrollo creada con éxito",
    "Instancia creada con éxito",
];
const CREATE_PROD_SUCCESS: &[&str] = &[
    "✅ ¡INSTANCIA CREADA EXITOSAMENTE!",
    "Instancia creada con éxito",
];
const CREATE_FAILURE: &[&str] = &["❌ ERROR", "❌ Error al crear la instancia"];
const UPDATE_SUCCESS: &[&str] = &["✅ Actualización completada"];
const UPDATE_FAILURE: &[&str] = &["❌ ERROR", "❌ Error en la actualización"];
const BACKUP_SUCCESS: &[&str] = &["✅ Backup completado"];
const BACKUP_FAILURE: &[&str] = &["❌ Error en el backup", "❌ ERROR"];
const RESTORE_SUCCESS: &[&str] = &["✅ RESTAURACIÓN COMPLETADA"];
const RESTORE_FAILURE: &[&str] = &["ERROR EN LA RESTAURACIÓN"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerminalReason {
    pub sentinel: String,
    pub remediation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub status: JobStatus,
    pub reason: Option<TerminalReason>,
}

impl Classification {
    fn running() -> Self {
        Self {
            status: JobStatus::Running,
            reason: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classifier {
    kind: OperationKind,
    success: &'static [&'static str],
    failure: &'static [&'static str],
}

impl Classifier {
    pub fn for_kind(kind: OperationKind) -> Self {
        let (success, failure): (&'static [&'static str], &'static [&'static str]) = match kind {
            OperationKind::CreateDev => (CREATE_DEV_SUCCESS, CREATE_FAILURE),
            OperationKind::CreateProd => (CREATE_PROD_SUCCESS, CREATE_FAILURE),
            OperationKind::UpdateDb
            | OperationKind::UpdateFiles
            | OperationKind::SyncFilestore
            | OperationKind::RegenerateAssets => (UPDATE_SUCCESS, UPDATE_FAILURE),
            OperationKind::BackupCreate => (BACKUP_SUCCESS, BACKUP_FAILURE),
            OperationKind::BackupRestore => (RESTORE_SUCCESS, RESTORE_FAILURE),
            _ => (&[], &[]),
        };

        Self {
            kind,
            success,
            failure,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn success_sentinels(&self) -> &'static [&'static str] {
        self.success
    }

    pub fn failure_sentinels(&self) -> &'static [&'static str] {
        self.failure
    }

    /// Failure sentinels win over success sentinels when both are present.
    pub fn classify(&self, raw_log: &str) -> Classification {
        if let Some(sentinel) = first_match(raw_log, self.failure) {
            return Classification {
                status: JobStatus::Failed,
                reason: Some(TerminalReason {
                    sentinel: sentinel.to_string(),
                    remediation: extract_remediation(raw_log),
                }),
            };
        }

        if let Some(sentinel) = first_match(raw_log, self.success) {
            return Classification {
                status: JobStatus::Succeeded,
                reason: Some(TerminalReason {
                    sentinel: sentinel.to_string(),
                    remediation: None,
                }),
            };
        }

        Classification::running()
    }
}

fn first_match(raw_log: &str, sentinels: &'static [&'static str]) -> Option<&'static str> {
    sentinels
        .iter()
        .copied()
        .find(|sentinel| raw_log.contains(sentinel))
}

pub fn extract_remediation(raw_log: &str) -> Option<String> {
    let lines = raw_log
        .lines()
        .map(str::trim)
        .filter(|line| REMEDIATION_MARKERS.iter().any(|marker| line.contains(marker)))
        .collect::<Vec<_>>();

    if lines.is_empty() {
        return None;
    }

    Some(lines.join("\n"))
}
