use thiserror::Error;

use crate::job::OperationKind;

pub const RESTORE_PHRASE: &str = "RESTAURAR";
pub const DELETE_PRODUCTION_PREFIX: &str = "BORRAR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationShape {
    None,
    Acknowledge,
    /// Same literal for every target of the kind.
    FixedPhrase,
    /// Literal prefix followed by the exact target name.
    TargetPhrase,
    /// The target name itself, used for branch overwrites.
    TargetName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationRequirement {
    pub kind: OperationKind,
    pub target: String,
    pub shape: ConfirmationShape,
    pub required_phrase: Option<String>,
    pub requires_acknowledgement: bool,
    pub steps: u8,
}

impl ConfirmationRequirement {
    pub fn is_gated(&self) -> bool {
        self.shape != ConfirmationShape::None
    }

    pub fn consequences(&self) -> &'static [&'static str] {
        match self.kind {
            OperationKind::DeleteProduction => &[
                "the production database is dropped",
                "the filestore and instance directory are removed",
                "the systemd service and nginx site are removed",
            ],
            OperationKind::BackupRestore => &[
                "the whole database is replaced",
                "every filestore file is replaced",
                "the service restarts automatically",
            ],
            OperationKind::GitResetHard => &[
                "all uncommitted changes are lost",
                "all local commits that were not pushed are lost",
                "the branch becomes identical to the selected reference",
            ],
            OperationKind::Delete => &["the development instance and its database are removed"],
            OperationKind::UpdateDb => &["the instance database is replaced with a production copy"],
            _ => &[],
        }
    }
}

pub fn build_requirement(kind: OperationKind, target: &str) -> ConfirmationRequirement {
    let (shape, required_phrase, steps) = match kind {
        OperationKind::BackupRestore => (
            ConfirmationShape::FixedPhrase,
            Some(RESTORE_PHRASE.to_string()),
            1,
        ),
        OperationKind::DeleteProduction => (
            ConfirmationShape::TargetPhrase,
            Some(format!("{DELETE_PRODUCTION_PREFIX}{target}")),
            2,
        ),
        OperationKind::GitResetHard => (
            ConfirmationShape::TargetName,
            Some(target.to_string()),
            1,
        ),
        OperationKind::Delete | OperationKind::UpdateDb => {
            (ConfirmationShape::Acknowledge, None, 1)
        }
        _ => (ConfirmationShape::None, None, 0),
    };

    ConfirmationRequirement {
        kind,
        target: target.to_string(),
        shape,
        required_phrase,
        requires_acknowledgement: shape != ConfirmationShape::None,
        steps,
    }
}

pub fn can_proceed(requirement: &ConfirmationRequirement, typed: &str, acknowledged: bool) -> bool {
    if let Some(phrase) = requirement.required_phrase.as_deref() {
        if typed != phrase {
            return false;
        }
    }

    !requirement.requires_acknowledgement || acknowledged
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfirmationRejected {
    #[error("confirmation text does not match; type exactly: {expected}")]
    PhraseMismatch { expected: String },
    #[error("the consequences of {kind} on '{target}' were not acknowledged")]
    NotAcknowledged { kind: OperationKind, target: String },
    #[error("the consequences step must be confirmed before typing the phrase")]
    StepSkipped,
    #[error("confirmation was given for {given} but {expected} was requested")]
    WrongTarget { expected: String, given: String },
}

/// Proof that a destructive call on one target passed its confirmation gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmed {
    kind: OperationKind,
    target: String,
}

impl Confirmed {
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn authorize(&self, kind: OperationKind, target: &str) -> Result<(), ConfirmationRejected> {
        if self.kind == kind && self.target == target {
            return Ok(());
        }

        Err(ConfirmationRejected::WrongTarget {
            expected: format!("{kind} on '{target}'"),
            given: format!("{} on '{}'", self.kind, self.target),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStep {
    Consequences,
    TypePhrase,
}

#[derive(Debug, Clone)]
pub struct ConfirmationFlow {
    requirement: ConfirmationRequirement,
    step: FlowStep,
    typed: String,
    acknowledged: bool,
}

impl ConfirmationFlow {
    pub fn new(kind: OperationKind, target: &str) -> Self {
        let requirement = build_requirement(kind, target);
        let step = if requirement.steps > 1 {
            FlowStep::Consequences
        } else {
            FlowStep::TypePhrase
        };

        Self {
            requirement,
            step,
            typed: String::new(),
            acknowledged: false,
        }
    }

    pub fn requirement(&self) -> &ConfirmationRequirement {
        &self.requirement
    }

    pub fn step(&self) -> FlowStep {
        self.step
    }

    pub fn typed(&self) -> &str {
        &self.typed
    }

    /// Intermediate "I understand, continue" step of multi-step flows.
    pub fn acknowledge_consequences(&mut self) {
        if self.step == FlowStep::Consequences {
            self.step = FlowStep::TypePhrase;
            self.acknowledged = true;
        }
    }

    pub fn set_typed(&mut self, text: impl Into<String>) -> Result<(), ConfirmationRejected> {
        if self.step != FlowStep::TypePhrase {
            return Err(ConfirmationRejected::StepSkipped);
        }
        self.typed = text.into();
        Ok(())
    }

    pub fn set_acknowledged(&mut self, acknowledged: bool) {
        if self.step == FlowStep::TypePhrase {
            self.acknowledged = acknowledged;
        }
    }

    /// Typed text is kept, so a target change re-locks the flow.
    pub fn retarget(&mut self, target: &str) {
        self.requirement = build_requirement(self.requirement.kind, target);
    }

    pub fn can_proceed(&self) -> bool {
        self.step == FlowStep::TypePhrase
            && can_proceed(&self.requirement, &self.typed, self.acknowledged)
    }

    pub fn submit(&self) -> Result<Confirmed, ConfirmationRejected> {
        if self.step != FlowStep::TypePhrase {
            return Err(ConfirmationRejected::StepSkipped);
        }

        if let Some(expected) = self.requirement.required_phrase.as_deref() {
            if self.typed != expected {
                return Err(ConfirmationRejected::PhraseMismatch {
                    expected: expected.to_string(),
                });
            }
        }

        if !can_proceed(&self.requirement, &self.typed, self.acknowledged) {
            return Err(ConfirmationRejected::NotAcknowledged {
                kind: self.requirement.kind,
                target: self.requirement.target.clone(),
            });
        }

        Ok(Confirmed {
            kind: self.requirement.kind,
            target: self.requirement.target.clone(),
        })
    }
}
