use std::collections::VecDeque;

use anyhow::{Result, anyhow, bail};
use dialoguer::{Confirm, Input, Password, Select};
use odoopanel_core::confirm::{ConfirmationFlow, Confirmed, FlowStep};
use odoopanel_core::job::OperationKind;

pub trait PromptDriver {
    fn confirm(&mut self, message: &str, default: bool) -> Result<bool>;
    fn input(&mut self, message: &str) -> Result<String>;
    fn password(&mut self, message: &str) -> Result<String>;
    fn select(&mut self, message: &str, options: &[String]) -> Result<usize>;
}

#[derive(Debug, Default)]
pub struct DialoguerPromptDriver;

impl DialoguerPromptDriver {
    pub fn new() -> Self {
        Self
    }
}

impl PromptDriver for DialoguerPromptDriver {
    fn confirm(&mut self, message: &str, default: bool) -> Result<bool> {
        Ok(Confirm::new()
            .with_prompt(message)
            .default(default)
            .interact()?)
    }

    fn input(&mut self, message: &str) -> Result<String> {
        Ok(Input::<String>::new()
            .with_prompt(message)
            .allow_empty(true)
            .interact_text()?)
    }

    fn password(&mut self, message: &str) -> Result<String> {
        Ok(Password::new().with_prompt(message).interact()?)
    }

    fn select(&mut self, message: &str, options: &[String]) -> Result<usize> {
        if options.is_empty() {
            bail!("nothing to select");
        }
        Ok(Select::new()
            .with_prompt(message)
            .items(options)
            .default(0)
            .interact()?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedPromptResponse {
    Confirm(bool),
    Input(String),
    Select(usize),
}

#[derive(Debug, Default)]
pub struct ScriptedPromptDriver {
    responses: VecDeque<ScriptedPromptResponse>,
}

impl ScriptedPromptDriver {
    pub fn new(responses: Vec<ScriptedPromptResponse>) -> Self {
        Self {
            responses: responses.into(),
        }
    }

    fn next_response(&mut self) -> Result<ScriptedPromptResponse> {
        self.responses
            .pop_front()
            .ok_or_else(|| anyhow!("prompt response queue is empty"))
    }
}

impl PromptDriver for ScriptedPromptDriver {
    fn confirm(&mut self, _message: &str, _default: bool) -> Result<bool> {
        match self.next_response()? {
            ScriptedPromptResponse::Confirm(value) => Ok(value),
            unexpected => Err(anyhow!("expected confirm response, got {unexpected:?}")),
        }
    }

    fn input(&mut self, _message: &str) -> Result<String> {
        match self.next_response()? {
            ScriptedPromptResponse::Input(value) => Ok(value),
            unexpected => Err(anyhow!("expected input response, got {unexpected:?}")),
        }
    }

    fn password(&mut self, message: &str) -> Result<String> {
        self.input(message)
    }

    fn select(&mut self, _message: &str, _options: &[String]) -> Result<usize> {
        match self.next_response()? {
            ScriptedPromptResponse::Select(value) => Ok(value),
            unexpected => Err(anyhow!("expected select response, got {unexpected:?}")),
        }
    }
}

/// Walks the confirmation gate of `kind` on `target`. Returns `None` for kinds without a gate.
pub fn run_confirmation(
    prompt: &mut dyn PromptDriver,
    kind: OperationKind,
    target: &str,
) -> Result<Option<Confirmed>> {
    let mut flow = ConfirmationFlow::new(kind, target);
    let requirement = flow.requirement().clone();
    if !requirement.is_gated() {
        return Ok(None);
    }

    eprintln!("{kind} on '{target}' cannot be undone:");
    for consequence in requirement.consequences() {
        eprintln!("  - {consequence}");
    }

    if flow.step() == FlowStep::Consequences {
        if !prompt.confirm("I understand, continue", false)? {
            bail!("{kind} on '{target}' cancelled");
        }
        flow.acknowledge_consequences();
    } else {
        let acknowledged = prompt.confirm("I understand the consequences", false)?;
        flow.set_acknowledged(acknowledged);
    }

    if let Some(phrase) = requirement.required_phrase.as_deref() {
        let typed = prompt.input(&format!("Type {phrase} to confirm"))?;
        flow.set_typed(typed)?;
    }

    Ok(Some(flow.submit()?))
}
