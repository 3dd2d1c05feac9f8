use thiserror::Error;

pub const DEV_PREFIX: &str = "dev-";
pub const PROD_PREFIX: &str = "prod-";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("instance name must be between 1 and 48 characters")]
    InvalidLength,
    #[error("instance name must start with a lowercase letter or digit")]
    InvalidFirstCharacter,
    #[error("instance name contains invalid character '{character}'")]
    InvalidCharacter { character: char },
    #[error("branch name cannot be empty")]
    EmptyBranch,
}

pub fn validate_instance_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() || name.len() > 48 {
        return Err(NameError::InvalidLength);
    }

    let mut characters = name.chars();
    if let Some(first) = characters.next() {
        if !first.is_ascii_lowercase() && !first.is_ascii_digit() {
            return Err(NameError::InvalidFirstCharacter);
        }
    }

    for character in characters {
        if character.is_ascii_lowercase()
            || character.is_ascii_digit()
            || character == '_'
            || character == '-'
        {
            continue;
        }

        return Err(NameError::InvalidCharacter { character });
    }

    Ok(())
}

pub fn validate_branch_name(branch: &str) -> Result<&str, NameError> {
    let trimmed = branch.trim();
    if trimmed.is_empty() {
        return Err(NameError::EmptyBranch);
    }
    Ok(trimmed)
}

/// Name the remote side gives a development clone of `name`.
pub fn dev_instance_name(name: &str) -> String {
    if name.starts_with(DEV_PREFIX) {
        return name.to_string();
    }
    format!("{DEV_PREFIX}{name}")
}

pub fn prod_instance_name(name: &str) -> String {
    if name.starts_with(PROD_PREFIX) {
        return name.to_string();
    }
    format!("{PROD_PREFIX}{name}")
}

pub fn is_development(name: &str) -> bool {
    name.starts_with(DEV_PREFIX)
}
