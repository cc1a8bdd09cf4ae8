//! Password sources
//!
//! Business logic never prompts directly; it asks a [`PasswordProvider`].
//! The CLI wires in [`PromptPasswordProvider`], tests use
//! [`FixedPasswordProvider`].

use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Supplies passwords on request
pub trait PasswordProvider {
    /// Read one password, showing `prompt` if the source is interactive
    fn read_password(&self, prompt: &str) -> Result<SecretString>;
}

/// Reads passwords from the terminal without echo
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptPasswordProvider;

impl PasswordProvider for PromptPasswordProvider {
    fn read_password(&self, prompt: &str) -> Result<SecretString> {
        rpassword::prompt_password(prompt)
            .map(SecretString::from)
            .map_err(|e| Error::Config(format!("Failed to read password: {}", e)))
    }
}

/// Hands out a fixed sequence of passwords, repeating the last one
pub struct FixedPasswordProvider {
    passwords: Mutex<VecDeque<String>>,
    last: String,
}

impl FixedPasswordProvider {
    /// Always answer with `password`
    pub fn new(password: impl Into<String>) -> Self {
        Self::sequence([password.into()])
    }

    /// Answer with each password in turn
    pub fn sequence(passwords: impl IntoIterator<Item = String>) -> Self {
        let passwords: VecDeque<String> = passwords.into_iter().collect();
        let last = passwords.back().cloned().unwrap_or_default();
        Self {
            passwords: Mutex::new(passwords),
            last,
        }
    }
}

impl PasswordProvider for FixedPasswordProvider {
    fn read_password(&self, _prompt: &str) -> Result<SecretString> {
        let mut passwords = self
            .passwords
            .lock()
            .map_err(|_| Error::Config("Password source poisoned".to_string()))?;
        let password = passwords.pop_front().unwrap_or_else(|| self.last.clone());
        Ok(SecretString::from(password))
    }
}

/// Use `explicit` if given, otherwise ask `provider` once
pub fn resolve_password(
    explicit: Option<String>,
    provider: &dyn PasswordProvider,
    prompt: &str,
) -> Result<SecretString> {
    match explicit {
        Some(password) => Ok(SecretString::from(password)),
        None => provider.read_password(prompt),
    }
}

/// Ask for a new password twice and fail with `PasswordMismatch` if the entries differ
pub fn read_new_password(provider: &dyn PasswordProvider) -> Result<SecretString> {
    let password = provider.read_password("password:")?;
    let repeated = provider.read_password("repeat password:")?;

    if password.expose_secret() != repeated.expose_secret() {
        return Err(Error::PasswordMismatch);
    }
    Ok(password)
}
