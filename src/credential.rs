// Credential resolution: the Gemini API key comes from the environment
// first and a well-known file second. The key is resolved once at startup
// and handed to the API client explicitly.

use crate::error::{Result, VortexError};
use std::fmt;
use std::path::PathBuf;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Fallback file consulted when the environment variable is not set.
pub const DEFAULT_KEY_FILE: &str = "/usr/share/vortexai/apikey.txt";

/// Opaque API secret. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Credential(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Where a resolved credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Environment,
    File,
}

/// Looks up the API key in `env_var`, then in `fallback_file`.
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    env_var: String,
    fallback_file: PathBuf,
}

impl CredentialResolver {
    pub fn new(env_var: impl Into<String>, fallback_file: impl Into<PathBuf>) -> Self {
        CredentialResolver {
            env_var: env_var.into(),
            fallback_file: fallback_file.into(),
        }
    }

    /// Resolve with an injected environment lookup.
    pub fn resolve_with<F>(&self, lookup: F) -> Result<(Credential, CredentialSource)>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(&self.env_var) {
            let value = value.trim();
            if !value.is_empty() {
                tracing::debug!(source = %self.env_var, "API key loaded from environment");
                return Ok((Credential::new(value), CredentialSource::Environment));
            }
        }

        tracing::debug!(
            path = %self.fallback_file.display(),
            "{} not set, checking fallback key file",
            self.env_var
        );
        match std::fs::read_to_string(&self.fallback_file) {
            Ok(contents) if !contents.trim().is_empty() => {
                Ok((Credential::new(contents.trim()), CredentialSource::File))
            }
            Ok(_) => {
                tracing::warn!(path = %self.fallback_file.display(), "API key file is empty");
                Err(self.missing())
            }
            Err(err) => {
                tracing::debug!(path = %self.fallback_file.display(), error = %err, "API key file unreadable");
                Err(self.missing())
            }
        }
    }

    fn missing(&self) -> VortexError {
        VortexError::MissingCredential {
            env_var: self.env_var.clone(),
            fallback: self.fallback_file.clone(),
        }
    }
}
