// Error taxonomy for a single vortexai run. Every variant carries enough
// context to print a useful console message; `main` decides the exit code
// through `VortexError::exit_code`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VortexError {
    #[error("no Gemini API key found: set {env_var} or write the key to '{fallback}'")]
    MissingCredential { env_var: String, fallback: PathBuf },

    #[error("cannot read results file '{path}': {reason}")]
    FileRead { path: PathBuf, reason: String },

    #[error("the query must not be empty")]
    EmptyQuery,

    #[error("Gemini API rejected the request (HTTP {status}): {message}")]
    ApiRejected { status: u16, message: String },

    #[error("Gemini API unavailable after {attempts} attempt(s): {last_error}")]
    ApiUnavailable { attempts: u32, last_error: String },

    #[error("unexpected response from Gemini API: {0}")]
    InvalidResponse(String),

    #[error("could not write log file '{path}': {source}")]
    LogWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write analysis to the console: {0}")]
    Console(#[source] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl VortexError {
    /// Process exit status for a run that ended with this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            VortexError::EmptyQuery => 2,
            // Log failures are warnings; the analysis was already shown.
            VortexError::LogWrite { .. } => 0,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, VortexError>;
