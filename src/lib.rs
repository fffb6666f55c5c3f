// Library root
// ------------
// The binary (`main.rs`) parses flags and hands off to `app::run`, which
// drives the pipeline below in order.
//
// Module responsibilities:
// - `credential`: locate the Gemini API key (environment, then key file).
// - `prompt`: read the scan results and build the immutable request.
// - `api`: talk to the Gemini API with timeout and retry handling.
// - `analysis`: split the model's reply into categorized sections.
// - `ui`: render those sections with colors; console helpers.
// - `logfile`: persist the analysis next to the input file.
// - `config`, `cli`, `error`: settings, flags and the error taxonomy.
pub mod analysis;
pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod credential;
pub mod error;
pub mod logfile;
pub mod prompt;
pub mod ui;

pub use error::{Result, VortexError};
