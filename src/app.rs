// Run orchestration: the strictly linear credential -> prompt -> API ->
// display -> log sequence. All collaborators are passed in so the whole
// flow can be driven from tests.

use crate::analysis::AnalysisResponse;
use crate::api::{ApiClient, Sleeper, Transport};
use crate::config::Settings;
use crate::credential::CredentialResolver;
use crate::error::{Result, VortexError};
use crate::logfile::{self, LogRecord};
use crate::prompt;
use crate::ui::{self, Renderer};
use std::io::Write;
use std::path::PathBuf;

/// What the user asked for on the command line.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub results_file: PathBuf,
    pub query: String,
    pub color: bool,
}

/// Outcome of a run whose analysis was displayed.
#[derive(Debug)]
pub struct RunReport {
    pub response: AnalysisResponse,
    /// `Ok(path)` when logged, the write error otherwise.
    pub log: Result<PathBuf>,
}

/// Execute one analysis.
///
/// Errors from credential resolution, request building or the API call
/// abort before anything is written to `out`. A failed log write is
/// returned inside the report.
pub fn run<T, S, F, W>(
    settings: &Settings,
    invocation: &Invocation,
    env_lookup: F,
    client: &mut ApiClient<T, S>,
    out: &mut W,
) -> Result<RunReport>
where
    T: Transport,
    S: Sleeper,
    F: Fn(&str) -> Option<String>,
    W: Write,
{
    let resolver = CredentialResolver::new(crate::credential::API_KEY_ENV, &settings.credential_file);
    let (credential, source) = resolver.resolve_with(env_lookup)?;
    tracing::info!(?source, "API key resolved");

    let request = prompt::build(&invocation.results_file, &invocation.query, settings.max_input_bytes)?;

    let spinner = ui::spinner("Sending structured query to Gemini AI. Please wait...");
    let reply = client.send(&request, &credential);
    spinner.finish_and_clear();
    let response = AnalysisResponse::parse(reply?);

    let renderer = Renderer::new(settings.palette.clone(), invocation.color);
    display(out, &renderer.format(&response))?;

    let log = logfile::write(
        &LogRecord::new(request.source_path(), request.query(), &response),
        settings.log_mode,
    );
    match &log {
        Ok(path) => tracing::info!(path = %path.display(), "analysis saved"),
        Err(err) => tracing::warn!(error = %err, "analysis not saved"),
    }

    Ok(RunReport { response, log })
}

fn display<W: Write>(out: &mut W, text: &str) -> Result<()> {
    out.write_all(text.as_bytes())
        .and_then(|_| out.flush())
        .map_err(VortexError::Console)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Category;
    use crate::api::{HttpReply, RetryPolicy, TransportError};
    use crate::logfile::log_path_for;
    use serde_json::{json, Value};
    use std::cell::Cell;
    use std::path::Path;
    use std::time::Duration;

    struct ScriptedTransport {
        reply: Box<dyn Fn() -> std::result::Result<HttpReply, TransportError>>,
        calls: Cell<usize>,
    }

    impl Transport for ScriptedTransport {
        fn post_json(&self, _: &str, _: &str, _: &Value) -> std::result::Result<HttpReply, TransportError> {
            self.calls.set(self.calls.get() + 1);
            (self.reply)()
        }
    }

    struct NoSleep;

    impl Sleeper for NoSleep {
        fn sleep(&mut self, _: Duration) {}
    }

    fn client_with<R>(reply: R) -> ApiClient<ScriptedTransport, NoSleep>
    where
        R: Fn() -> std::result::Result<HttpReply, TransportError> + 'static,
    {
        let transport = ScriptedTransport {
            reply: Box::new(reply),
            calls: Cell::new(0),
        };
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
        };
        ApiClient::new(transport, NoSleep, "http://unused", "gemini-test", policy)
    }

    fn gemini_reply(text: &str) -> std::result::Result<HttpReply, TransportError> {
        let body = json!({ "candidates": [ { "content": { "parts": [ { "text": text } ] } } ] });
        Ok(HttpReply {
            status: 200,
            retry_after: None,
            body: body.to_string(),
        })
    }

    fn settings(dir: &Path) -> Settings {
        Settings {
            credential_file: dir.join("no-key-file.txt"),
            ..Settings::default()
        }
    }

    fn with_key(name: &str) -> Option<String> {
        (name == crate::credential::API_KEY_ENV).then(|| "test-key".to_string())
    }

    fn invocation(path: PathBuf) -> Invocation {
        Invocation {
            results_file: path,
            query: "find vulnerabilities".into(),
            color: false,
        }
    }

    #[test]
    fn scan_scenario_displays_and_logs() {
        let dir = tempfile::tempdir().unwrap();
        let scan = dir.path().join("scan.txt");
        std::fs::write(&scan, "open port 22 ssh").unwrap();

        let mut client = client_with(|| gemini_reply("Vulnerabilities:\n- CVE-1234\nMetasploit Modules:\n- exploit/ssh/foo"));
        let mut out = Vec::new();
        let report = run(&settings(dir.path()), &invocation(scan.clone()), with_key, &mut client, &mut out).unwrap();

        assert_eq!(report.response.entries(Category::Vulnerabilities), ["CVE-1234"]);
        assert_eq!(report.response.entries(Category::MetasploitModules), ["exploit/ssh/foo"]);
        assert_eq!(report.response.sections.len(), 2);

        let shown = String::from_utf8(out).unwrap();
        assert!(shown.contains("  - exploit/ssh/foo"));

        let saved = report.log.unwrap();
        assert_eq!(saved, dir.path().join("scan.txt.log"));
        let logged = std::fs::read_to_string(saved).unwrap();
        assert!(logged.contains("CVE-1234"));
        assert!(!logged.contains("test-key"));
    }

    #[test]
    fn missing_credential_makes_no_network_call() {
        let dir = tempfile::tempdir().unwrap();
        let scan = dir.path().join("scan.txt");
        std::fs::write(&scan, "data").unwrap();

        let mut client = client_with(|| gemini_reply("unused"));
        let mut out = Vec::new();
        let err = run(&settings(dir.path()), &invocation(scan), |_| None, &mut client, &mut out).unwrap_err();

        assert!(matches!(err, VortexError::MissingCredential { .. }));
        assert_eq!(client.transport().calls.get(), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn missing_file_makes_no_call_and_no_log() {
        let dir = tempfile::tempdir().unwrap();
        let scan = dir.path().join("scan.txt");

        let mut client = client_with(|| gemini_reply("unused"));
        let mut out = Vec::new();
        let err = run(&settings(dir.path()), &invocation(scan.clone()), with_key, &mut client, &mut out).unwrap_err();

        assert!(matches!(err, VortexError::FileRead { .. }));
        assert_eq!(client.transport().calls.get(), 0);
        assert!(!log_path_for(&scan).exists());
    }

    #[test]
    fn repeated_timeouts_produce_no_output_and_no_log() {
        let dir = tempfile::tempdir().unwrap();
        let scan = dir.path().join("scan.txt");
        std::fs::write(&scan, "data").unwrap();

        let mut client = client_with(|| Err(TransportError::Timeout));
        let mut out = Vec::new();
        let err = run(&settings(dir.path()), &invocation(scan.clone()), with_key, &mut client, &mut out).unwrap_err();

        assert!(matches!(err, VortexError::ApiUnavailable { attempts: 3, .. }));
        assert_eq!(client.transport().calls.get(), 3);
        assert!(out.is_empty());
        assert!(!log_path_for(&scan).exists());
    }

    #[test]
    fn log_failure_still_reports_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let scan = dir.path().join("scan.txt");
        std::fs::write(&scan, "data").unwrap();
        // A directory where the log file should go makes the open fail.
        std::fs::create_dir(log_path_for(&scan)).unwrap();

        let mut client = client_with(|| gemini_reply("plain words"));
        let mut out = Vec::new();
        let report = run(&settings(dir.path()), &invocation(scan), with_key, &mut client, &mut out).unwrap();

        assert!(matches!(report.log, Err(VortexError::LogWrite { .. })));
        assert_eq!(report.response.entries(Category::Other), ["plain words"]);
        assert!(!out.is_empty());
    }
}
