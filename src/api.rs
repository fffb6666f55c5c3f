// API client module: a small blocking client for the Gemini
// `generateContent` endpoint. The HTTP call sits behind the `Transport`
// trait and waiting behind `Sleeper`, so the retry loop can be exercised
// without a network or a real clock.

use crate::config::Settings;
use crate::credential::Credential;
use crate::error::{Result, VortexError};
use crate::prompt::AnalysisRequest;
use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::header::RETRY_AFTER;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;

/// Header carrying the API key. Keeps the key out of request URLs.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Status, retry hint and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub retry_after: Option<Duration>,
    pub body: String,
}

/// Network-level failure. Every variant is considered transient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Timeout,
    Connection(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Timeout => f.write_str("request timed out"),
            TransportError::Connection(msg) => write!(f, "connection failed: {msg}"),
        }
    }
}

/// One POST of a JSON body, authenticated with `api_key`.
pub trait Transport {
    fn post_json(&self, url: &str, api_key: &str, body: &Value) -> std::result::Result<HttpReply, TransportError>;
}

/// `reqwest::blocking` transport with a per-request timeout.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("vortexai/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| VortexError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(HttpTransport { client })
    }
}

impl Transport for HttpTransport {
    fn post_json(&self, url: &str, api_key: &str, body: &Value) -> std::result::Result<HttpReply, TransportError> {
        let res = self
            .client
            .post(url)
            .header(API_KEY_HEADER, api_key)
            .json(body)
            .send()
            .map_err(classify)?;
        let status = res.status().as_u16();
        let retry_after = res
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = res.text().map_err(classify)?;
        Ok(HttpReply {
            status,
            retry_after,
            body,
        })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        // reqwest's Display omits the underlying cause (reset, refused, ...).
        let mut msg = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            msg.push_str(": ");
            msg.push_str(&cause.to_string());
            source = cause.source();
        }
        TransportError::Connection(msg)
    }
}

/// Parse a `Retry-After` value: delta-seconds or an HTTP-date.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let when = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((when - Utc::now()).to_std().unwrap_or(Duration::ZERO))
}

pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Attempt bound and exponential backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        RetryPolicy {
            max_attempts: settings.max_attempts.max(1),
            initial_backoff: settings.initial_backoff,
            max_backoff: settings.max_backoff,
        }
    }
}

/// Gemini client: endpoint, model and retry policy around a transport.
pub struct ApiClient<T = HttpTransport, S = ThreadSleeper> {
    transport: T,
    sleeper: S,
    endpoint: String,
    model: String,
    policy: RetryPolicy,
}

impl ApiClient {
    /// Production client configured from `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let transport = HttpTransport::new(settings.timeout)?;
        Ok(ApiClient::new(
            transport,
            ThreadSleeper,
            &settings.endpoint,
            &settings.model,
            RetryPolicy::from_settings(settings),
        ))
    }
}

impl<T: Transport, S: Sleeper> ApiClient<T, S> {
    pub fn new(transport: T, sleeper: S, endpoint: &str, model: &str, policy: RetryPolicy) -> Self {
        ApiClient {
            transport,
            sleeper,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            policy,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    pub fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    /// Send `request` and return the model's reply text.
    ///
    /// Timeouts, connection failures, 408 and 5xx are retried with an
    /// exponentially growing delay. 429 waits for the server's retry hint
    /// when one is given. Any other non-success status fails at once.
    pub fn send(&mut self, request: &AnalysisRequest, credential: &Credential) -> Result<String> {
        let url = self.url();
        let payload = generate_content_payload(request);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut backoff = self.policy.initial_backoff;
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            tracing::debug!(attempt, max_attempts, model = %self.model, "sending generateContent request");

            let wait = match self.transport.post_json(&url, credential.expose(), &payload) {
                Ok(reply) if (200..300).contains(&reply.status) => {
                    tracing::info!(attempt, "Gemini API responded");
                    return extract_text(&reply.body);
                }
                Ok(reply) if reply.status == 429 => {
                    let hint = reply.retry_after.or_else(|| retry_delay_from_body(&reply.body));
                    last_error = format!("rate limited (HTTP 429): {}", error_message(&reply.body));
                    hint.unwrap_or(backoff)
                }
                Ok(reply) if reply.status == 408 || reply.status >= 500 => {
                    last_error = format!("HTTP {}: {}", reply.status, error_message(&reply.body));
                    backoff
                }
                Ok(reply) => {
                    return Err(VortexError::ApiRejected {
                        status: reply.status,
                        message: error_message(&reply.body),
                    });
                }
                Err(err) => {
                    last_error = err.to_string();
                    backoff
                }
            };

            if attempt < max_attempts {
                tracing::warn!(attempt, error = %last_error, ?wait, "transient API failure, retrying");
                self.sleeper.sleep(wait);
                backoff = backoff.saturating_mul(2).min(self.policy.max_backoff);
            }
        }

        Err(VortexError::ApiUnavailable {
            attempts: max_attempts,
            last_error,
        })
    }
}

/// Gemini request body asking for the vulnerability array as JSON.
pub fn generate_content_payload(request: &AnalysisRequest) -> Value {
    let string_array = json!({ "type": "ARRAY", "items": { "type": "STRING" } });
    json!({
        "contents": [
            { "role": "user", "parts": [ { "text": request.prompt_text() } ] }
        ],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "description": { "type": "STRING" },
                        "metasploit_modules": string_array,
                        "exploit_links": string_array,
                        "other_tools_and_formats": string_array
                    },
                    "required": [
                        "name",
                        "description",
                        "metasploit_modules",
                        "exploit_links",
                        "other_tools_and_formats"
                    ]
                }
            }
        }
    })
}

/// Pull the candidate text out of a `generateContent` response.
fn extract_text(body: &str) -> Result<String> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| VortexError::InvalidResponse(format!("response is not JSON: {e}")))?;

    let parts = value
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array);
    let text: Option<String> = parts.map(|parts| {
        parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect()
    });

    match text {
        Some(text) if !text.is_empty() => Ok(text),
        _ => {
            if let Some(reason) = value.pointer("/promptFeedback/blockReason").and_then(Value::as_str) {
                return Err(VortexError::InvalidResponse(format!("prompt blocked: {reason}")));
            }
            if let Some(reason) = value.pointer("/candidates/0/finishReason").and_then(Value::as_str) {
                return Err(VortexError::InvalidResponse(format!(
                    "no text in candidate (finish reason {reason})"
                )));
            }
            Err(VortexError::InvalidResponse("no candidate text in response".into()))
        }
    }
}

/// Best human-readable message from an error body.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(msg) = value.pointer("/error/message").and_then(Value::as_str) {
            return msg.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no details".to_string();
    }
    trimmed.chars().take(200).collect()
}

/// `RetryInfo.retryDelay` from a Gemini error body, e.g. `"17s"`.
fn retry_delay_from_body(body: &str) -> Option<Duration> {
    let value: Value = serde_json::from_str(body).ok()?;
    let details = value.pointer("/error/details")?.as_array()?;
    details.iter().find_map(|detail| {
        let kind = detail.get("@type")?.as_str()?;
        if !kind.ends_with("RetryInfo") {
            return None;
        }
        let delay = detail.get("retryDelay")?.as_str()?;
        let secs: f64 = delay.trim().strip_suffix('s')?.parse().ok()?;
        // Negative, NaN or out-of-range delays count as no hint.
        Duration::try_from_secs_f64(secs).ok()
    })
}
