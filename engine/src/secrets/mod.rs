//! Credential lookup and scrubbing
//!
//! Every credential the engine uses is optional. The binary looks in the
//! process environment first, then in `credentials.toml` under the data
//! directory, which is re-read on every lookup so a key written there
//! reaches a running `serve`. A missing credential never crashes anything:
//! the generator reports itself unconfigured and effectors answer with an
//! explicit error string.
//!
//! Lookups go through the [`SecretSource`] trait so the generator can become
//! configured at runtime and tests can flip credentials without touching the
//! real environment.

pub mod string;

pub use string::SecretString;

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, RwLock};
use tracing::warn;

/// Model provider API key
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Payment provider API key
pub const PAYMENT_API_KEY: &str = "PAYMENT_API_KEY";

/// Calendar credential blob (JSON)
pub const CALENDAR_CREDENTIALS: &str = "CALENDAR_CREDENTIALS";

/// Operator override for the plan generator's system instruction
pub const SYSTEM_INSTRUCTION: &str = "LIFEOS_SYSTEM_INSTRUCTION";

/// Anything that can answer "what is the current value of credential X"
pub trait SecretSource: Send + Sync {
    /// Returns the credential, or `None` when it is absent or blank
    fn get_secret(&self, key: &str) -> Option<SecretString>;

    fn has_secret(&self, key: &str) -> bool {
        self.get_secret(key).is_some()
    }
}

/// Reads credentials from the process environment on every lookup
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecrets;

impl SecretSource for EnvSecrets {
    fn get_secret(&self, key: &str) -> Option<SecretString> {
        std::env::var(key)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(SecretString::from)
    }
}

/// Flat TOML file of `NAME = "value"` pairs, read fresh on every lookup.
/// A missing file means no credentials; an unreadable one is logged and
/// treated the same way.
#[derive(Debug, Clone)]
pub struct FileSecrets {
    path: PathBuf,
}

impl FileSecrets {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> HashMap<String, String> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return HashMap::new(),
            Err(e) => {
                warn!("Cannot read credentials file {}: {}", self.path.display(), e);
                return HashMap::new();
            }
        };

        toml::from_str(&contents).unwrap_or_else(|e| {
            warn!("Ignoring malformed credentials file {}: {}", self.path.display(), e);
            HashMap::new()
        })
    }
}

impl SecretSource for FileSecrets {
    fn get_secret(&self, key: &str) -> Option<SecretString> {
        self.load()
            .remove(key)
            .filter(|v| !v.trim().is_empty())
            .map(SecretString::from)
    }
}

/// Asks each source in order; the first one holding the key wins
pub struct ChainedSecrets {
    sources: Vec<Arc<dyn SecretSource>>,
}

impl ChainedSecrets {
    pub fn new(sources: Vec<Arc<dyn SecretSource>>) -> Self {
        Self { sources }
    }
}

impl SecretSource for ChainedSecrets {
    fn get_secret(&self, key: &str) -> Option<SecretString> {
        self.sources.iter().find_map(|source| source.get_secret(key))
    }
}

/// In-memory credential map. Values can be set and removed while the engine
/// is running.
#[derive(Debug, Default)]
pub struct MemorySecrets {
    values: RwLock<HashMap<String, SecretString>>,
}

impl MemorySecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, key: &str, value: &str) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&self, key: &str, value: &str) {
        let mut values = self.values.write().expect("MemorySecrets lock poisoned");
        values.insert(key.to_string(), SecretString::from(value));
    }

    pub fn remove(&self, key: &str) {
        let mut values = self.values.write().expect("MemorySecrets lock poisoned");
        values.remove(key);
    }
}

impl SecretSource for MemorySecrets {
    fn get_secret(&self, key: &str) -> Option<SecretString> {
        let values = self.values.read().expect("MemorySecrets lock poisoned");
        values
            .get(key)
            .filter(|v| !v.expose().trim().is_empty())
            .cloned()
    }
}

/// Parsed `CALENDAR_CREDENTIALS` blob
#[derive(Debug, Clone, Deserialize)]
pub struct CalendarCredentials {
    pub access_token: String,
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

impl CalendarCredentials {
    /// Parse the credential blob. A bare token (not JSON) is accepted as the
    /// access token for the primary calendar.
    pub fn parse(blob: &SecretString) -> Result<Self, String> {
        let raw = blob.expose().trim();
        if raw.starts_with('{') {
            serde_json::from_str(raw)
                .map_err(|e| format!("invalid calendar credentials: {}", e))
        } else {
            Ok(Self {
                access_token: raw.to_string(),
                calendar_id: default_calendar_id(),
            })
        }
    }
}

/// Regex patterns for detecting credential-like strings.
static SECRET_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

/// Patterns match:
/// - OpenAI API keys: sk-...
/// - Stripe keys: sk_live_..., sk_test_..., rk_live_...
/// - Google OAuth access tokens: ya29....
/// - Bearer tokens
fn get_secret_patterns() -> &'static Vec<Regex> {
    SECRET_PATTERNS.get_or_init(|| {
        vec![
            Regex::new(r"sk-[a-zA-Z0-9\-_]{20,}").expect("Invalid OpenAI pattern"),
            Regex::new(r"(sk|rk)_(live|test)_[a-zA-Z0-9]{10,}").expect("Invalid Stripe pattern"),
            Regex::new(r"ya29\.[a-zA-Z0-9\-_\.]{10,}").expect("Invalid Google pattern"),
            Regex::new(r"Bearer\s+[^\s]{20,}").expect("Invalid Bearer pattern"),
        ]
    })
}

/// Remove credential-like substrings from text that is about to leave the
/// process (error strings echoed from providers, log lines).
pub fn scrub(text: &str) -> String {
    let mut result = text.to_string();
    for pattern in get_secret_patterns() {
        result = pattern.replace_all(&result, "[REDACTED]").into_owned();
    }
    result
}
