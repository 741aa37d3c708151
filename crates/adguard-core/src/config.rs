//! Module argument types
//!
//! Ansible hands the module a single JSON object. This module turns it into
//! a validated [`ModuleInvocation`], applying the same defaults and checks an
//! Ansible `argument_spec` would.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

/// Key Ansible may wrap the arguments in
const WRAPPER_KEY: &str = "ANSIBLE_MODULE_ARGS";

/// Prefix of the host-runtime metadata keys
const INTERNAL_PREFIX: &str = "_ansible_";

/// Parameters accepted by the module
const SUPPORTED_PARAMETERS: &[&str] = &[
    "exclusive",
    "rewrites",
    "servers",
    "state",
    "timeout",
    "validate_certs",
];

/// Parameters that must be present
const REQUIRED_PARAMETERS: &[&str] = &["servers", "rewrites"];

/// Keys accepted inside a `rewrites` entry
const REWRITE_KEYS: &[&str] = &["domain", "answer"];

/// A DNS rewrite: `domain` resolves to `answer`
///
/// Fields the API adds on top of these two (such as `enabled`) are ignored,
/// so a listed rewrite compares equal to the desired one it was created from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rewrite {
    /// Domain to rewrite, optionally with a leading `*.` wildcard
    pub domain: String,

    /// IP address or CNAME target
    pub answer: String,
}

impl Rewrite {
    /// Create a new rewrite
    pub fn new(domain: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            answer: answer.into(),
        }
    }

    /// Validate the rewrite
    pub fn validate(&self) -> Result<()> {
        validate_domain_name(&self.domain)?;

        if self.answer.trim().is_empty() {
            return Err(Error::invalid_argument(format!(
                "rewrite answer cannot be empty (domain: {})",
                self.domain
            )));
        }

        Ok(())
    }
}

impl fmt::Display for Rewrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.domain, self.answer)
    }
}

/// Desired state of the listed rewrites
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewriteState {
    /// Rewrites must exist
    #[default]
    Present,
    /// Rewrites must not exist
    Absent,
}

impl RewriteState {
    /// Accepted values, in the order they are reported
    pub const CHOICES: &'static [&'static str] = &["present", "absent"];
}

/// An AdGuard Home server and its credentials
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Base URL, e.g. `http://192.168.1.2:3000`
    pub url: String,

    /// Username for HTTP basic authentication
    pub username: String,

    /// Password for HTTP basic authentication
    /// ⚠️ NEVER log this value
    pub password: String,
}

// Custom Debug implementation that hides the password
impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Validate the server configuration
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(Error::invalid_argument("server url cannot be empty"));
        }

        if !self.url.starts_with("https://") && !self.url.starts_with("http://") {
            return Err(Error::invalid_argument(format!(
                "server url must use the http or https scheme. Got: {}",
                self.url
            )));
        }

        if self.username.is_empty() {
            return Err(Error::invalid_argument(format!(
                "server username cannot be empty (url: {})",
                self.url
            )));
        }

        Ok(())
    }
}

/// HTTP settings shared by every server connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Per-request timeout
    pub timeout: Duration,

    /// Whether TLS certificates are verified
    pub validate_certs: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(default_timeout()),
            validate_certs: true,
        }
    }
}

/// Validated module arguments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleArgs {
    /// Servers to reconcile, processed in order
    pub servers: Vec<ServerConfig>,

    /// Desired rewrites
    pub rewrites: Vec<Rewrite>,

    /// Whether the rewrites must be present or absent
    #[serde(default)]
    pub state: RewriteState,

    /// With `present`, remove every server rewrite not listed in `rewrites`
    #[serde(default)]
    pub exclusive: bool,

    /// HTTP timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Verify TLS certificates
    #[serde(default = "default_validate_certs")]
    pub validate_certs: bool,
}

impl ModuleArgs {
    /// Create arguments with defaults for the optional parameters
    pub fn new(servers: Vec<ServerConfig>, rewrites: Vec<Rewrite>) -> Self {
        Self {
            servers,
            rewrites,
            state: RewriteState::default(),
            exclusive: false,
            timeout: default_timeout(),
            validate_certs: default_validate_certs(),
        }
    }

    /// Set the desired state
    pub fn with_state(mut self, state: RewriteState) -> Self {
        self.state = state;
        self
    }

    /// Enable or disable exclusive mode
    pub fn with_exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    /// Validate the arguments
    pub fn validate(&self) -> Result<()> {
        for server in &self.servers {
            server.validate()?;
        }

        for rewrite in &self.rewrites {
            rewrite.validate()?;
        }

        if self.exclusive && self.state == RewriteState::Absent {
            return Err(Error::invalid_argument(
                "exclusive can only be used with state=present",
            ));
        }

        if !(1..=300).contains(&self.timeout) {
            return Err(Error::invalid_argument(format!(
                "timeout must be between 1 and 300 seconds. Got: {}",
                self.timeout
            )));
        }

        Ok(())
    }

    /// HTTP settings derived from the arguments
    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            timeout: Duration::from_secs(self.timeout),
            validate_certs: self.validate_certs,
        }
    }

    /// Normalize user input that the API is sensitive to
    fn normalize(&mut self) {
        for server in &mut self.servers {
            let trimmed = server.url.trim().trim_end_matches('/').to_string();
            server.url = trimmed;
        }
    }
}

/// A parsed module invocation: arguments plus host-runtime flags
#[derive(Debug, Clone)]
pub struct ModuleInvocation {
    /// Validated module arguments
    pub args: ModuleArgs,

    /// Ansible check mode: report changes without making them
    pub check_mode: bool,
}

impl ModuleInvocation {
    /// Parse and validate the JSON argument blob
    ///
    /// Accepts either the flat argument object or one wrapped in
    /// `ANSIBLE_MODULE_ARGS`. Errors are [`Error::InvalidArgument`] and carry
    /// the message to report back to Ansible.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| {
            Error::invalid_argument(format!("Failed to parse module arguments as JSON: {}", e))
        })?;

        let mut object = into_object(value)?;
        if let Some(inner) = object.remove(WRAPPER_KEY) {
            object = into_object(inner)?;
        }

        let check_mode = matches!(
            object.get("_ansible_check_mode"),
            Some(Value::Bool(true))
        );

        // Runtime metadata is not a parameter; null means "not provided"
        object.retain(|key, value| !key.starts_with(INTERNAL_PREFIX) && !value.is_null());

        let mut unsupported: Vec<&str> = object
            .keys()
            .map(String::as_str)
            .filter(|key| !SUPPORTED_PARAMETERS.contains(key))
            .collect();
        if !unsupported.is_empty() {
            unsupported.sort_unstable();
            return Err(Error::invalid_argument(format!(
                "Unsupported parameters for (adguard_rewrite) module: {}. Supported parameters include: {}.",
                unsupported.join(", "),
                SUPPORTED_PARAMETERS.join(", ")
            )));
        }

        let missing: Vec<&str> = REQUIRED_PARAMETERS
            .iter()
            .copied()
            .filter(|key| !object.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(Error::invalid_argument(format!(
                "missing required arguments: {}",
                missing.join(", ")
            )));
        }

        if let Some(state) = object.get("state")
            && !state
                .as_str()
                .is_some_and(|s| RewriteState::CHOICES.contains(&s))
        {
            return Err(Error::invalid_argument(format!(
                "value of state must be one of: {}, got: {}",
                RewriteState::CHOICES.join(", "),
                state.as_str().map(str::to_string).unwrap_or_else(|| state.to_string())
            )));
        }

        // Listed rewrites carry extra fields, so `Rewrite` itself stays lenient
        if let Some(Value::Array(rewrites)) = object.get("rewrites") {
            for (index, entry) in rewrites.iter().enumerate() {
                let Some(entry) = entry.as_object() else {
                    continue;
                };
                let mut unknown: Vec<&str> = entry
                    .keys()
                    .map(String::as_str)
                    .filter(|key| !REWRITE_KEYS.contains(key))
                    .collect();
                if !unknown.is_empty() {
                    unknown.sort_unstable();
                    return Err(Error::invalid_argument(format!(
                        "rewrites[{}]: unsupported keys: {}. Supported keys: {}",
                        index,
                        unknown.join(", "),
                        REWRITE_KEYS.join(", ")
                    )));
                }
            }
        }

        let mut args: ModuleArgs = serde_json::from_value(Value::Object(object))
            .map_err(|e| Error::invalid_argument(format!("Invalid module arguments: {}", e)))?;

        args.normalize();
        args.validate()?;

        Ok(Self { args, check_mode })
    }
}

fn into_object(value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::invalid_argument(format!(
            "Module arguments must be a JSON object, got: {}",
            other
        ))),
    }
}

/// Validate that a string is a valid rewrite domain
///
/// Basic DNS name validation per RFC 1035, plus a single leading `*`
/// label for wildcard rewrites.
fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        return Err(Error::invalid_argument("rewrite domain cannot be empty"));
    }

    // Total length limit (RFC 1035: 253 chars max)
    if domain.len() > 253 {
        return Err(Error::invalid_argument(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    let name = domain.strip_prefix("*.").unwrap_or(domain);

    for label in name.split('.') {
        if label.is_empty() {
            return Err(Error::invalid_argument(format!(
                "Domain name has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(Error::invalid_argument(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        // Underscores are accepted by AdGuard Home and used in service
        // labels such as _acme-challenge
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::invalid_argument(format!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric, hyphen and underscore only.",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::invalid_argument(format!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}

fn default_timeout() -> u64 {
    30
}

fn default_validate_certs() -> bool {
    true
}
