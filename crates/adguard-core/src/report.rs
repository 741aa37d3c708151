//! Result reporting
//!
//! Ansible expects exactly one JSON object on stdout. [`ModuleResult`] is that
//! object; it aggregates the per-server [`ServerOutcome`]s.

use crate::config::Rewrite;
use crate::error::{Error, Result};
use serde::Serialize;

/// Message reported when any server recorded an error
pub const FAILURE_MESSAGE: &str = "Error managing rewrites";

/// What happened on one server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServerOutcome {
    /// Base URL of the server (credentials are never reported)
    pub url: String,

    /// Rewrites created (or that would be, in check mode)
    pub added: Vec<Rewrite>,

    /// Rewrites deleted (or that would be, in check mode)
    pub removed: Vec<Rewrite>,

    /// Errors recorded while processing this server
    #[serde(skip)]
    pub errors: Vec<String>,
}

impl ServerOutcome {
    /// Create an empty outcome for a server
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// True when anything was added or removed
    pub fn changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// The module result handed back to Ansible
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleResult {
    /// Whether any server changed
    pub changed: bool,

    /// Whether any error was recorded
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,

    /// Human-readable summary
    pub msg: String,

    /// Every recorded error, `null` when there are none
    pub errors: Option<Vec<String>>,

    /// Per-server detail
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<ServerOutcome>,
}

impl ModuleResult {
    /// Aggregate per-server outcomes
    pub fn from_outcomes(outcomes: Vec<ServerOutcome>, check_mode: bool) -> Self {
        let changed = outcomes.iter().any(ServerOutcome::changed);
        let errors: Vec<String> = outcomes
            .iter()
            .flat_map(|outcome| outcome.errors.iter().cloned())
            .collect();
        let failed = !errors.is_empty();

        let msg = if failed {
            FAILURE_MESSAGE.to_string()
        } else {
            summarize(&outcomes, check_mode)
        };

        Self {
            changed,
            failed,
            msg,
            errors: if failed { Some(errors) } else { None },
            servers: outcomes,
        }
    }

    /// Result for arguments that could not be accepted
    pub fn argument_error(err: &Error) -> Self {
        Self {
            changed: false,
            failed: true,
            msg: err.to_string(),
            errors: None,
            servers: Vec::new(),
        }
    }

    /// Serialize for stdout
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn summarize(outcomes: &[ServerOutcome], check_mode: bool) -> String {
    let added: usize = outcomes.iter().map(|o| o.added.len()).sum();
    let removed: usize = outcomes.iter().map(|o| o.removed.len()).sum();

    if added == 0 && removed == 0 {
        return format!("All {} server(s) already in desired state", outcomes.len());
    }

    format!(
        "{} {} and {} {} rewrite(s) across {} server(s)",
        if check_mode { "Would add" } else { "Added" },
        added,
        if check_mode { "remove" } else { "removed" },
        removed,
        outcomes.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn changed_outcome(url: &str) -> ServerOutcome {
        let mut outcome = ServerOutcome::new(url);
        outcome.added.push(Rewrite::new("a.lan", "10.0.0.1"));
        outcome
    }

    #[test]
    fn success_result_shape() {
        let result = ModuleResult::from_outcomes(vec![changed_outcome("http://a")], false);
        let json: Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();

        assert_eq!(json["changed"], json!(true));
        assert_eq!(json["errors"], Value::Null);
        assert!(json.get("failed").is_none());
        assert_eq!(json["servers"][0]["url"], json!("http://a"));
        assert_eq!(
            json["servers"][0]["added"][0],
            json!({"domain": "a.lan", "answer": "10.0.0.1"})
        );
        assert_eq!(json["msg"], json!("Added 1 and removed 0 rewrite(s) across 1 server(s)"));
    }

    #[test]
    fn errors_from_any_server_fail_the_result() {
        let mut broken = ServerOutcome::new("http://b");
        broken.errors.push("Error listing rewrites for server http://b: boom".to_string());

        let result = ModuleResult::from_outcomes(vec![changed_outcome("http://a"), broken], false);

        assert!(result.failed);
        assert!(result.changed);
        assert_eq!(result.msg, FAILURE_MESSAGE);
        assert_eq!(result.errors.as_ref().map(Vec::len), Some(1));

        let json: Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        assert_eq!(json["failed"], json!(true));
        assert!(json["servers"][1].get("errors").is_none());
    }

    #[test]
    fn unchanged_summary() {
        let result = ModuleResult::from_outcomes(vec![ServerOutcome::new("http://a")], false);

        assert!(!result.changed);
        assert_eq!(result.msg, "All 1 server(s) already in desired state");
    }

    #[test]
    fn check_mode_summary() {
        let result = ModuleResult::from_outcomes(vec![changed_outcome("http://a")], true);
        assert!(result.msg.starts_with("Would add 1"));
    }

    #[test]
    fn argument_error_result() {
        let result = ModuleResult::argument_error(&Error::invalid_argument(
            "missing required arguments: servers",
        ));
        let json: Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();

        assert_eq!(
            json,
            json!({
                "changed": false,
                "failed": true,
                "msg": "missing required arguments: servers",
                "errors": null
            })
        );
    }
}
