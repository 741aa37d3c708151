// # adguard_rewrite - Ansible binary module
//
// This executable is a THIN integration layer. All reconciliation logic
// lives in adguard-core; all HTTP lives in adguard-client.
//
// It is responsible for:
// 1. Reading process settings from environment variables
// 2. Reading the JSON argument blob Ansible hands over
// 3. Running the reconciler on a single-threaded runtime
// 4. Printing exactly one JSON result object on stdout
//
// ## Invocation
//
// Ansible runs binary modules with one argument: the path of a file holding
// the module arguments as JSON. Without an argument the blob is read from
// stdin.
//
// ```bash
// echo '{"servers": [{"url": "http://10.0.0.2:3000", "username": "admin", "password": "pw"}],
//        "rewrites": [{"domain": "nas.lan", "answer": "10.0.0.10"}]}' | adguard_rewrite
// ```
//
// ## Configuration
//
// - `ADGUARD_REWRITE_LOG_LEVEL`: trace, debug, info, warn (default) or error
//
// Logs go to stderr; stdout is reserved for the result.

use adguard_client::AdGuardClientFactory;
use adguard_core::{Error as ModuleError, ModuleInvocation, ModuleResult, Reconciler};
use anyhow::{Context, Result};
use std::env;
use std::ffi::OsString;
use std::io::Read;
use std::path::Path;
use std::process::ExitCode;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// Exit codes reported to Ansible
///
/// - 0: `exit_json` (success, changed or not)
/// - 1: `fail_json` (argument error or any server error)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModuleExitCode {
    Success = 0,
    Failed = 1,
}

impl From<ModuleExitCode> for ExitCode {
    fn from(code: ModuleExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Process configuration
struct Config {
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        Self {
            log_level: env::var("ADGUARD_REWRITE_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string()),
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => anyhow::bail!(
                "ADGUARD_REWRITE_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }

    fn level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "error" => Level::ERROR,
            _ => Level::WARN,
        }
    }
}

fn main() -> ExitCode {
    let config = Config::from_env();
    if let Err(e) = config.validate() {
        return emit(&ModuleResult::argument_error(&ModuleError::config(e.to_string())));
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.level())
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    let input = match read_arguments(env::args_os().nth(1)) {
        Ok(input) => input,
        Err(e) => {
            error!("{:#}", e);
            return emit(&ModuleResult::argument_error(&ModuleError::from(e)));
        }
    };

    let invocation = match ModuleInvocation::from_json(&input) {
        Ok(invocation) => invocation,
        Err(e) => {
            error!("Invalid module arguments: {}", e);
            return emit(&ModuleResult::argument_error(&e));
        }
    };

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return emit(&ModuleResult::argument_error(&ModuleError::from(e)));
        }
    };

    let result = rt.block_on(run_module(invocation));
    emit(&result)
}

/// Run the reconciler against the real AdGuard Home API
async fn run_module(invocation: ModuleInvocation) -> ModuleResult {
    info!(
        "Starting adguard_rewrite for {} server(s)",
        invocation.args.servers.len()
    );

    Reconciler::new(Box::new(AdGuardClientFactory))
        .with_check_mode(invocation.check_mode)
        .run(&invocation.args)
        .await
}

/// Read the argument blob from the given file, or stdin when absent
fn read_arguments(path: Option<OsString>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(&path).with_context(|| {
            format!(
                "Failed to read module arguments from {}",
                Path::new(&path).display()
            )
        }),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read module arguments from stdin")?;
            Ok(input)
        }
    }
}

/// Print the result and pick the exit code
fn emit(result: &ModuleResult) -> ExitCode {
    exit_code_for(result, print_result(result)).into()
}

fn print_result(result: &ModuleResult) -> bool {
    match result.to_json() {
        Ok(json) => {
            println!("{}", json);
            true
        }
        Err(e) => {
            error!("Failed to serialize module result: {}", e);
            println!(
                "{}",
                serde_json::json!({
                    "failed": true,
                    "msg": format!("Failed to serialize module result: {}", e),
                })
            );
            false
        }
    }
}

fn exit_code_for(result: &ModuleResult, printed: bool) -> ModuleExitCode {
    if printed && !result.failed {
        ModuleExitCode::Success
    } else {
        ModuleExitCode::Failed
    }
}
