// # adguard-core
//
// Core library for the `adguard_rewrite` Ansible module.
//
// ## Architecture Overview
//
// - **ModuleArgs**: The validated argument blob handed over by Ansible
// - **RewriteApi**: Trait for listing, adding and deleting rewrites on one server
// - **Reconciler**: Converges every server towards the desired rewrite list
// - **ModuleResult**: The JSON result object reported back to Ansible
//
// ## Design Principles
//
// 1. **Separation of Concerns**: HTTP lives in `adguard-client`, invocation in `adguard-rewrite`
// 2. **Idempotency**: Only planned operations reach the API; a converged server sees none
// 3. **Isolation**: A failing server never stops the remaining ones
// 4. **Library-First**: The reconciler can be driven without the executable

pub mod config;
pub mod error;
pub mod reconciler;
pub mod report;
pub mod traits;

// Re-export core types for convenience
pub use config::{ConnectionOptions, ModuleArgs, ModuleInvocation, Rewrite, RewriteState, ServerConfig};
pub use error::{Error, Result};
pub use reconciler::{RewritePlan, Reconciler, plan};
pub use report::{ModuleResult, ServerOutcome};
pub use traits::{RewriteApi, RewriteApiFactory};
