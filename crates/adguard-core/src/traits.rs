// # Rewrite API Trait
//
// Defines the interface for managing DNS rewrites on a single AdGuard Home
// server.
//
// ## Implementations
//
// - AdGuard Home REST API: `adguard-client` crate
// - In-memory fakes for contract tests
//
// ## Usage
//
// ```rust,ignore
// use adguard_core::{Rewrite, RewriteApi};
//
// async fn ensure(api: &dyn RewriteApi) -> adguard_core::Result<()> {
//     let wanted = Rewrite::new("nas.home.lan", "10.0.0.10");
//     if !api.list_rewrites().await?.contains(&wanted) {
//         api.add_rewrite(&wanted).await?;
//     }
//     Ok(())
// }
// ```

use crate::config::{ConnectionOptions, Rewrite, ServerConfig};
use crate::error::Result;
use async_trait::async_trait;

/// Trait for rewrite API implementations
///
/// One instance talks to one server. Implementations perform exactly one
/// request per call and never retry: whether a call is needed at all is
/// decided by the [`Reconciler`](crate::Reconciler).
#[async_trait]
pub trait RewriteApi: Send + Sync {
    /// List every rewrite currently configured on the server
    async fn list_rewrites(&self) -> Result<Vec<Rewrite>>;

    /// Add a rewrite
    async fn add_rewrite(&self, rewrite: &Rewrite) -> Result<()>;

    /// Delete a rewrite
    async fn delete_rewrite(&self, rewrite: &Rewrite) -> Result<()>;

    /// Base URL of the server (for logging and result reporting)
    fn endpoint(&self) -> &str;
}

/// Helper trait for constructing rewrite APIs from configuration
pub trait RewriteApiFactory: Send + Sync {
    /// Create a RewriteApi for one server
    ///
    /// # Parameters
    ///
    /// - `server`: URL and credentials of the server
    /// - `options`: HTTP settings shared by all servers
    fn create(
        &self,
        server: &ServerConfig,
        options: &ConnectionOptions,
    ) -> Result<Box<dyn RewriteApi>>;
}
