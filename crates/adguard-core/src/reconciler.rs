//! Rewrite reconciler
//!
//! The Reconciler is responsible for:
//! - Connecting to each configured server
//! - Fetching the rewrites it currently has
//! - Planning the minimal set of add/delete calls
//! - Applying the plan (or only reporting it in check mode)
//!
//! ## Flow
//!
//! ```text
//! ModuleArgs ──► for each server ──► list ──► plan ──► delete/add ──► ServerOutcome
//!                                                                         │
//!                                                   ModuleResult ◄────────┘
//! ```
//!
//! Servers are processed one at a time, in input order. Any failure is
//! recorded against its server and processing moves on.

use crate::config::{ConnectionOptions, ModuleArgs, Rewrite, RewriteState, ServerConfig};
use crate::report::{ModuleResult, ServerOutcome};
use crate::traits::{RewriteApi, RewriteApiFactory};
use std::collections::HashSet;
use tracing::{debug, error, info};

/// Calls needed to bring one server to the desired state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewritePlan {
    /// Rewrites to create
    pub to_add: Vec<Rewrite>,

    /// Rewrites to delete
    pub to_remove: Vec<Rewrite>,
}

impl RewritePlan {
    /// True when the server is already converged
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Compute the plan for one server
///
/// - `Present`: add each desired rewrite the server lacks; with `exclusive`,
///   also delete each server rewrite that is not desired.
/// - `Absent`: delete each desired rewrite the server has.
///
/// Output preserves input order and contains no duplicates.
pub fn plan(
    desired: &[Rewrite],
    current: &[Rewrite],
    state: RewriteState,
    exclusive: bool,
) -> RewritePlan {
    let current_set: HashSet<&Rewrite> = current.iter().collect();

    match state {
        RewriteState::Present => {
            let desired_set: HashSet<&Rewrite> = desired.iter().collect();

            let to_add = unique(desired.iter().filter(|r| !current_set.contains(r)));
            let to_remove = if exclusive {
                unique(current.iter().filter(|r| !desired_set.contains(r)))
            } else {
                Vec::new()
            };

            RewritePlan { to_add, to_remove }
        }
        RewriteState::Absent => RewritePlan {
            to_add: Vec::new(),
            to_remove: unique(desired.iter().filter(|r| current_set.contains(r))),
        },
    }
}

fn unique<'a>(rewrites: impl Iterator<Item = &'a Rewrite>) -> Vec<Rewrite> {
    let mut seen = HashSet::new();
    rewrites
        .filter(|r| seen.insert(*r))
        .cloned()
        .collect()
}

/// Converges a set of servers to the desired rewrites
pub struct Reconciler {
    /// Builds one API handle per server
    factory: Box<dyn RewriteApiFactory>,

    /// Plan and report only; never call add/delete
    check_mode: bool,
}

impl Reconciler {
    /// Create a new reconciler
    pub fn new(factory: Box<dyn RewriteApiFactory>) -> Self {
        Self {
            factory,
            check_mode: false,
        }
    }

    /// Enable or disable check mode
    pub fn with_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    /// Reconcile every server and aggregate the outcome
    ///
    /// This never returns early: each server is attempted regardless of
    /// failures on the others.
    pub async fn run(&self, args: &ModuleArgs) -> ModuleResult {
        info!(
            "Reconciling {} rewrite(s) on {} server(s) [state: {:?}, mode: {}]",
            args.rewrites.len(),
            args.servers.len(),
            args.state,
            if self.check_mode { "CHECK" } else { "LIVE" }
        );

        let options = args.connection_options();
        let mut outcomes = Vec::with_capacity(args.servers.len());

        for server in &args.servers {
            let outcome = self.reconcile_server(server, args, &options).await;
            if !outcome.errors.is_empty() {
                error!(
                    "Server {} finished with {} error(s)",
                    outcome.url,
                    outcome.errors.len()
                );
            }
            outcomes.push(outcome);
        }

        ModuleResult::from_outcomes(outcomes, self.check_mode)
    }

    /// Reconcile a single server
    async fn reconcile_server(
        &self,
        server: &ServerConfig,
        args: &ModuleArgs,
        options: &ConnectionOptions,
    ) -> ServerOutcome {
        let mut outcome = ServerOutcome::new(&server.url);

        let api = match self.factory.create(server, options) {
            Ok(api) => api,
            Err(e) => {
                outcome.errors.push(format!(
                    "Error connecting to server {}: {}",
                    server.url, e
                ));
                return outcome;
            }
        };

        let current = match api.list_rewrites().await {
            Ok(current) => current,
            Err(e) => {
                outcome.errors.push(format!(
                    "Error listing rewrites for server {}: {}",
                    server.url, e
                ));
                return outcome;
            }
        };
        debug!("Server {} has {} rewrite(s)", api.endpoint(), current.len());

        let plan = plan(&args.rewrites, &current, args.state, args.exclusive);
        if plan.is_empty() {
            debug!("Server {} already converged", api.endpoint());
            return outcome;
        }

        if self.check_mode {
            info!(
                "[CHECK] Would add {} and remove {} rewrite(s) on {}",
                plan.to_add.len(),
                plan.to_remove.len(),
                api.endpoint()
            );
            outcome.added = plan.to_add;
            outcome.removed = plan.to_remove;
            return outcome;
        }

        self.apply(api.as_ref(), plan, &mut outcome).await;
        outcome
    }

    /// Issue the planned calls, removals first
    async fn apply(&self, api: &dyn RewriteApi, plan: RewritePlan, outcome: &mut ServerOutcome) {
        for rewrite in plan.to_remove {
            match api.delete_rewrite(&rewrite).await {
                Ok(()) => {
                    info!("Deleted rewrite {} from {}", rewrite, api.endpoint());
                    outcome.removed.push(rewrite);
                }
                Err(e) => outcome.errors.push(format!(
                    "Error deleting rewrite {} from server {}: {}",
                    rewrite, outcome.url, e
                )),
            }
        }

        for rewrite in plan.to_add {
            match api.add_rewrite(&rewrite).await {
                Ok(()) => {
                    info!("Added rewrite {} to {}", rewrite, api.endpoint());
                    outcome.added.push(rewrite);
                }
                Err(e) => outcome.errors.push(format!(
                    "Error adding rewrite {} to server {}: {}",
                    rewrite, outcome.url, e
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rw(domain: &str, answer: &str) -> Rewrite {
        Rewrite::new(domain, answer)
    }

    #[test]
    fn present_adds_only_missing() {
        let desired = vec![rw("a.lan", "10.0.0.1"), rw("b.lan", "10.0.0.2")];
        let current = vec![rw("a.lan", "10.0.0.1"), rw("z.lan", "10.0.0.9")];

        let plan = plan(&desired, &current, RewriteState::Present, false);

        assert_eq!(plan.to_add, vec![rw("b.lan", "10.0.0.2")]);
        assert!(plan.to_remove.is_empty());
    }

    #[test]
    fn present_treats_changed_answer_as_new_rewrite() {
        let desired = vec![rw("a.lan", "10.0.0.5")];
        let current = vec![rw("a.lan", "10.0.0.1")];

        let plan = plan(&desired, &current, RewriteState::Present, false);

        assert_eq!(plan.to_add, desired);
        assert!(plan.to_remove.is_empty());
    }

    #[test]
    fn exclusive_removes_unlisted() {
        let desired = vec![rw("a.lan", "10.0.0.5")];
        let current = vec![rw("a.lan", "10.0.0.1"), rw("b.lan", "10.0.0.2")];

        let plan = plan(&desired, &current, RewriteState::Present, true);

        assert_eq!(plan.to_add, desired);
        assert_eq!(plan.to_remove, current);
    }

    #[test]
    fn absent_removes_only_existing() {
        let desired = vec![rw("a.lan", "10.0.0.1"), rw("gone.lan", "10.0.0.3")];
        let current = vec![rw("a.lan", "10.0.0.1"), rw("b.lan", "10.0.0.2")];

        let plan = plan(&desired, &current, RewriteState::Absent, false);

        assert!(plan.to_add.is_empty());
        assert_eq!(plan.to_remove, vec![rw("a.lan", "10.0.0.1")]);
    }

    #[test]
    fn duplicates_are_planned_once() {
        let desired = vec![rw("a.lan", "10.0.0.1"), rw("a.lan", "10.0.0.1")];

        let plan = plan(&desired, &[], RewriteState::Present, false);

        assert_eq!(plan.to_add.len(), 1);
    }

    #[test]
    fn converged_server_has_empty_plan() {
        let desired = vec![rw("a.lan", "10.0.0.1")];

        assert!(plan(&desired, &desired, RewriteState::Present, true).is_empty());
        assert!(plan(&desired, &[], RewriteState::Absent, false).is_empty());
    }
}
