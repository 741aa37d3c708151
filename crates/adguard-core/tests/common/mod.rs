//! Test doubles and common utilities for reconciler contract tests
//!
//! This module provides an in-memory stand-in for AdGuard Home servers that
//! records every API call made against it.

#![allow(dead_code)]

use adguard_core::error::{Error, Result};
use adguard_core::{
    ConnectionOptions, ModuleArgs, Rewrite, RewriteApi, RewriteApiFactory, ServerConfig,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Which call a fake server should reject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Connect,
    List,
    Add,
    Delete,
}

/// In-memory state of one fake server, shared between test and reconciler
#[derive(Default)]
pub struct FakeServer {
    rewrites: Mutex<Vec<Rewrite>>,
    failures: Mutex<Vec<Failure>>,
    list_call_count: AtomicUsize,
    add_call_count: AtomicUsize,
    delete_call_count: AtomicUsize,
}

impl FakeServer {
    pub fn with_rewrites(rewrites: Vec<Rewrite>) -> Arc<Self> {
        let server = Self::default();
        *server.rewrites.lock().unwrap() = rewrites;
        Arc::new(server)
    }

    /// Make every call of the given kind fail
    pub fn fail_on(&self, failure: Failure) {
        self.failures.lock().unwrap().push(failure);
    }

    pub fn rewrites(&self) -> Vec<Rewrite> {
        self.rewrites.lock().unwrap().clone()
    }

    pub fn list_call_count(&self) -> usize {
        self.list_call_count.load(Ordering::SeqCst)
    }

    pub fn add_call_count(&self) -> usize {
        self.add_call_count.load(Ordering::SeqCst)
    }

    pub fn delete_call_count(&self) -> usize {
        self.delete_call_count.load(Ordering::SeqCst)
    }

    /// Number of add + delete calls
    pub fn mutation_count(&self) -> usize {
        self.add_call_count() + self.delete_call_count()
    }

    fn fails(&self, failure: Failure) -> bool {
        self.failures.lock().unwrap().contains(&failure)
    }
}

/// A RewriteApi backed by a FakeServer
pub struct FakeRewriteApi {
    url: String,
    server: Arc<FakeServer>,
}

#[async_trait::async_trait]
impl RewriteApi for FakeRewriteApi {
    async fn list_rewrites(&self) -> Result<Vec<Rewrite>> {
        self.server.list_call_count.fetch_add(1, Ordering::SeqCst);
        if self.server.fails(Failure::List) {
            return Err(Error::api(500, "list failed"));
        }
        Ok(self.server.rewrites())
    }

    async fn add_rewrite(&self, rewrite: &Rewrite) -> Result<()> {
        self.server.add_call_count.fetch_add(1, Ordering::SeqCst);
        if self.server.fails(Failure::Add) {
            return Err(Error::api(400, "add failed"));
        }
        self.server.rewrites.lock().unwrap().push(rewrite.clone());
        Ok(())
    }

    async fn delete_rewrite(&self, rewrite: &Rewrite) -> Result<()> {
        self.server.delete_call_count.fetch_add(1, Ordering::SeqCst);
        if self.server.fails(Failure::Delete) {
            return Err(Error::api(400, "delete failed"));
        }
        self.server.rewrites.lock().unwrap().retain(|r| r != rewrite);
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

/// Factory resolving server URLs to FakeServers
#[derive(Clone, Default)]
pub struct FakeFactory {
    servers: Arc<Mutex<HashMap<String, Arc<FakeServer>>>>,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_server(&self, url: &str, server: Arc<FakeServer>) {
        self.servers.lock().unwrap().insert(url.to_string(), server);
    }
}

impl RewriteApiFactory for FakeFactory {
    fn create(
        &self,
        server: &ServerConfig,
        _options: &ConnectionOptions,
    ) -> Result<Box<dyn RewriteApi>> {
        let fake = self
            .servers
            .lock()
            .unwrap()
            .get(&server.url)
            .cloned()
            .ok_or_else(|| Error::http(format!("no route to {}", server.url)))?;

        if fake.fails(Failure::Connect) {
            return Err(Error::http("connection refused"));
        }

        Ok(Box::new(FakeRewriteApi {
            url: server.url.clone(),
            server: fake,
        }))
    }
}

pub fn rw(domain: &str, answer: &str) -> Rewrite {
    Rewrite::new(domain, answer)
}

pub fn server(url: &str) -> ServerConfig {
    ServerConfig::new(url, "admin", "password")
}

/// Helper to create arguments for the given servers and rewrites
pub fn args_for(urls: &[&str], rewrites: Vec<Rewrite>) -> ModuleArgs {
    ModuleArgs::new(urls.iter().map(|url| server(url)).collect(), rewrites)
}
