//! DSN parsing and the (out-of-scope-but-consumed) project directory.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

/// A resolved project, as handed back by a `ProjectStore` lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: u32,
    pub name: String,
    pub token: String,
}

/// `scheme://token@host:port/project-id`, per spec §6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dsn {
    pub token: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DsnError {
    #[error("invalid dsn: {0}")]
    Parse(String),
    #[error("dsn token is empty")]
    EmptyToken,
}

impl Dsn {
    pub fn parse(raw: &str) -> Result<Dsn, DsnError> {
        let url = url::Url::parse(raw).map_err(|e| DsnError::Parse(e.to_string()))?;
        let token = url.username();
        if token.is_empty() {
            return Err(DsnError::EmptyToken);
        }
        Ok(Dsn { token: token.to_string() })
    }
}

/// Read-only, concurrent-safe project directory, consumed but not owned by
/// the core (spec §6's `ProjectStore` interface).
pub trait ProjectStore: Send + Sync {
    fn find_by_token(&self, token: &str) -> Option<Arc<Project>>;
}

/// An in-memory stand-in for the real project directory lookup, built once
/// at startup and never mutated afterwards.
pub struct StaticProjectStore {
    by_token: HashMap<String, Arc<Project>>,
}

impl StaticProjectStore {
    pub fn new(projects: Vec<Project>) -> Self {
        let by_token = projects
            .into_iter()
            .map(|p| (p.token.clone(), Arc::new(p)))
            .collect();
        Self { by_token }
    }
}

impl ProjectStore for StaticProjectStore {
    fn find_by_token(&self, token: &str) -> Option<Arc<Project>> {
        self.by_token.get(token).cloned()
    }
}
