//! Curator
//!
//! Release name parsing, quality profile scoring and naming templates for a
//! media library, plus the HTTP surface configuration tooling talks to.

pub mod api;
pub mod config;
pub mod error;
pub mod services;

use std::sync::Arc;

use crate::config::{Config, ConfigStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<ConfigStore>,
}

impl AppState {
    pub fn new(config: Config, store: ConfigStore) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
        }
    }
}
