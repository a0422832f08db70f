//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::adapters::FsBlobStore;
use crate::config::Config;
use skilldeck_core::ports::{PasswordHashService, Store};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
///
/// The blob store is held as its concrete type: the public download route
/// needs `verify_download`, which is not part of the port.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub hasher: Arc<dyn PasswordHashService>,
    pub blob: Arc<FsBlobStore>,
    pub config: Arc<Config>,
}
