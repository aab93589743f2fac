pub mod aggregator;
pub mod auth;
pub mod config;
pub mod handlers;
pub mod models;
pub mod resolver;
pub mod store;

use std::sync::Arc;

use config::AuthConfig;
use store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub auth: AuthConfig,
}
