//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::db::Store;
use crate::services::auth::{AuthService, TokenService};
use crate::services::catalog::CatalogService;
use crate::services::customers::CustomerService;
use crate::services::guard::AccessGuard;
use crate::services::impersonation::ImpersonationManager;
use crate::services::orders::OrderService;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Services are built per request from the
/// store and token service held here.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    store: Store,
    tokens: TokenService,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: ServerConfig, store: Store) -> Self {
        let tokens = TokenService::new(&config.tokens);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                tokens,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    #[must_use]
    pub fn guard(&self) -> AccessGuard<'_, Store> {
        AccessGuard::new(self.tokens(), self.store())
    }

    #[must_use]
    pub fn auth(&self) -> AuthService<'_, Store> {
        AuthService::new(self.store(), self.tokens())
    }

    #[must_use]
    pub fn impersonation(&self) -> ImpersonationManager<'_, Store> {
        ImpersonationManager::new(self.tokens(), self.store())
    }

    #[must_use]
    pub fn orders(&self) -> OrderService<'_, Store> {
        OrderService::new(self.store())
    }

    #[must_use]
    pub fn catalog(&self) -> CatalogService<'_, Store> {
        CatalogService::new(self.store())
    }

    #[must_use]
    pub fn customers(&self) -> CustomerService<'_, Store> {
        CustomerService::new(self.store())
    }
}
