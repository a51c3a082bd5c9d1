//! Application state shared across handlers.

use std::sync::Arc;

use secrecy::ExposeSecret;
use tower_sessions::cookie::Key;

use crate::carts::CartRepository;
use crate::catalog::{Catalog, CatalogError};
use crate::config::StorefrontConfig;
use crate::users::UserDirectory;

/// Error creating application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("invalid session key: {0}")]
    SessionKey(String),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// catalog, the cart repository and the user directory.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    catalog: Catalog,
    carts: CartRepository,
    users: UserDirectory,
    session_key: Key,
}

impl AppState {
    /// Load the catalog named in `config` and build the state.
    ///
    /// # Errors
    ///
    /// Returns `StateError` if the catalog cannot be loaded or the session
    /// secret is too short to sign cookies.
    pub fn new(config: StorefrontConfig) -> Result<Self, StateError> {
        let catalog = Catalog::load(&config.catalog_path)?;
        Self::with_catalog(config, catalog)
    }

    /// Build the state around an already loaded catalog.
    ///
    /// # Errors
    ///
    /// Returns `StateError::SessionKey` if the session secret is too short.
    pub fn with_catalog(config: StorefrontConfig, catalog: Catalog) -> Result<Self, StateError> {
        let session_key = Key::try_from(config.session_secret.expose_secret().as_bytes())
            .map_err(|e| StateError::SessionKey(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                catalog,
                carts: CartRepository::default(),
                users: UserDirectory::new(),
                session_key,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    #[must_use]
    pub fn carts(&self) -> &CartRepository {
        &self.inner.carts
    }

    /// Accounts recognised for authenticated cart access.
    #[must_use]
    pub fn users(&self) -> &UserDirectory {
        &self.inner.users
    }

    /// Key used to sign session cookies.
    #[must_use]
    pub fn session_key(&self) -> &Key {
        &self.inner.session_key
    }
}
