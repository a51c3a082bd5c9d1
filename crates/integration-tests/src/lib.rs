//! End-to-end test harness for Grocer.
//!
//! Starts a real storefront on an ephemeral port and hands out real cart
//! clients pointed at it, so tests exercise the full path: local store,
//! sync worker, HTTP adapter, session cookies, handlers and catalog.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p grocer-integration-tests
//! ```
//!
//! Nothing external is required; every test gets its own server.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use url::Url;

use grocer_cart::{
    AuthState, Cart, CartConfig, CartStorage, HttpCartApi, MemoryStorage, NewLineItem,
    RetryPolicy,
};
use grocer_core::{Price, ProductId, SessionToken, UserId, VariantId};
use grocer_storefront::catalog::Catalog;
use grocer_storefront::config::StorefrontConfig;
use grocer_storefront::state::AppState;

/// Catalog served by every test storefront.
pub const CATALOG: &str = r#"
products:
  - id: 100
    name: Fresh Paneer
    variants:
      - { id: 1, unit: g, amount: "200", price: 8000, stock: 25 }
      - { id: 2, unit: g, amount: "500", price: 18000, stock: 12 }
  - id: 110
    name: Toor Dal
    variants:
      - { id: 1, unit: kg, amount: "1", price: 16500, stock: 80 }
  - id: 200
    name: Alphonso Mango
    variants:
      - { id: 1, unit: pcs, amount: "6", price: 45000, stock: 0 }
"#;

/// 64 characters of mixed alphabet.
const SESSION_SECRET: &str = "V7nQ2xL9kR4tB8mZ1cW6hJ3pD0sF5gA2eU7iO4yM9bT6nX1zK3rL8jH0qC5vG2wE";

/// A running storefront.
pub struct TestContext {
    pub base_url: Url,
    pub state: AppState,
    server: tokio::task::JoinHandle<()>,
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.server.abort();
    }
}

impl TestContext {
    /// Start a storefront with development sign-in enabled.
    ///
    /// # Panics
    ///
    /// Panics if the server cannot be started.
    pub async fn start() -> Self {
        let config = StorefrontConfig {
            host: "127.0.0.1".parse().expect("valid IP"),
            port: 0,
            base_url: "http://localhost".to_string(),
            session_secret: SecretString::from(SESSION_SECRET),
            catalog_path: PathBuf::new(),
            dev_login: true,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        };
        let catalog = Catalog::from_yaml(CATALOG).expect("test catalog parses");
        let state = AppState::with_catalog(config, catalog).expect("state builds");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to address");
        let addr = listener.local_addr().expect("bound address");
        let app = grocer_storefront::rate_limited_app(state.clone());

        let server = tokio::spawn(async move {
            let _ = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await;
        });

        Self {
            base_url: Url::parse(&format!("http://{addr}/")).expect("valid URL"),
            state,
            server,
        }
    }

    /// Client configuration pointed at this server with short timers.
    #[must_use]
    pub fn config(&self) -> CartConfig {
        CartConfig::default()
            .with_api_url(self.base_url.clone())
            .with_debounce(Duration::from_millis(20))
            .with_retry(RetryPolicy {
                initial_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(50),
                max_retries: 2,
            })
    }

    /// Guest API client without a session.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn guest_api(&self) -> HttpCartApi {
        HttpCartApi::new(&self.config()).expect("HTTP client builds")
    }

    /// API client signed in as `user` through the development session route.
    ///
    /// # Panics
    ///
    /// Panics if sign-in fails.
    pub async fn signed_in_api(&self, user: UserId) -> HttpCartApi {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client");
        let response = client
            .post(self.url("dev/session"))
            .json(&serde_json::json!({ "userId": user }))
            .send()
            .await
            .expect("sign-in request");
        assert!(response.status().is_success(), "sign-in failed");
        HttpCartApi::with_client(client, self.base_url.clone())
    }

    /// Open a guest cart backed by fresh in-memory storage.
    pub fn guest_cart(&self) -> Cart<HttpCartApi> {
        self.open(self.guest_api(), Arc::new(MemoryStorage::new()))
    }

    /// Open a cart over `storage` and sign it in as `user`.
    ///
    /// # Panics
    ///
    /// Panics if the login round trip fails.
    pub async fn signed_in_cart(
        &self,
        user: UserId,
        storage: Arc<dyn CartStorage>,
    ) -> Cart<HttpCartApi> {
        let cart = self.open(self.signed_in_api(user).await, storage);
        cart.login(user).await.expect("login sync");
        cart
    }

    /// Open a cart as a guest over `storage`.
    pub fn open(&self, api: HttpCartApi, storage: Arc<dyn CartStorage>) -> Cart<HttpCartApi> {
        Cart::open(&self.config(), api, storage, AuthState::Guest)
    }

    /// Server snapshot of a guest cart, fetched without any session.
    ///
    /// # Panics
    ///
    /// Panics on a transport or decode error.
    pub async fn guest_snapshot(
        &self,
        token: SessionToken,
    ) -> grocer_core::api::CartSnapshotResponse {
        reqwest::get(self.url(&format!("api/cart/guest/{token}")))
            .await
            .expect("guest cart request")
            .json()
            .await
            .expect("guest cart body")
    }

    /// Absolute URL for `path`.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid relative URL.
    #[must_use]
    pub fn url(&self, path: &str) -> Url {
        self.base_url.join(path).expect("valid path")
    }
}

/// A line as a client would add it, with a deliberately wrong price.
#[must_use]
pub fn item(product: i32, variant: i32, quantity: u32) -> NewLineItem {
    NewLineItem {
        product_id: ProductId::new(product),
        variant_id: VariantId::new(variant),
        product_name: format!("Product {product}"),
        variant_unit: "pcs".to_string(),
        variant_amount: Decimal::ONE,
        price: Price::from_minor(1),
        quantity,
        image_url: None,
        max_stock: None,
    }
}
