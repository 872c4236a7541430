//! Integration tests for Shopfront.
//!
//! Every test spawns the real router on an ephemeral port, backed by a fresh
//! in-memory store, and talks to it over HTTP.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopfront-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `auth` - registration, login, bearer handling
//! - `impersonation` - admin acting as a customer and returning
//! - `orders` - checkout, stock reservation and the status lifecycle
//! - `admin` - catalog and principal management

#![allow(clippy::missing_panics_doc, clippy::must_use_candidate)]

use std::net::{Ipv4Addr, SocketAddr};

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::SecretString;
use serde_json::{Value, json};

use shopfront_core::{Email, Role};
use shopfront_server::config::{LogFormat, ServerConfig, StoreBackend, TokenConfig};
use shopfront_server::db::{MemoryStore, Store, UserRepository};
use shopfront_server::models::NewUser;
use shopfront_server::services::auth::password::hash_password;
use shopfront_server::{AppState, app};

/// Password used for every principal the helpers create.
pub const PASSWORD: &str = "correct horse battery";

const TEST_SECRET: &str = "integration-test-secret-at-least-32-bytes";

/// A running server plus direct access to its store.
pub struct TestApp {
    pub base_url: String,
    pub client: Client,
    pub store: MemoryStore,
}

/// Token and id of a signed-in principal.
#[derive(Debug, Clone)]
pub struct Login {
    pub token: String,
    pub user_id: String,
}

impl Login {
    fn from_session(body: &Value) -> Self {
        Self {
            token: body["token"].as_str().expect("token in session").to_owned(),
            user_id: body["user"]["id"].as_str().expect("user id").to_owned(),
        }
    }
}

fn test_config() -> ServerConfig {
    ServerConfig {
        store: StoreBackend::Memory,
        host: Ipv4Addr::LOCALHOST.into(),
        port: 0,
        tokens: TokenConfig {
            secret: SecretString::from(TEST_SECRET),
            issuer: "shopfront-test".to_owned(),
            ttl_secs: 3600,
        },
        log_format: LogFormat::Pretty,
        sentry_dsn: None,
        sentry_environment: None,
    }
}

impl TestApp {
    /// Start a server on a random local port.
    pub async fn spawn() -> Self {
        let store = MemoryStore::new();
        let state = AppState::new(test_config(), Store::Memory(store.clone()));

        let listener = tokio::net::TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local address");

        tokio::spawn(async move {
            axum::serve(listener, app(state))
                .await
                .expect("Test server error");
        });

        Self {
            base_url: format!("http://{addr}"),
            client: Client::new(),
            store,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn get(&self, path: &str, token: Option<&str>) -> RequestBuilder {
        with_token(self.client.get(self.url(path)), token)
    }

    pub fn post(&self, path: &str, token: Option<&str>) -> RequestBuilder {
        with_token(self.client.post(self.url(path)), token)
    }

    pub fn put(&self, path: &str, token: Option<&str>) -> RequestBuilder {
        with_token(self.client.put(self.url(path)), token)
    }

    pub fn delete(&self, path: &str, token: Option<&str>) -> RequestBuilder {
        with_token(self.client.delete(self.url(path)), token)
    }

    /// Register a customer through the public route.
    pub async fn register_customer(&self, email: &str) -> Login {
        let resp = self
            .post("/auth/register", None)
            .json(&json!({
                "firstName": "Test",
                "lastName": "Customer",
                "email": email,
                "password": PASSWORD,
            }))
            .send()
            .await
            .expect("register request");
        assert_eq!(resp.status(), StatusCode::CREATED);
        Login::from_session(&body(resp).await)
    }

    /// Create an admin directly in the store, then sign in over HTTP.
    pub async fn create_admin(&self, email: &str) -> Login {
        self.store
            .create_user(NewUser {
                first_name: "Test".to_owned(),
                last_name: "Admin".to_owned(),
                email: Email::parse(email).expect("valid admin email"),
                password_hash: hash_password(PASSWORD).expect("hash"),
                role: Role::Admin,
            })
            .await
            .expect("create admin");
        self.login(email, PASSWORD).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Login {
        let resp = self
            .post("/auth/login", None)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("login request");
        assert_eq!(resp.status(), StatusCode::OK);
        Login::from_session(&body(resp).await)
    }

    /// Create a product as `admin`; returns its id.
    pub async fn create_product(
        &self,
        admin: &Login,
        name: &str,
        price: &str,
        stock: u32,
    ) -> String {
        let resp = self
            .post("/admin/products", Some(&admin.token))
            .json(&json!({
                "name": name,
                "price": price,
                "stockQuantity": stock,
            }))
            .send()
            .await
            .expect("create product request");
        assert_eq!(resp.status(), StatusCode::CREATED);
        body(resp).await["id"]
            .as_str()
            .expect("product id")
            .to_owned()
    }

    pub async fn stock_of(&self, product_id: &str) -> u64 {
        let resp = self
            .get(&format!("/products/{product_id}"), None)
            .send()
            .await
            .expect("product request");
        assert_eq!(resp.status(), StatusCode::OK);
        body(resp).await["stockQuantity"]
            .as_u64()
            .expect("stock quantity")
    }

    /// Place an order for `lines` of `(product_id, quantity)`.
    pub async fn place_order(&self, customer: &Login, lines: &[(&str, u32)]) -> Response {
        let items: Vec<Value> = lines
            .iter()
            .map(|(product_id, quantity)| json!({ "productId": product_id, "quantity": quantity }))
            .collect();
        self.post("/orders", Some(&customer.token))
            .json(&json!({ "items": items, "shippingAddress": address() }))
            .send()
            .await
            .expect("place order request")
    }
}

fn with_token(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    }
}

/// A valid shipping address.
pub fn address() -> Value {
    json!({
        "street": "1 Main Street",
        "city": "Springfield",
        "postalCode": "12345",
        "country": "US",
    })
}

/// Read a JSON response body.
pub async fn body(resp: Response) -> Value {
    resp.json().await.expect("JSON response body")
}

/// Assert the flattened authentication failure.
pub async fn assert_not_authorized(resp: Response) {
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body(resp).await, json!({ "error": "Not authorized" }));
}
