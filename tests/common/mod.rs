#![allow(dead_code)] // each test binary uses a different slice of the harness

use std::sync::Arc;

use rust_decimal::Decimal;
use tableside::models::Product;
use tableside::services::{AuthSession, CartStore, CheckoutService, ConfirmationService};
use tableside::storage::{keys, InMemoryStorage, StorageBackend};
use tableside::{ApiClient, ClientConfig};
use wiremock::MockServer;

/// Helper harness wiring the client against a per-test wiremock backend,
/// with the retry schedules shortened so tests stay fast.
pub struct TestBackend {
    pub server: MockServer,
    pub storage: Arc<dyn StorageBackend>,
    pub client: Arc<ApiClient>,
}

impl TestBackend {
    /// Construct a harness with no stored session.
    pub async fn new() -> Self {
        Self::build(false).await
    }

    /// Construct a harness with a persisted bearer token, as if a previous
    /// session had signed in.
    pub async fn authenticated() -> Self {
        Self::build(true).await
    }

    async fn build(with_token: bool) -> Self {
        let server = MockServer::start().await;

        let mut config = ClientConfig::new(
            format!("{}/v1", server.uri()),
            "http://localhost:5173/confirmation",
        );
        config.order_fetch_delays_ms = vec![0, 20, 40, 60];
        config.session_retry_delay_ms = 10;

        let storage: Arc<dyn StorageBackend> = Arc::new(InMemoryStorage::new());
        if with_token {
            storage
                .set(keys::AUTH_TOKEN, "test-token")
                .await
                .expect("seed token");
        }

        let client = Arc::new(
            ApiClient::new(Arc::new(config), storage.clone())
                .await
                .expect("client construction"),
        );

        Self {
            server,
            storage,
            client,
        }
    }

    pub fn checkout(&self) -> CheckoutService {
        CheckoutService::new(self.client.clone(), self.storage.clone())
    }

    pub fn confirmation(&self) -> ConfirmationService {
        ConfirmationService::new(self.client.clone(), self.storage.clone())
    }

    pub fn session(&self) -> AuthSession {
        AuthSession::new(self.client.clone())
    }

    pub async fn cart(&self) -> CartStore {
        CartStore::load(self.storage.clone()).await
    }
}

/// Available product fixture with no addons.
#[allow(dead_code)]
pub fn product(id: &str, price: Decimal) -> Product {
    Product {
        id: id.into(),
        name: format!("product {}", id),
        description: String::new(),
        price,
        category: "غذای اصلی".into(),
        image_url: String::new(),
        available: true,
        station: None,
        addons: Vec::new(),
    }
}
