use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::client::ApiClient;
use crate::models::{OrderRecord, VerifyPaymentRequest};
use crate::services::cart::CartStore;
use crate::storage::{keys, StorageBackend};

/// Payment state derived from the redirect, `Unknown` until proven otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Unknown,
    Success { ref_id: Option<String> },
    Failed,
}

/// Query parameters of the URL the user lands on after the payment gateway.
///
/// Parsed once on confirmation mount; drives a single reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentCallback {
    pub success: Option<bool>,
    pub order_id: Option<String>,
    pub authority: Option<String>,
    pub status: Option<String>,
    pub ref_id: Option<String>,
}

impl PaymentCallback {
    pub fn from_url(url: &Url) -> Self {
        let get = |key: &str| -> Option<String> {
            url.query_pairs()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.to_string())
        };
        Self {
            success: get("success").map(|v| v == "1"),
            order_id: get("orderId"),
            authority: get("Authority"),
            status: get("Status"),
            ref_id: get("refId"),
        }
    }

    /// Whether the URL carries any payment callback signal at all.
    pub fn is_payment_redirect(&self) -> bool {
        self.success.is_some() || (self.authority.is_some() && self.status.is_some())
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub outcome: PaymentOutcome,
    pub order: Option<OrderRecord>,
}

/// Reconciles the gateway redirect against the authoritative order record.
///
/// Three callback shapes exist: the backend's own redirect (`success` flag,
/// already verified server-side), a direct gateway redirect
/// (`Authority`/`Status`, needs a verify call), and a bare deep navigation
/// (no parameters, fall back to the stored last order id). The cart is
/// cleared exactly once, on confirmed success; payment is final at that
/// point and there is no compensating action.
pub struct ConfirmationService {
    client: Arc<ApiClient>,
    storage: Arc<dyn StorageBackend>,
}

impl ConfirmationService {
    pub fn new(client: Arc<ApiClient>, storage: Arc<dyn StorageBackend>) -> Self {
        Self { client, storage }
    }

    #[instrument(skip(self, callback, cart))]
    pub async fn reconcile(&self, callback: &PaymentCallback, cart: &mut CartStore) -> Resolution {
        // Backend redirect: the success flag is already server-verified.
        if let (Some(true), Some(order_id)) = (callback.success, callback.order_id.as_ref()) {
            info!("Payment confirmed by backend redirect for order {}", order_id);
            cart.clear().await;
            let order = self
                .fetch_best_effort(order_id, callback.ref_id.as_deref())
                .await;
            return Resolution {
                outcome: PaymentOutcome::Success {
                    ref_id: callback.ref_id.clone(),
                },
                order,
            };
        }

        if callback.success == Some(false) {
            let order = match callback.order_id.as_ref() {
                Some(order_id) => self.client.order_by_id(order_id).await.ok(),
                None => None,
            };
            return Resolution {
                outcome: PaymentOutcome::Failed,
                order,
            };
        }

        // Direct gateway redirect: not yet verified server-side.
        if let (Some(authority), Some(status), Some(order_id)) = (
            callback.authority.as_ref(),
            callback.status.as_ref(),
            callback.order_id.as_ref(),
        ) {
            if status != "OK" {
                let order = self
                    .fetch_best_effort(order_id, callback.ref_id.as_deref())
                    .await;
                return Resolution {
                    outcome: PaymentOutcome::Failed,
                    order,
                };
            }

            let request = VerifyPaymentRequest {
                authority: authority.clone(),
                status: status.clone(),
                order_id: order_id.clone(),
            };
            return match self.client.verify_payment(&request).await {
                Ok(response) => {
                    let outcome = if response.success {
                        cart.clear().await;
                        PaymentOutcome::Success {
                            ref_id: response.ref_id.clone(),
                        }
                    } else {
                        PaymentOutcome::Failed
                    };
                    let ref_id = response.ref_id.or_else(|| callback.ref_id.clone());
                    let order = self.fetch_best_effort(order_id, ref_id.as_deref()).await;
                    Resolution { outcome, order }
                }
                Err(err) => {
                    warn!("Payment verification error: {}", err);
                    Resolution {
                        outcome: PaymentOutcome::Failed,
                        order: None,
                    }
                }
            };
        }

        // Deep navigation: no payment parameters at all.
        let order_id = match callback.order_id.clone() {
            Some(order_id) => Some(order_id),
            None => self.last_order_id().await,
        };
        let order = match order_id {
            Some(order_id) => self.client.order_by_id(&order_id).await.ok(),
            None => None,
        };
        Resolution {
            outcome: PaymentOutcome::Unknown,
            order,
        }
    }

    /// Best-effort parallel order retrieval.
    ///
    /// The authenticated lookup retries on the configured delay schedule to
    /// ride out write-propagation lag; when a gateway reference id exists it
    /// races the public receipt lookup. First task to yield an order wins
    /// and the rest are aborted — a miss or error on one path never ends
    /// the race early.
    #[instrument(skip(self))]
    pub async fn fetch_best_effort(
        &self,
        order_id: &str,
        ref_id: Option<&str>,
    ) -> Option<OrderRecord> {
        let mut tasks: JoinSet<Option<OrderRecord>> = JoinSet::new();

        let client = Arc::clone(&self.client);
        let delays = client.config().order_fetch_delays_ms.clone();
        let id = order_id.to_string();
        tasks.spawn(async move {
            for delay in delays {
                if delay > 0 {
                    sleep(Duration::from_millis(delay)).await;
                }
                match client.order_by_id(&id).await {
                    Ok(order) => return Some(order),
                    Err(err) => debug!("Order lookup attempt failed: {}", err),
                }
            }
            None
        });

        if let Some(ref_id) = ref_id {
            let client = Arc::clone(&self.client);
            let id = order_id.to_string();
            let ref_id = ref_id.to_string();
            tasks.spawn(async move { client.public_receipt(&id, &ref_id).await.ok() });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(order)) => {
                    tasks.abort_all();
                    return Some(order);
                }
                Ok(None) => {}
                Err(err) => warn!("Order fetch task failed: {}", err),
            }
        }
        warn!("Order {} not found on any retrieval path", order_id);
        None
    }

    /// Manual retry affordance for the "order not found" state.
    pub async fn retry(&self, callback: &PaymentCallback) -> Option<OrderRecord> {
        let order_id = callback.order_id.as_deref()?;
        self.fetch_best_effort(order_id, callback.ref_id.as_deref())
            .await
    }

    pub async fn last_order_id(&self) -> Option<String> {
        self.storage.get(keys::LAST_ORDER_ID).await.ok().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_parses_backend_redirect() {
        let url = Url::parse("https://shop.example/confirmation?success=1&orderId=ord-1&refId=555")
            .unwrap();
        let callback = PaymentCallback::from_url(&url);
        assert_eq!(callback.success, Some(true));
        assert_eq!(callback.order_id.as_deref(), Some("ord-1"));
        assert_eq!(callback.ref_id.as_deref(), Some("555"));
        assert!(callback.is_payment_redirect());
    }

    #[test]
    fn callback_parses_gateway_redirect() {
        let url = Url::parse(
            "https://shop.example/confirmation?Authority=A000123&Status=OK&orderId=ord-2",
        )
        .unwrap();
        let callback = PaymentCallback::from_url(&url);
        assert_eq!(callback.success, None);
        assert_eq!(callback.authority.as_deref(), Some("A000123"));
        assert_eq!(callback.status.as_deref(), Some("OK"));
        assert!(callback.is_payment_redirect());
    }

    #[test]
    fn bare_navigation_is_not_a_payment_redirect() {
        let url = Url::parse("https://shop.example/confirmation").unwrap();
        let callback = PaymentCallback::from_url(&url);
        assert!(!callback.is_payment_redirect());

        // Authority without Status is not enough either
        let url = Url::parse("https://shop.example/confirmation?Authority=A1").unwrap();
        assert!(!PaymentCallback::from_url(&url).is_payment_redirect());
    }

    #[test]
    fn success_zero_means_failed() {
        let url = Url::parse("https://shop.example/confirmation?success=0&orderId=ord-3").unwrap();
        let callback = PaymentCallback::from_url(&url);
        assert_eq!(callback.success, Some(false));
    }
}
