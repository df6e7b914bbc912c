//! Stripe Checkout client — the single point of entry for payment-provider
//! API calls. Creates hosted checkout sessions; credits are only granted
//! later, when the completion webhook arrives.

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::credits::CreditPackageRow;

const STRIPE_API_URL: &str = "https://api.stripe.com/v1/checkout/sessions";
const STRIPE_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Thin client over Stripe's form-encoded checkout-session endpoint.
#[derive(Clone)]
pub struct CheckoutClient {
    client: Client,
    secret_key: String,
    success_url: String,
    cancel_url: String,
}

impl CheckoutClient {
    pub fn new(secret_key: String, success_url: String, cancel_url: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(STRIPE_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            secret_key,
            success_url,
            cancel_url,
        }
    }

    /// Creates a checkout session for `quantity` units of a package.
    ///
    /// `user_id` and the total credit amount ride in session metadata; the
    /// webhook handler reads them back when the provider confirms payment.
    pub async fn create_session(
        &self,
        user_id: Uuid,
        package: &CreditPackageRow,
        quantity: i32,
    ) -> Result<CheckoutSession, AppError> {
        let total_credits = package.credits * quantity;
        let quantity_str = quantity.to_string();
        let user_id_str = user_id.to_string();
        let credits_str = total_credits.to_string();

        let form: Vec<(&str, &str)> = vec![
            ("mode", "payment"),
            ("line_items[0][price]", &package.stripe_price_id),
            ("line_items[0][quantity]", &quantity_str),
            ("success_url", &self.success_url),
            ("cancel_url", &self.cancel_url),
            ("metadata[user_id]", &user_id_str),
            ("metadata[credits]", &credits_str),
        ];

        let response = self
            .client
            .post(STRIPE_API_URL)
            .basic_auth(&self.secret_key, Option::<&str>::None)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Stripe request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "Stripe returned {status}: {body}"
            )));
        }

        let session: CheckoutSession = response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Stripe response parse failed: {e}")))?;

        debug!("Created checkout session {} for user {user_id}", session.id);
        Ok(session)
    }
}
