//! Payment gateway capability.
//!
//! Every gateway offers the same three calls. The one in use is picked by
//! name from configuration. Settlement stays with the gateway.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    config::PaymentsConfig,
    error::{AppError, AppResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    PartiallyRefunded,
    Refunded,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentRequest {
    pub booking_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    /// Gateway reference
    pub id: String,
    pub booking_id: Uuid,
    pub amount: Decimal,
    #[serde(default)]
    pub refunded: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    /// Where the customer completes payment, if the gateway has such a page
    pub redirect_url: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create(&self, request: PaymentRequest) -> AppResult<Payment>;

    async fn verify(&self, payment_id: &str) -> AppResult<Payment>;

    async fn refund(&self, payment_id: &str, amount: Decimal) -> AppResult<Payment>;
}

fn validate_amount(amount: Decimal) -> AppResult<()> {
    if amount <= Decimal::ZERO {
        return Err(AppError::Validation(format!("Amount must be positive, got {}", amount)));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Manual (pay at the venue)
// ---------------------------------------------------------------------------

/// Payments collected in person; the ledger lives in process
#[derive(Clone, Default)]
pub struct ManualGateway {
    ledger: Arc<Mutex<HashMap<String, Payment>>>,
}

impl ManualGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn ledger(&self) -> AppResult<std::sync::MutexGuard<'_, HashMap<String, Payment>>> {
        self.ledger
            .lock()
            .map_err(|_| AppError::Internal("payment ledger poisoned".to_string()))
    }

    /// Record that the customer paid at the venue
    pub fn mark_paid(&self, payment_id: &str) -> AppResult<Payment> {
        let mut ledger = self.ledger()?;
        let payment = ledger
            .get_mut(payment_id)
            .ok_or_else(|| AppError::NotFound(format!("Payment {} not found", payment_id)))?;
        if payment.status != PaymentStatus::Pending {
            return Err(AppError::Validation(format!(
                "Payment {} is not pending",
                payment_id
            )));
        }
        payment.status = PaymentStatus::Paid;
        Ok(payment.clone())
    }
}

#[async_trait]
impl PaymentGateway for ManualGateway {
    fn name(&self) -> &'static str {
        "manual"
    }

    async fn create(&self, request: PaymentRequest) -> AppResult<Payment> {
        validate_amount(request.amount)?;
        let payment = Payment {
            id: format!("manual-{}", Uuid::new_v4().simple()),
            booking_id: request.booking_id,
            amount: request.amount,
            refunded: Decimal::ZERO,
            currency: request.currency,
            status: PaymentStatus::Pending,
            redirect_url: None,
        };
        self.ledger()?.insert(payment.id.clone(), payment.clone());
        tracing::info!(
            "Manual payment {} of {} {} opened for booking {}",
            payment.id,
            payment.amount,
            payment.currency,
            payment.booking_id
        );
        Ok(payment)
    }

    async fn verify(&self, payment_id: &str) -> AppResult<Payment> {
        self.ledger()?
            .get(payment_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Payment {} not found", payment_id)))
    }

    async fn refund(&self, payment_id: &str, amount: Decimal) -> AppResult<Payment> {
        validate_amount(amount)?;
        let mut ledger = self.ledger()?;
        let payment = ledger
            .get_mut(payment_id)
            .ok_or_else(|| AppError::NotFound(format!("Payment {} not found", payment_id)))?;
        if !matches!(payment.status, PaymentStatus::Paid | PaymentStatus::PartiallyRefunded) {
            return Err(AppError::Validation(format!(
                "Payment {} has nothing to refund",
                payment_id
            )));
        }
        let remaining = payment.amount - payment.refunded;
        if amount > remaining {
            return Err(AppError::Validation(format!(
                "Refund of {} exceeds the remaining {}",
                amount, remaining
            )));
        }
        payment.refunded += amount;
        payment.status = if payment.refunded == payment.amount {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::PartiallyRefunded
        };
        Ok(payment.clone())
    }
}

// ---------------------------------------------------------------------------
// Generic REST gateway
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RefundBody {
    amount: Decimal,
}

/// Gateway reached over a REST API with a bearer key
#[derive(Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpGateway {
    pub fn new(base_url: String, api_key: Option<String>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build payment client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> AppResult<Payment> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Payment gateway unreachable: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound("Payment not found at gateway".to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Payment gateway answered {}: {}", status, body);
            return Err(AppError::Internal(format!("Payment gateway error {}", status)));
        }
        response
            .json::<Payment>()
            .await
            .map_err(|e| AppError::Internal(format!("Invalid payment gateway response: {}", e)))
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn create(&self, request: PaymentRequest) -> AppResult<Payment> {
        validate_amount(request.amount)?;
        let url = format!("{}/payments", self.base_url);
        self.send(self.client.post(url).json(&request)).await
    }

    async fn verify(&self, payment_id: &str) -> AppResult<Payment> {
        let url = format!("{}/payments/{}", self.base_url, payment_id);
        self.send(self.client.get(url)).await
    }

    async fn refund(&self, payment_id: &str, amount: Decimal) -> AppResult<Payment> {
        validate_amount(amount)?;
        let url = format!("{}/payments/{}/refunds", self.base_url, payment_id);
        self.send(self.client.post(url).json(&RefundBody { amount })).await
    }
}

/// Select the gateway named in configuration
pub fn gateway_from_config(config: &PaymentsConfig) -> AppResult<Arc<dyn PaymentGateway>> {
    match config.gateway.as_str() {
        "manual" => Ok(Arc::new(ManualGateway::new())),
        "http" => {
            let base_url = config.http_base_url.clone().ok_or_else(|| {
                AppError::Validation("payments.http_base_url is required for the http gateway".to_string())
            })?;
            Ok(Arc::new(HttpGateway::new(base_url, config.http_api_key.clone())?))
        }
        other => Err(AppError::Validation(format!("Unknown payment gateway '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::FromPrimitive;

    fn request(amount: i64) -> PaymentRequest {
        PaymentRequest {
            booking_id: Uuid::new_v4(),
            amount: Decimal::from_i64(amount).unwrap(),
            currency: "IRR".into(),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_manual_payment_flow() {
        let gateway = ManualGateway::new();
        let payment = gateway.create(request(1_500_000)).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(gateway.refund(&payment.id, Decimal::ONE).await.is_err());

        gateway.mark_paid(&payment.id).unwrap();
        let partial = gateway
            .refund(&payment.id, Decimal::from(500_000))
            .await
            .unwrap();
        assert_eq!(partial.status, PaymentStatus::PartiallyRefunded);
        assert!(gateway
            .refund(&payment.id, Decimal::from(2_000_000))
            .await
            .is_err());
        let full = gateway
            .refund(&payment.id, Decimal::from(1_000_000))
            .await
            .unwrap();
        assert_eq!(full.status, PaymentStatus::Refunded);
        assert_eq!(gateway.verify(&payment.id).await.unwrap(), full);
    }

    #[tokio::test]
    async fn test_non_positive_amount_rejected() {
        let gateway = ManualGateway::new();
        assert!(matches!(
            gateway.create(request(0)).await,
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_gateway_selected_by_name() {
        let mut config = PaymentsConfig::default();
        assert_eq!(gateway_from_config(&config).unwrap().name(), "manual");

        config.gateway = "http".into();
        assert!(gateway_from_config(&config).is_err());
        config.http_base_url = Some("https://pay.example.test/api/".into());
        assert_eq!(gateway_from_config(&config).unwrap().name(), "http");

        config.gateway = "carrier-pigeon".into();
        assert!(gateway_from_config(&config).is_err());
    }
}
