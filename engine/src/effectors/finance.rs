//! FINANCE_SWEEP: move money to the configured destination account
//!
//! Uses a Stripe-style transfers endpoint: form-encoded POST to
//! `{base_url}/v1/transfers` with the amount in minor units.

use super::{Effector, EffectorError};
use crate::config::PaymentsConfig;
use crate::secrets::{self, SecretSource};
use async_trait::async_trait;
use sdk::types::Action;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

const SERVICE: &str = "payment";

#[derive(Debug, Deserialize)]
struct TransferResponse {
    id: String,
}

pub struct FinanceSweep {
    config: PaymentsConfig,
    secrets: Arc<dyn SecretSource>,
    client: reqwest::Client,
}

impl FinanceSweep {
    pub fn new(
        config: PaymentsConfig,
        secrets: Arc<dyn SecretSource>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            config,
            secrets,
            client,
        }
    }

    /// Amount requested by the action, or the configured default when the
    /// value is empty, unparseable or not positive. Accepts a leading `$` and
    /// thousands separators.
    fn amount_for(&self, action: &Action) -> f64 {
        let cleaned: String = action
            .value
            .trim()
            .trim_start_matches('$')
            .chars()
            .filter(|c| *c != ',')
            .collect();

        match cleaned.parse::<f64>() {
            Ok(amount) if amount.is_finite() && amount > 0.0 => amount,
            _ => {
                debug!(
                    "No usable sweep amount in '{}', using default {}",
                    action.value, self.config.default_amount
                );
                self.config.default_amount
            }
        }
    }
}

#[async_trait]
impl Effector for FinanceSweep {
    fn name(&self) -> &str {
        "finance_sweep"
    }

    async fn apply(&self, action: &Action) -> Result<String, EffectorError> {
        let api_key = self
            .secrets
            .get_secret(secrets::PAYMENT_API_KEY)
            .ok_or_else(|| EffectorError::NotConfigured(secrets::PAYMENT_API_KEY.to_string()))?;

        let amount = self.amount_for(action);
        let minor_units = (amount * 100.0).round() as i64;
        let url = format!("{}/v1/transfers", self.config.base_url.trim_end_matches('/'));

        let mut form = vec![
            ("amount", minor_units.to_string()),
            ("currency", self.config.currency.clone()),
            ("destination", self.config.destination.clone()),
        ];
        if let Some(description) = &action.description {
            form.push(("description", description.clone()));
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key.expose())
            .form(&form)
            .send()
            .await
            .map_err(|e| EffectorError::network(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EffectorError::Api {
                service: SERVICE,
                status: status.as_u16(),
                body: secrets::scrub(&body),
            });
        }

        let transfer: TransferResponse =
            response.json().await.map_err(|e| EffectorError::Network {
                service: SERVICE,
                message: format!("unexpected transfer response: {}", e),
            })?;

        info!("Swept {:.2} {} as transfer {}", amount, self.config.currency, transfer.id);
        Ok(format!(
            "Transferred {:.2} {} (transfer {})",
            amount, self.config.currency, transfer.id
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::MemorySecrets;
    use sdk::types::ActionType;

    fn sweep() -> FinanceSweep {
        FinanceSweep::new(
            PaymentsConfig {
                base_url: "https://payments.example".to_string(),
                currency: "usd".to_string(),
                default_amount: 100.0,
                destination: "savings".to_string(),
                timeout_secs: 15,
            },
            Arc::new(MemorySecrets::new()),
            reqwest::Client::new(),
        )
    }

    #[test]
    fn test_amount_parsing() {
        let sweep = sweep();
        let amount = |v: &str| sweep.amount_for(&Action::new(ActionType::FinanceSweep, v));

        assert_eq!(amount("250"), 250.0);
        assert_eq!(amount("$1,200.50"), 1200.5);
        assert_eq!(amount(""), 100.0);
        assert_eq!(amount("all of it"), 100.0);
        assert_eq!(amount("-5"), 100.0);
    }

    #[tokio::test]
    async fn test_missing_key() {
        let err = sweep()
            .apply(&Action::new(ActionType::FinanceSweep, "10"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "PAYMENT_API_KEY is not configured");
    }
}
