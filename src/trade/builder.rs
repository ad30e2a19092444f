use alloy_primitives::Address;
use serde::Serialize;

use crate::common::error::EscrowError;

/// Seller inputs for creating a new trade, posted verbatim to the backend.
#[derive(Clone, Debug, Serialize)]
pub struct CreateTradeRequest {
    pub seller_wallet: Address,
    pub usdc_amount: f64,
    pub total_krw: f64,
    pub bank_name: String,
    pub bank_account: String,
}

pub struct CreateTradeBuilder {
    seller_wallet: Option<Address>,
    usdc_amount: Option<f64>,
    total_krw: Option<f64>,
    bank_name: Option<String>,
    bank_account: Option<String>,
}

impl CreateTradeBuilder {
    pub fn new() -> Self {
        CreateTradeBuilder {
            seller_wallet: None,
            usdc_amount: None,
            total_krw: None,
            bank_name: None,
            bank_account: None,
        }
    }

    pub fn seller_wallet(&mut self, seller_wallet: Address) -> &mut Self {
        self.seller_wallet = Some(seller_wallet);
        self
    }

    pub fn usdc_amount(&mut self, usdc_amount: f64) -> &mut Self {
        self.usdc_amount = Some(usdc_amount);
        self
    }

    pub fn total_krw(&mut self, total_krw: f64) -> &mut Self {
        self.total_krw = Some(total_krw);
        self
    }

    pub fn bank_name(&mut self, bank_name: impl Into<String>) -> &mut Self {
        self.bank_name = Some(bank_name.into());
        self
    }

    pub fn bank_account(&mut self, bank_account: impl Into<String>) -> &mut Self {
        self.bank_account = Some(bank_account.into());
        self
    }

    pub fn build(&self) -> Result<CreateTradeRequest, EscrowError> {
        let Some(seller_wallet) = self.seller_wallet else {
            return Err(EscrowError::Validation("No seller wallet".to_string()));
        };

        let Some(usdc_amount) = self.usdc_amount else {
            return Err(EscrowError::Validation("No USDC amount".to_string()));
        };
        if !usdc_amount.is_finite() || usdc_amount <= 0.0 {
            return Err(EscrowError::Validation(format!(
                "USDC amount must be positive, got {}",
                usdc_amount
            )));
        }

        let Some(total_krw) = self.total_krw else {
            return Err(EscrowError::Validation("No KRW total".to_string()));
        };
        if !total_krw.is_finite() || total_krw <= 0.0 {
            return Err(EscrowError::Validation(format!(
                "KRW total must be positive, got {}",
                total_krw
            )));
        }

        let Some(bank_name) = self.bank_name.as_ref().filter(|n| !n.trim().is_empty()) else {
            return Err(EscrowError::Validation("No bank name".to_string()));
        };

        let Some(bank_account) = self
            .bank_account
            .as_ref()
            .filter(|a| !a.trim().is_empty())
        else {
            return Err(EscrowError::Validation("No bank account".to_string()));
        };

        Ok(CreateTradeRequest {
            seller_wallet,
            usdc_amount,
            total_krw,
            bank_name: bank_name.to_owned(),
            bank_account: bank_account.to_owned(),
        })
    }
}

impl Default for CreateTradeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
