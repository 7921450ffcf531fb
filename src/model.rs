use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Daily yield, in IDR, of a wallet running at hashrate 1.0.
pub const BASE_MINING_RATE: f64 = 0.5;
pub const SECONDS_PER_DAY: f64 = 86_400.0;

pub const DEFAULT_BALANCE: f64 = 1.0;
pub const DEFAULT_HASHRATE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            name: name.into(),
            extra: Map::new(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum WalletError {
    #[error("insufficient balance: need {needed:.4}, have {available:.4}")]
    InsufficientBalance { needed: f64, available: f64 },
    #[error("invalid amount: {0}")]
    InvalidAmount(f64),
}

// Only `accrue` and `claim` move the accumulator and the claim time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    pub balance: f64,
    pub hashrate: f64,
    /// Epoch milliseconds of the most recent claim.
    last_claim_time: i64,
    accumulated_mined: f64,
}

impl WalletState {
    pub fn new(balance: f64, hashrate: f64, last_claim_time: i64) -> Self {
        Self {
            balance,
            hashrate,
            last_claim_time,
            accumulated_mined: 0.0,
        }
    }

    pub fn default_at(now_ms: i64) -> Self {
        Self::new(DEFAULT_BALANCE, DEFAULT_HASHRATE, now_ms)
    }

    pub fn accumulated_mined(&self) -> f64 {
        self.accumulated_mined
    }

    pub fn last_claim_time(&self) -> i64 {
        self.last_claim_time
    }

    pub fn rate_per_tick(&self) -> f64 {
        (self.hashrate * BASE_MINING_RATE) / SECONDS_PER_DAY
    }

    pub fn daily_yield(&self) -> f64 {
        self.hashrate * BASE_MINING_RATE
    }

    pub fn accrue(&mut self) {
        self.accumulated_mined += self.rate_per_tick();
    }

    pub fn claim(&mut self, now_ms: i64) -> f64 {
        let amount = self.accumulated_mined;
        self.balance += amount;
        self.accumulated_mined = 0.0;
        self.last_claim_time = now_ms;
        amount
    }

    pub fn spend(&mut self, amount: f64) -> Result<(), WalletError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(WalletError::InvalidAmount(amount));
        }
        if self.balance + 1e-9 < amount {
            return Err(WalletError::InsufficientBalance {
                needed: amount,
                available: self.balance,
            });
        }
        self.balance = (self.balance - amount).max(0.0);
        Ok(())
    }

    pub fn credit(&mut self, amount: f64) -> Result<(), WalletError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(WalletError::InvalidAmount(amount));
        }
        self.balance += amount;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.balance.is_finite() || self.balance < 0.0 {
            return Err(format!("balance out of range: {}", self.balance));
        }
        if !self.hashrate.is_finite() || self.hashrate <= 0.0 {
            return Err(format!("hashrate out of range: {}", self.hashrate));
        }
        if !self.accumulated_mined.is_finite() || self.accumulated_mined < 0.0 {
            return Err(format!(
                "accumulated amount out of range: {}",
                self.accumulated_mined
            ));
        }
        Ok(())
    }
}
