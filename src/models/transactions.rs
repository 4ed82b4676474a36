use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_DEPOSIT: i64 = 10_000;
pub const MAX_DEPOSIT: i64 = 5_000_000;
pub const MIN_WITHDRAWAL: i64 = 50_000;
pub const MAX_WITHDRAWAL_VERIFIED: i64 = 5_000_000;
pub const MAX_WITHDRAWAL_UNVERIFIED: i64 = 1_000_000;
pub const MIN_DESTINATION_LEN: usize = 8;

pub const INSUFFICIENT_AT_PROCESSING: &str = "Saldo insuficiente al momento de procesar";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pendiente,
    Aprobado,
    Rechazado,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pendiente => "PENDIENTE",
            RequestStatus::Aprobado => "APROBADO",
            RequestStatus::Rechazado => "RECHAZADO",
        }
    }
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Deposit {
    pub id: String,
    pub user_id: String,
    pub amount: i64,
    pub method: String,
    pub reference: String,
    pub receipt_path: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct PendingDeposit {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub amount: i64,
    pub method: String,
    pub reference: String,
    pub receipt_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Withdrawal {
    pub id: String,
    pub user_id: String,
    pub amount: i64,
    pub fee: i64,
    pub total: i64,
    pub method: String,
    pub destination: String,
    pub reference: String,
    pub status: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct PendingWithdrawal {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub amount: i64,
    pub fee: i64,
    pub total: i64,
    pub method: String,
    pub destination: String,
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewDeposit {
    pub amount: i64,
    pub method: String,
    /// Stored path of the uploaded receipt.
    pub receipt_path: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewWithdrawal {
    pub amount: i64,
    pub method: String,
    pub destination: String,
    pub fee: Option<i64>,
    pub total: Option<i64>,
}

/// Outcome of an admin decision on a withdrawal.
#[derive(Clone, Debug, Serialize)]
pub struct WithdrawalDecision {
    pub withdrawal: Withdrawal,
    pub balance: Option<i64>,
}

pub fn validate_deposit(amount: i64, verified: bool, has_receipt: bool) -> Result<(), String> {
    if !(MIN_DEPOSIT..=MAX_DEPOSIT).contains(&amount) {
        return Err(format!(
            "Deposit amount must be between {} and {}",
            MIN_DEPOSIT, MAX_DEPOSIT
        ));
    }
    if !verified && !has_receipt {
        return Err("Unverified users must attach a payment receipt".to_string());
    }
    Ok(())
}

impl NewWithdrawal {
    pub fn validate(&self, balance: i64, verified: bool) -> Result<(), String> {
        let max = if verified {
            MAX_WITHDRAWAL_VERIFIED
        } else {
            MAX_WITHDRAWAL_UNVERIFIED
        };
        if self.amount < MIN_WITHDRAWAL {
            return Err(format!("Minimum withdrawal is {}", MIN_WITHDRAWAL));
        }
        if self.amount > max {
            return Err(format!("Maximum withdrawal is {}", max));
        }
        if self.amount > balance {
            return Err("Insufficient balance".to_string());
        }
        if self.destination.trim().chars().count() < MIN_DESTINATION_LEN {
            return Err(format!(
                "Destination must be at least {} characters",
                MIN_DESTINATION_LEN
            ));
        }
        if self.fee.is_some_and(|fee| fee < 0) {
            return Err("Fee cannot be negative".to_string());
        }
        Ok(())
    }

    pub fn fee(&self) -> i64 {
        self.fee.unwrap_or(0)
    }

    pub fn total(&self) -> i64 {
        self.total.unwrap_or(self.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn withdrawal(amount: i64, destination: &str) -> NewWithdrawal {
        NewWithdrawal {
            amount,
            method: "nequi".to_string(),
            destination: destination.to_string(),
            fee: None,
            total: None,
        }
    }

    #[test]
    fn test_deposit_validation() {
        assert!(validate_deposit(10_000, true, false).is_ok());
        assert!(validate_deposit(9_999, true, false).is_err());
        assert!(validate_deposit(5_000_001, true, true).is_err());
        assert!(validate_deposit(20_000, false, false).is_err());
        assert!(validate_deposit(20_000, false, true).is_ok());
    }

    #[test]
    fn test_withdrawal_limits() {
        let balance = 10_000_000;
        assert!(withdrawal(50_000, "3001234567").validate(balance, false).is_ok());
        assert!(withdrawal(49_999, "3001234567").validate(balance, true).is_err());
        assert!(withdrawal(2_000_000, "3001234567").validate(balance, false).is_err());
        assert!(withdrawal(2_000_000, "3001234567").validate(balance, true).is_ok());
        assert!(withdrawal(60_000, "3001234567").validate(59_999, true).is_err());
        assert!(withdrawal(60_000, "  1234567  ").validate(balance, true).is_err());
    }

    #[test]
    fn test_withdrawal_defaults() {
        let w = withdrawal(80_000, "3001234567");
        assert_eq!(w.fee(), 0);
        assert_eq!(w.total(), 80_000);
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(RequestStatus::Pendiente.as_str(), "PENDIENTE");
        assert_eq!(
            serde_json::to_value(RequestStatus::Rechazado).unwrap(),
            serde_json::json!("RECHAZADO")
        );
    }
}
