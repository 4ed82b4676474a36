//! Fixed-rate investments. Interest is never stored: it is worked out from
//! the accrual start on every read, one whole elapsed day at a time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_PRINCIPAL: i64 = 50_000;
pub const MAX_PRINCIPAL: i64 = 5_000_000;
pub const ANNUAL_RATE_PERCENT: i64 = 300;
pub const INTEREST_PERIOD_DAYS: i64 = 30;
pub const CAPITAL_LOCK_DAYS: i64 = 180;

pub const KIND_INTEREST: &str = "intereses";
pub const KIND_CAPITAL: &str = "capital";

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Investment {
    pub id: String,
    pub user_id: String,
    pub principal: i64,
    pub annual_rate_percent: i64,
    pub deposited_at: DateTime<Utc>,
    pub accrual_started_at: DateTime<Utc>,
    pub next_interest_at: DateTime<Utc>,
    pub capital_unlocks_at: DateTime<Utc>,
    pub active: bool,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct InvestmentWithdrawal {
    pub id: String,
    pub investment_id: String,
    pub user_id: String,
    pub amount: i64,
    pub kind: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewInvestment {
    pub amount: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct InvestmentStatus {
    pub id: String,
    pub principal: i64,
    pub annual_rate_percent: i64,
    pub deposited_at: DateTime<Utc>,
    pub days_accrued: i64,
    pub accrued_interest: i64,
    pub next_interest_at: DateTime<Utc>,
    pub capital_unlocks_at: DateTime<Utc>,
    pub interest_available: bool,
    pub capital_available: bool,
    pub days_to_interest: i64,
    pub days_to_capital: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct Portfolio {
    pub investments: Vec<InvestmentStatus>,
    pub total_invested: i64,
    pub total_accrued: i64,
    pub total: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct InvestmentHistory {
    #[serde(flatten)]
    pub investment: Investment,
    pub withdrawals: Vec<InvestmentWithdrawal>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Payout {
    pub investment_id: String,
    pub kind: &'static str,
    pub amount: i64,
    pub balance: i64,
}

pub fn validate_principal(amount: i64, balance: i64) -> Result<(), String> {
    if !(MIN_PRINCIPAL..=MAX_PRINCIPAL).contains(&amount) {
        return Err(format!(
            "Investment must be between {} and {}",
            MIN_PRINCIPAL, MAX_PRINCIPAL
        ));
    }
    if amount > balance {
        return Err("Insufficient balance".to_string());
    }
    Ok(())
}

/// Whole 24-hour periods elapsed between `from` and `now`.
pub fn days_between(from: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - from).num_days().max(0)
}

pub fn interest_for_days(principal: i64, annual_rate_percent: i64, days: i64) -> i64 {
    principal * annual_rate_percent * days / 36_500
}

fn days_until(target: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let remaining = target - now;
    if remaining <= Duration::zero() {
        0
    } else {
        // Partial days count as a full one.
        (remaining.num_seconds() + 86_399) / 86_400
    }
}

impl Investment {
    pub fn accrued_interest(&self, now: DateTime<Utc>) -> i64 {
        let days = days_between(self.accrual_started_at, now);
        interest_for_days(self.principal, self.annual_rate_percent, days)
    }

    pub fn status(&self, now: DateTime<Utc>) -> InvestmentStatus {
        let accrued = self.accrued_interest(now);
        InvestmentStatus {
            id: self.id.clone(),
            principal: self.principal,
            annual_rate_percent: self.annual_rate_percent,
            deposited_at: self.deposited_at,
            days_accrued: days_between(self.accrual_started_at, now),
            accrued_interest: accrued,
            next_interest_at: self.next_interest_at,
            capital_unlocks_at: self.capital_unlocks_at,
            interest_available: now >= self.next_interest_at && accrued > 0,
            capital_available: now >= self.capital_unlocks_at,
            days_to_interest: days_until(self.next_interest_at, now),
            days_to_capital: days_until(self.capital_unlocks_at, now),
        }
    }
}

pub fn portfolio(investments: &[Investment], now: DateTime<Utc>) -> Portfolio {
    let investments: Vec<InvestmentStatus> =
        investments.iter().map(|i| i.status(now)).collect();
    let total_invested = investments.iter().map(|i| i.principal).sum();
    let total_accrued = investments.iter().map(|i| i.accrued_interest).sum();

    Portfolio {
        investments,
        total_invested,
        total_accrued,
        total: total_invested + total_accrued,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn investment(start: DateTime<Utc>) -> Investment {
        Investment {
            id: "inv".to_string(),
            user_id: "user".to_string(),
            principal: 100_000,
            annual_rate_percent: ANNUAL_RATE_PERCENT,
            deposited_at: start,
            accrual_started_at: start,
            next_interest_at: start + Duration::days(INTEREST_PERIOD_DAYS),
            capital_unlocks_at: start + Duration::days(CAPITAL_LOCK_DAYS),
            active: true,
        }
    }

    #[test]
    fn test_interest_accrues_per_whole_day() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 15, 0, 0).unwrap();
        let inv = investment(start);

        assert_eq!(inv.accrued_interest(start + Duration::hours(8)), 0);
        assert_eq!(inv.accrued_interest(start + Duration::hours(23)), 0);
        // 100 000 x 300% / 365 = 821 per day.
        assert_eq!(inv.accrued_interest(start + Duration::days(1)), 821);
        assert_eq!(inv.accrued_interest(start + Duration::days(30)), 24_657);
    }

    #[test]
    fn test_midnight_is_not_a_day() {
        // 23:59 and 00:01 local time (UTC-5) on either side of midnight.
        let start = Utc.with_ymd_and_hms(2025, 3, 2, 4, 59, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 3, 2, 5, 1, 0).unwrap();
        assert_eq!(days_between(start, now), 0);
        assert_eq!(investment(start).accrued_interest(now), 0);
        assert_eq!(days_between(start, start + Duration::hours(24)), 1);
        assert_eq!(days_between(now, start), 0);
    }

    #[test]
    fn test_status_flags() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let inv = investment(start);

        let early = inv.status(start + Duration::days(10));
        assert!(!early.interest_available);
        assert!(!early.capital_available);
        assert_eq!(early.days_to_interest, 20);

        let later = inv.status(start + Duration::days(31));
        assert!(later.interest_available);
        assert!(!later.capital_available);
        assert_eq!(later.days_to_interest, 0);

        let done = inv.status(start + Duration::days(181));
        assert!(done.capital_available);
    }

    #[test]
    fn test_portfolio_totals() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let summary = portfolio(
            &[investment(start), investment(start)],
            start + Duration::days(2),
        );
        assert_eq!(summary.total_invested, 200_000);
        assert_eq!(summary.total_accrued, 2 * 1_643);
        assert_eq!(summary.total, 203_286);
    }

    #[test]
    fn test_validate_principal() {
        assert!(validate_principal(50_000, 60_000).is_ok());
        assert!(validate_principal(49_999, 60_000).is_err());
        assert!(validate_principal(70_000, 60_000).is_err());
        assert!(validate_principal(5_000_001, 10_000_000).is_err());
    }
}
