use crate::models::investments::{
    self, ANNUAL_RATE_PERCENT, CAPITAL_LOCK_DAYS, INTEREST_PERIOD_DAYS, KIND_CAPITAL, KIND_INTEREST,
};
use crate::utils::new_id;

use anyhow::bail;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde_json::json;
use sqlx::{PgConnection, PgPool};

use super::{adjust_balance, credit_balance, Rejection};

#[derive(Clone)]
pub struct InvestmentRepository {
    conn: PgPool,
}

async fn lock_active_investment(
    conn: &mut PgConnection,
    user_id: &str,
    investment_id: &str,
) -> Result<investments::Investment, anyhow::Error> {
    let investment = sqlx::query_as::<_, investments::Investment>(
        "SELECT * FROM investments WHERE id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(investment_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    match investment {
        None => bail!(Rejection::NotFound("Investment not found".to_string())),
        Some(i) if !i.active => bail!(Rejection::Invalid(
            "Investment is no longer active".to_string()
        )),
        Some(i) => Ok(i),
    }
}

async fn insert_withdrawal(
    conn: &mut PgConnection,
    investment: &investments::Investment,
    amount: i64,
    kind: &str,
    details: serde_json::Value,
) -> Result<(), anyhow::Error> {
    sqlx::query(
        r#"
            INSERT INTO investment_withdrawals (id, investment_id, user_id, amount, kind, details)
            VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(new_id())
    .bind(&investment.id)
    .bind(&investment.user_id)
    .bind(amount)
    .bind(kind)
    .bind(details)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

impl InvestmentRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }

    /// Moves `amount` from the balance into a new investment.
    pub async fn insert_investment(
        &self,
        user_id: &str,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<(investments::Investment, i64), anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let balance = adjust_balance(&mut tx, user_id, amount, 0).await?;
        let investment = sqlx::query_as::<_, investments::Investment>(
            r#"
                INSERT INTO investments
                (id, user_id, principal, annual_rate_percent, deposited_at,
                 accrual_started_at, next_interest_at, capital_unlocks_at)
                VALUES ($1, $2, $3, $4, $5, $5, $6, $7)
                RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(user_id)
        .bind(amount)
        .bind(ANNUAL_RATE_PERCENT)
        .bind(now)
        .bind(now + Duration::days(INTEREST_PERIOD_DAYS))
        .bind(now + Duration::days(CAPITAL_LOCK_DAYS))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((investment, balance))
    }

    pub async fn get_active_investments(
        &self,
        user_id: &str,
    ) -> Result<Vec<investments::Investment>, anyhow::Error> {
        let list = sqlx::query_as::<_, investments::Investment>(
            "SELECT * FROM investments WHERE user_id = $1 AND active ORDER BY deposited_at",
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(list)
    }

    pub async fn get_history(
        &self,
        user_id: &str,
    ) -> Result<Vec<investments::InvestmentHistory>, anyhow::Error> {
        let list = sqlx::query_as::<_, investments::Investment>(
            "SELECT * FROM investments WHERE user_id = $1 ORDER BY deposited_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        let mut withdrawals = sqlx::query_as::<_, investments::InvestmentWithdrawal>(
            "SELECT * FROM investment_withdrawals WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        let history = list
            .into_iter()
            .map(|investment| {
                let (own, rest): (Vec<_>, Vec<_>) = withdrawals
                    .drain(..)
                    .partition(|w| w.investment_id == investment.id);
                withdrawals = rest;
                investments::InvestmentHistory {
                    investment,
                    withdrawals: own,
                }
            })
            .collect();

        Ok(history)
    }

    pub async fn withdraw_interest(
        &self,
        user_id: &str,
        investment_id: &str,
        now: DateTime<Utc>,
        offset: FixedOffset,
    ) -> Result<investments::Payout, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let investment = lock_active_investment(&mut tx, user_id, investment_id).await?;
        if now < investment.next_interest_at {
            bail!(Rejection::Invalid(format!(
                "Interest unlocks on {}",
                investment.next_interest_at.with_timezone(&offset).format("%Y-%m-%d")
            )));
        }
        let interest = investment.accrued_interest(now);
        if interest <= 0 {
            bail!(Rejection::Invalid("No interest to withdraw".to_string()));
        }

        let balance = credit_balance(&mut tx, user_id, interest).await?;
        let details = json!({
            "principal": investment.principal,
            "annual_rate_percent": investment.annual_rate_percent,
            "days": investments::days_between(investment.accrual_started_at, now),
            "accrued_from": investment.accrual_started_at,
            "accrued_to": now,
        });
        insert_withdrawal(&mut tx, &investment, interest, KIND_INTEREST, details).await?;

        sqlx::query(
            "UPDATE investments SET accrual_started_at = $2, next_interest_at = $3 WHERE id = $1",
        )
        .bind(&investment.id)
        .bind(now)
        .bind(now + Duration::days(INTEREST_PERIOD_DAYS))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(investments::Payout {
            investment_id: investment.id,
            kind: KIND_INTEREST,
            amount: interest,
            balance,
        })
    }

    /// Returns the principal plus whatever interest is still accrued, and closes the investment.
    pub async fn withdraw_capital(
        &self,
        user_id: &str,
        investment_id: &str,
        now: DateTime<Utc>,
        offset: FixedOffset,
    ) -> Result<investments::Payout, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let investment = lock_active_investment(&mut tx, user_id, investment_id).await?;
        if now < investment.capital_unlocks_at {
            bail!(Rejection::Invalid(format!(
                "Capital unlocks on {}",
                investment.capital_unlocks_at.with_timezone(&offset).format("%Y-%m-%d")
            )));
        }
        let interest = investment.accrued_interest(now);
        let amount = investment.principal + interest;

        let balance = credit_balance(&mut tx, user_id, amount).await?;
        let details = json!({
            "principal": investment.principal,
            "final_interest": interest,
        });
        insert_withdrawal(&mut tx, &investment, amount, KIND_CAPITAL, details).await?;

        sqlx::query("UPDATE investments SET active = false WHERE id = $1")
            .bind(&investment.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(investments::Payout {
            investment_id: investment.id,
            kind: KIND_CAPITAL,
            amount,
            balance,
        })
    }
}
