use crate::models::transactions::{self, RequestStatus, INSUFFICIENT_AT_PROCESSING};
use crate::utils::{new_id, new_reference};

use anyhow::bail;
use sqlx::{PgConnection, PgPool};

use super::{adjust_balance, credit_balance, Rejection};

#[derive(Clone)]
pub struct TransactionRepository {
    conn: PgPool,
}

async fn lock_pending_deposit(
    conn: &mut PgConnection,
    id: &str,
) -> Result<transactions::Deposit, anyhow::Error> {
    let deposit =
        sqlx::query_as::<_, transactions::Deposit>("SELECT * FROM deposits WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    match deposit {
        None => bail!(Rejection::NotFound("Deposit not found".to_string())),
        Some(d) if d.status != RequestStatus::Pendiente.as_str() => bail!(Rejection::Invalid(
            format!("Deposit already processed ({})", d.status)
        )),
        Some(d) => Ok(d),
    }
}

async fn lock_pending_withdrawal(
    conn: &mut PgConnection,
    id: &str,
) -> Result<transactions::Withdrawal, anyhow::Error> {
    let withdrawal = sqlx::query_as::<_, transactions::Withdrawal>(
        "SELECT * FROM withdrawals WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match withdrawal {
        None => bail!(Rejection::NotFound("Withdrawal not found".to_string())),
        Some(w) if w.status != RequestStatus::Pendiente.as_str() => bail!(Rejection::Invalid(
            format!("Withdrawal already processed ({})", w.status)
        )),
        Some(w) => Ok(w),
    }
}

impl TransactionRepository {
    pub fn new(conn: PgPool) -> Self {
        TransactionRepository { conn }
    }

    pub async fn new_deposit(
        &self,
        user_id: &str,
        deposit: &transactions::NewDeposit,
    ) -> Result<transactions::Deposit, anyhow::Error> {
        let deposit = sqlx::query_as::<_, transactions::Deposit>(
            r#"
                INSERT INTO deposits (id, user_id, amount, method, reference, receipt_path, status)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(user_id)
        .bind(deposit.amount)
        .bind(&deposit.method)
        .bind(new_reference("DEP"))
        .bind(&deposit.receipt_path)
        .bind(RequestStatus::Pendiente.as_str())
        .fetch_one(&self.conn)
        .await?;

        Ok(deposit)
    }

    pub async fn get_deposit(&self, id: &str) -> Result<Option<transactions::Deposit>, anyhow::Error> {
        let deposit = sqlx::query_as::<_, transactions::Deposit>("SELECT * FROM deposits WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(deposit)
    }

    pub async fn get_user_deposits(
        &self,
        user_id: &str,
    ) -> Result<Vec<transactions::Deposit>, anyhow::Error> {
        let deposits = sqlx::query_as::<_, transactions::Deposit>(
            "SELECT * FROM deposits WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(deposits)
    }

    pub async fn get_pending_deposits(&self) -> Result<Vec<transactions::PendingDeposit>, anyhow::Error> {
        let deposits = sqlx::query_as::<_, transactions::PendingDeposit>(
            r#"
                SELECT d.id, d.user_id, u.username, u.email, d.amount, d.method,
                       d.reference, d.receipt_path, d.created_at
                FROM deposits d
                JOIN users u ON u.id = d.user_id
                WHERE d.status = $1
                ORDER BY d.created_at DESC
            "#,
        )
        .bind(RequestStatus::Pendiente.as_str())
        .fetch_all(&self.conn)
        .await?;

        Ok(deposits)
    }

    /// Credits the deposit and marks it approved. Returns the new balance.
    pub async fn approve_deposit(
        &self,
        id: &str,
    ) -> Result<(transactions::Deposit, i64), anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let deposit = lock_pending_deposit(&mut tx, id).await?;
        let balance = credit_balance(&mut tx, &deposit.user_id, deposit.amount).await?;

        let deposit = sqlx::query_as::<_, transactions::Deposit>(
            "UPDATE deposits SET status = $2, processed_at = CURRENT_TIMESTAMP WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(RequestStatus::Aprobado.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((deposit, balance))
    }

    pub async fn reject_deposit(&self, id: &str) -> Result<transactions::Deposit, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        lock_pending_deposit(&mut tx, id).await?;
        let deposit = sqlx::query_as::<_, transactions::Deposit>(
            "UPDATE deposits SET status = $2, processed_at = CURRENT_TIMESTAMP WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(RequestStatus::Rechazado.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(deposit)
    }

    pub async fn new_withdrawal(
        &self,
        user_id: &str,
        withdrawal: &transactions::NewWithdrawal,
    ) -> Result<transactions::Withdrawal, anyhow::Error> {
        let withdrawal = sqlx::query_as::<_, transactions::Withdrawal>(
            r#"
                INSERT INTO withdrawals
                (id, user_id, amount, fee, total, method, destination, reference, status)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(user_id)
        .bind(withdrawal.amount)
        .bind(withdrawal.fee())
        .bind(withdrawal.total())
        .bind(&withdrawal.method)
        .bind(withdrawal.destination.trim())
        .bind(new_reference("RET"))
        .bind(RequestStatus::Pendiente.as_str())
        .fetch_one(&self.conn)
        .await?;

        Ok(withdrawal)
    }

    pub async fn get_user_withdrawals(
        &self,
        user_id: &str,
    ) -> Result<Vec<transactions::Withdrawal>, anyhow::Error> {
        let withdrawals = sqlx::query_as::<_, transactions::Withdrawal>(
            "SELECT * FROM withdrawals WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(withdrawals)
    }

    pub async fn get_pending_withdrawals(
        &self,
    ) -> Result<Vec<transactions::PendingWithdrawal>, anyhow::Error> {
        let withdrawals = sqlx::query_as::<_, transactions::PendingWithdrawal>(
            r#"
                SELECT w.id, w.user_id, u.username, u.email, w.amount, w.fee, w.total,
                       w.method, w.destination, w.reference, w.created_at
                FROM withdrawals w
                JOIN users u ON u.id = w.user_id
                WHERE w.status = $1
                ORDER BY w.created_at DESC
            "#,
        )
        .bind(RequestStatus::Pendiente.as_str())
        .fetch_all(&self.conn)
        .await?;

        Ok(withdrawals)
    }

    /// Debits the withdrawal, or rejects it when the balance no longer covers it.
    pub async fn approve_withdrawal(
        &self,
        id: &str,
    ) -> Result<transactions::WithdrawalDecision, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let withdrawal = lock_pending_withdrawal(&mut tx, id).await?;
        let debit = adjust_balance(&mut tx, &withdrawal.user_id, withdrawal.amount, 0).await;

        let (status, note, balance) = match debit {
            Ok(balance) => (RequestStatus::Aprobado, None, Some(balance)),
            Err(e) if matches!(e.downcast_ref::<Rejection>(), Some(Rejection::InsufficientBalance)) => (
                RequestStatus::Rechazado,
                Some(INSUFFICIENT_AT_PROCESSING),
                None,
            ),
            Err(e) => return Err(e),
        };

        let withdrawal = sqlx::query_as::<_, transactions::Withdrawal>(
            r#"
                UPDATE withdrawals
                SET status = $2, note = COALESCE($3, note), processed_at = CURRENT_TIMESTAMP
                WHERE id = $1
                RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(note)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(transactions::WithdrawalDecision {
            withdrawal,
            balance,
        })
    }

    pub async fn reject_withdrawal(
        &self,
        id: &str,
        note: Option<String>,
    ) -> Result<transactions::Withdrawal, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        lock_pending_withdrawal(&mut tx, id).await?;
        let withdrawal = sqlx::query_as::<_, transactions::Withdrawal>(
            r#"
                UPDATE withdrawals
                SET status = $2, note = $3, processed_at = CURRENT_TIMESTAMP
                WHERE id = $1
                RETURNING *
            "#,
        )
        .bind(id)
        .bind(RequestStatus::Rechazado.as_str())
        .bind(note)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(withdrawal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::fixtures;

    fn withdrawal(amount: i64) -> transactions::NewWithdrawal {
        transactions::NewWithdrawal {
            amount,
            method: "nequi".to_string(),
            destination: "3001234567".to_string(),
            fee: None,
            total: None,
        }
    }

    #[sqlx::test]
    async fn test_approve_withdrawal_debits_balance(pool: PgPool) {
        let user = fixtures::user(&pool, "ana", 100_000).await;
        let repository = TransactionRepository::new(pool.clone());

        let pending = repository.new_withdrawal(&user, &withdrawal(60_000)).await.unwrap();
        assert_eq!(pending.status, RequestStatus::Pendiente.as_str());
        assert!(pending.reference.starts_with("RET"));

        let decision = repository.approve_withdrawal(&pending.id).await.unwrap();
        assert_eq!(decision.withdrawal.status, RequestStatus::Aprobado.as_str());
        assert_eq!(decision.balance, Some(40_000));
        assert_eq!(fixtures::balance(&pool, &user).await, 40_000);

        // Already processed.
        assert!(repository.approve_withdrawal(&pending.id).await.is_err());
    }

    #[sqlx::test]
    async fn test_approve_withdrawal_rejects_when_balance_is_short(pool: PgPool) {
        let user = fixtures::user(&pool, "ana", 100_000).await;
        let repository = TransactionRepository::new(pool.clone());

        let pending = repository.new_withdrawal(&user, &withdrawal(60_000)).await.unwrap();
        // The balance was spent while the request waited.
        sqlx::query("UPDATE users SET balance = 10000 WHERE id = $1")
            .bind(&user)
            .execute(&pool)
            .await
            .unwrap();

        let decision = repository.approve_withdrawal(&pending.id).await.unwrap();
        assert_eq!(decision.withdrawal.status, RequestStatus::Rechazado.as_str());
        assert_eq!(
            decision.withdrawal.note.as_deref(),
            Some(INSUFFICIENT_AT_PROCESSING)
        );
        assert_eq!(decision.balance, None);
        assert_eq!(fixtures::balance(&pool, &user).await, 10_000);
    }
}
