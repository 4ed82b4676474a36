pub mod draws;
pub mod investments;
pub mod rounds;
pub mod transactions;
pub mod users;

use anyhow::bail;
use sqlx::PgConnection;

/// A request the database refused on business grounds, as opposed to a
/// failure of the database itself.
#[derive(Debug, thiserror::Error)]
pub enum Rejection {
    #[error("Insufficient balance")]
    InsufficientBalance,
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
}

const UNIQUE_VIOLATION: &str = "23505";

/// True when an insert lost a race against a unique constraint.
pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .and_then(|d| d.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION)
}

/// Takes `debit` from and adds `credit` to a balance in one statement.
/// Fails with `InsufficientBalance` when the balance cannot cover `debit`.
/// Both amounts must be non-negative.
pub(crate) async fn adjust_balance(
    conn: &mut PgConnection,
    user_id: &str,
    debit: i64,
    credit: i64,
) -> Result<i64, anyhow::Error> {
    if debit < 0 || credit < 0 {
        bail!(Rejection::Invalid(format!(
            "Refusing balance change of -{} +{} for {}",
            debit, credit, user_id
        )));
    }

    let balance: Option<i64> = sqlx::query_scalar(
        r#"
            UPDATE users
            SET balance = balance - $2 + $3, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND balance >= $2
            RETURNING balance
        "#,
    )
    .bind(user_id)
    .bind(debit)
    .bind(credit)
    .fetch_optional(&mut *conn)
    .await?;

    match balance {
        Some(balance) => Ok(balance),
        None => Err(Rejection::InsufficientBalance.into()),
    }
}

pub(crate) async fn credit_balance(
    conn: &mut PgConnection,
    user_id: &str,
    amount: i64,
) -> Result<i64, anyhow::Error> {
    adjust_balance(conn, user_id, 0, amount).await
}

#[cfg(test)]
pub(crate) mod fixtures {
    use sqlx::PgPool;

    use crate::utils::{new_id, new_referral_code};

    /// Inserts a bare user and returns its id.
    pub async fn user(pool: &PgPool, username: &str, balance: i64) -> String {
        let id = new_id();
        sqlx::query(
            r#"
                INSERT INTO users (id, email, username, password_hash, balance, referral_code)
                VALUES ($1, $2, $3, '', $4, $5)
            "#,
        )
        .bind(&id)
        .bind(format!("{}@example.com", username))
        .bind(username)
        .bind(balance)
        .bind(new_referral_code())
        .execute(pool)
        .await
        .unwrap();
        id
    }

    pub async fn balance(pool: &PgPool, user_id: &str) -> i64 {
        sqlx::query_scalar("SELECT balance FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    #[sqlx::test]
    async fn test_adjust_balance(pool: PgPool) {
        let user = fixtures::user(&pool, "ana", 1_000).await;
        let mut conn = pool.acquire().await.unwrap();

        assert_eq!(adjust_balance(&mut conn, &user, 300, 50).await.unwrap(), 750);

        let error = adjust_balance(&mut conn, &user, 751, 0).await.unwrap_err();
        assert!(matches!(
            error.downcast_ref::<Rejection>(),
            Some(Rejection::InsufficientBalance)
        ));

        // A negative debit would otherwise credit the balance.
        let error = adjust_balance(&mut conn, &user, -1_000, 0).await.unwrap_err();
        assert!(matches!(error.downcast_ref::<Rejection>(), Some(Rejection::Invalid(_))));
        assert!(adjust_balance(&mut conn, &user, 0, -1).await.is_err());

        drop(conn);
        assert_eq!(fixtures::balance(&pool, &user).await, 750);
    }
}
