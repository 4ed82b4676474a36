use crate::models::{
    referrals,
    users::{self, REFERRED_SIGNUP_BONUS, REFERRER_SIGNUP_BONUS},
    verifications::{self, STATUS_APPROVED, STATUS_PENDING, STATUS_REJECTED},
};
use crate::utils::{new_id, new_referral_code};

use anyhow::bail;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use super::{credit_balance, is_unique_violation, Rejection};

const REFERRAL_CODE_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct UserRepository {
    conn: PgPool,
}

impl UserRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }

    /// Creates the user and pays the signup bonuses of a valid referral code.
    pub async fn insert_user(
        &self,
        new_user: &users::NewUser,
        password_hash: &str,
    ) -> Result<(users::User, Option<String>), anyhow::Error> {
        let email = new_user.email.trim().to_lowercase();
        let mut tx = self.conn.begin().await?;

        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1 OR username = $2)",
        )
        .bind(&email)
        .bind(&new_user.username)
        .fetch_one(&mut *tx)
        .await?;
        if taken {
            bail!(Rejection::Invalid(
                "Email or username already registered".to_string()
            ));
        }

        let referred_by: Option<String> = match &new_user.referral_code {
            Some(code) if !code.trim().is_empty() => {
                sqlx::query_scalar("SELECT id FROM users WHERE referral_code = $1")
                    .bind(code.trim().to_uppercase())
                    .fetch_optional(&mut *tx)
                    .await?
            }
            _ => None,
        };

        let mut referral_code = None;
        for _ in 0..REFERRAL_CODE_ATTEMPTS {
            let code = new_referral_code();
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE referral_code = $1)")
                    .bind(&code)
                    .fetch_one(&mut *tx)
                    .await?;
            if !exists {
                referral_code = Some(code);
                break;
            }
        }
        let Some(referral_code) = referral_code else {
            bail!("Could not generate a unique referral code");
        };

        let starting_balance = if referred_by.is_some() {
            REFERRED_SIGNUP_BONUS
        } else {
            0
        };

        let inserted = sqlx::query_as::<_, users::User>(
            r#"
                INSERT INTO users
                (id, email, username, password_hash, balance, referral_code, referred_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(&email)
        .bind(&new_user.username)
        .bind(password_hash)
        .bind(starting_balance)
        .bind(&referral_code)
        .bind(&referred_by)
        .fetch_one(&mut *tx)
        .await;

        // A concurrent registration can take the name between the check and here.
        let user = match inserted {
            Ok(user) => user,
            Err(e) if is_unique_violation(&e) => bail!(Rejection::Invalid(
                "Email or username already registered".to_string()
            )),
            Err(e) => return Err(e.into()),
        };

        if let Some(referrer) = &referred_by {
            credit_balance(&mut tx, referrer, REFERRER_SIGNUP_BONUS).await?;
        }

        tx.commit().await?;
        Ok((user, referred_by))
    }

    pub async fn get_users(&self) -> Result<Vec<users::User>, anyhow::Error> {
        let users = sqlx::query_as::<_, users::User>("SELECT * FROM users ORDER BY created_at")
            .fetch_all(&self.conn)
            .await?;

        Ok(users)
    }

    /// Removes the user with everything it owns. Referred users keep their
    /// accounts and lose the link.
    pub async fn delete_user(&self, user_id: &str) -> Result<users::User, anyhow::Error> {
        let user = sqlx::query_as::<_, users::User>("DELETE FROM users WHERE id = $1 RETURNING *")
            .bind(user_id)
            .fetch_optional(&self.conn)
            .await?;

        match user {
            Some(user) => Ok(user),
            None => bail!(Rejection::NotFound("User not found".to_string())),
        }
    }

    pub async fn get_user_by_login(&self, login: &str) -> Result<Option<users::User>, anyhow::Error> {
        let user = sqlx::query_as::<_, users::User>(
            "SELECT * FROM users WHERE username = $1 OR email = LOWER($1)",
        )
        .bind(login.trim())
        .fetch_optional(&self.conn)
        .await?;

        Ok(user)
    }

    pub async fn insert_token(
        &self,
        user_id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), anyhow::Error> {
        sqlx::query("DELETE FROM auth_tokens WHERE user_id = $1 AND expires_at < CURRENT_TIMESTAMP")
            .bind(user_id)
            .execute(&self.conn)
            .await?;

        sqlx::query("INSERT INTO auth_tokens (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(token)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.conn)
            .await?;

        Ok(())
    }

    pub async fn get_user_by_token(&self, token: &str) -> Result<Option<users::User>, anyhow::Error> {
        let user = sqlx::query_as::<_, users::User>(
            r#"
                SELECT users.* FROM users
                JOIN auth_tokens ON auth_tokens.user_id = users.id
                WHERE auth_tokens.token = $1 AND auth_tokens.expires_at > CURRENT_TIMESTAMP
            "#,
        )
        .bind(token)
        .fetch_optional(&self.conn)
        .await?;

        Ok(user)
    }

    /// Credits the bonus unless it was already claimed on `today`.
    /// Returns the new balance, or `None` when it was already claimed.
    pub async fn claim_daily_bonus(
        &self,
        user_id: &str,
        today: NaiveDate,
        amount: i64,
    ) -> Result<Option<i64>, anyhow::Error> {
        let balance = sqlx::query_scalar(
            r#"
                UPDATE users
                SET balance = balance + $3, last_daily_bonus = $2, updated_at = CURRENT_TIMESTAMP
                WHERE id = $1 AND (last_daily_bonus IS NULL OR last_daily_bonus < $2)
                RETURNING balance
            "#,
        )
        .bind(user_id)
        .bind(today)
        .bind(amount)
        .fetch_optional(&self.conn)
        .await?;

        Ok(balance)
    }

    pub async fn get_referrals(
        &self,
        user_id: &str,
    ) -> Result<(Vec<referrals::ReferralRow>, Vec<referrals::ReferralRow>), anyhow::Error> {
        let direct = sqlx::query_as::<_, referrals::ReferralRow>(
            r#"
                SELECT id, username, verified, referred_by FROM users
                WHERE referred_by = $1
                ORDER BY created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        let ids: Vec<String> = direct.iter().map(|r| r.id.clone()).collect();
        let second_level = sqlx::query_as::<_, referrals::ReferralRow>(
            r#"
                SELECT id, username, verified, referred_by FROM users
                WHERE referred_by = ANY($1)
                ORDER BY created_at
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.conn)
        .await?;

        Ok((direct, second_level))
    }

    pub async fn insert_verification(
        &self,
        user_id: &str,
        file_path: &str,
    ) -> Result<verifications::Verification, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let updated = sqlx::query(
            r#"
                UPDATE users
                SET verification_pending = true, updated_at = CURRENT_TIMESTAMP
                WHERE id = $1 AND NOT verified
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            bail!(Rejection::Invalid("User is already verified".to_string()));
        }

        let verification = sqlx::query_as::<_, verifications::Verification>(
            r#"
                INSERT INTO verifications (id, user_id, file_path, status)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(user_id)
        .bind(file_path)
        .bind(STATUS_PENDING)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(verification)
    }

    pub async fn get_pending_verifications(
        &self,
    ) -> Result<Vec<verifications::PendingVerification>, anyhow::Error> {
        let pending = sqlx::query_as::<_, verifications::PendingVerification>(
            r#"
                SELECT v.id, v.user_id, u.username, u.email, v.file_path, v.created_at
                FROM verifications v
                JOIN users u ON u.id = v.user_id
                WHERE v.status = $1
                ORDER BY v.created_at DESC
            "#,
        )
        .bind(STATUS_PENDING)
        .fetch_all(&self.conn)
        .await?;

        Ok(pending)
    }

    /// Marks the user verified and pays the verification bonus to them and
    /// the referral bonuses two levels up, all in one transaction.
    pub async fn approve_verification(
        &self,
        user_id: &str,
    ) -> Result<verifications::VerificationApproval, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let user = sqlx::query_as::<_, users::User>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(user) = user else {
            bail!(Rejection::NotFound("User not found".to_string()));
        };
        if user.verified {
            bail!(Rejection::Invalid("User is already verified".to_string()));
        }

        let balance: i64 = sqlx::query_scalar(
            r#"
                UPDATE users
                SET verified = true, verification_pending = false,
                    balance = balance + $2, updated_at = CURRENT_TIMESTAMP
                WHERE id = $1
                RETURNING balance
            "#,
        )
        .bind(user_id)
        .bind(users::VERIFICATION_BONUS)
        .fetch_one(&mut *tx)
        .await?;

        let mut referral_bonuses = Vec::new();
        if let Some(referrer) = &user.referred_by {
            credit_balance(&mut tx, referrer, users::REFERRER_VERIFICATION_BONUS).await?;
            referral_bonuses.push((referrer.clone(), users::REFERRER_VERIFICATION_BONUS));

            let grand_referrer: Option<String> =
                sqlx::query_scalar("SELECT referred_by FROM users WHERE id = $1")
                    .bind(referrer)
                    .fetch_one(&mut *tx)
                    .await?;
            if let Some(grand_referrer) = grand_referrer {
                credit_balance(&mut tx, &grand_referrer, users::SECOND_LEVEL_VERIFICATION_BONUS)
                    .await?;
                referral_bonuses.push((grand_referrer, users::SECOND_LEVEL_VERIFICATION_BONUS));
            }
        }

        sqlx::query(
            r#"
                UPDATE verifications
                SET status = $3, updated_at = CURRENT_TIMESTAMP
                WHERE user_id = $1 AND status = $2
            "#,
        )
        .bind(user_id)
        .bind(STATUS_PENDING)
        .bind(STATUS_APPROVED)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(verifications::VerificationApproval {
            user_id: user.id,
            bonus: users::VERIFICATION_BONUS,
            balance,
            referral_bonuses,
        })
    }

    pub async fn reject_verification(
        &self,
        user_id: &str,
        reason: String,
    ) -> Result<verifications::VerificationRejection, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let verification_id: Option<String> = sqlx::query_scalar(
            r#"
                SELECT id FROM verifications
                WHERE user_id = $1 AND status = $2
                ORDER BY created_at DESC
                LIMIT 1
                FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(STATUS_PENDING)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(verification_id) = verification_id else {
            bail!(Rejection::NotFound(
                "No pending verification for this user".to_string()
            ));
        };

        sqlx::query("UPDATE verifications SET status = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1")
            .bind(&verification_id)
            .bind(STATUS_REJECTED)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE users SET verification_pending = false, updated_at = CURRENT_TIMESTAMP WHERE id = $1",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(verifications::VerificationRejection {
            user_id: user_id.to_string(),
            verification_id,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::fixtures;

    fn new_user(username: &str, referral_code: Option<String>) -> users::NewUser {
        users::NewUser {
            email: format!("{}@Example.com", username),
            username: username.to_string(),
            password: "secreto".to_string(),
            referral_code,
        }
    }

    #[sqlx::test]
    async fn test_insert_user_pays_referral_bonuses(pool: PgPool) {
        let repository = UserRepository::new(pool.clone());

        let (referrer, _) = repository
            .insert_user(&new_user("ana", None), "hash")
            .await
            .unwrap();
        assert_eq!(referrer.email, "ana@example.com");
        assert_eq!(referrer.balance, 0);

        let code = Some(referrer.referral_code.to_lowercase());
        let (referred, referred_by) = repository
            .insert_user(&new_user("beto", code), "hash")
            .await
            .unwrap();
        assert_eq!(referred_by.as_deref(), Some(referrer.id.as_str()));
        assert_eq!(referred.balance, REFERRED_SIGNUP_BONUS);
        assert_eq!(
            fixtures::balance(&pool, &referrer.id).await,
            REFERRER_SIGNUP_BONUS
        );
    }

    #[sqlx::test]
    async fn test_concurrent_registrations_of_one_name(pool: PgPool) {
        let repository = UserRepository::new(pool.clone());
        let first = new_user("ana", None);
        let second = users::NewUser {
            email: "otra@example.com".to_string(),
            ..new_user("ana", None)
        };

        let (a, b) = tokio::join!(
            repository.insert_user(&first, "hash"),
            repository.insert_user(&second, "hash")
        );

        // Whichever loses, it loses as a rejection rather than a database error.
        let failures: Vec<_> = [a.err(), b.err()].into_iter().flatten().collect();
        assert_eq!(failures.len(), 1);
        assert!(matches!(
            failures[0].downcast_ref::<Rejection>(),
            Some(Rejection::Invalid(_))
        ));
    }

    #[sqlx::test]
    async fn test_delete_user(pool: PgPool) {
        let repository = UserRepository::new(pool.clone());
        let (referrer, _) = repository
            .insert_user(&new_user("ana", None), "hash")
            .await
            .unwrap();
        let (referred, _) = repository
            .insert_user(&new_user("beto", Some(referrer.referral_code.clone())), "hash")
            .await
            .unwrap();

        let deleted = repository.delete_user(&referrer.id).await.unwrap();
        assert_eq!(deleted.username, "ana");

        let users = repository.get_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, referred.id);
        assert_eq!(users[0].referred_by, None);

        let error = repository.delete_user(&referrer.id).await.unwrap_err();
        assert!(matches!(
            error.downcast_ref::<Rejection>(),
            Some(Rejection::NotFound(_))
        ));
    }
}
