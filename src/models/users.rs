use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const REFERRED_SIGNUP_BONUS: i64 = 1_000;
pub const REFERRER_SIGNUP_BONUS: i64 = 100;
pub const VERIFICATION_BONUS: i64 = 10_000;
pub const REFERRER_VERIFICATION_BONUS: i64 = 2_000;
pub const SECOND_LEVEL_VERIFICATION_BONUS: i64 = 100;
pub const DAILY_BONUS_VERIFIED: i64 = 500;
pub const DAILY_BONUS_UNVERIFIED: i64 = 100;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub balance: i64,
    pub referral_code: String,
    pub referred_by: Option<String>,
    pub verified: bool,
    pub verification_pending: bool,
    pub last_daily_bonus: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password: String,
    pub referral_code: Option<String>,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), String> {
        let username_ok = (3..=32).contains(&self.username.chars().count())
            && self
                .username
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !username_ok {
            return Err(
                "Username must be 3 to 32 letters, digits or underscores".to_string(),
            );
        }

        let email = self.email.trim();
        let email_ok = match email.split_once('@') {
            Some((local, domain)) => !local.is_empty() && domain.contains('.'),
            None => false,
        };
        if !email_ok {
            return Err("Invalid email address".to_string());
        }

        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Credentials {
    /// Username or email.
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct AuthToken {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user_id: String,
    pub username: String,
}

/// What a user may see about their own account.
#[derive(Clone, Debug, Serialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub username: String,
    pub balance: i64,
    pub referral_code: String,
    pub referred_by: Option<String>,
    pub verified: bool,
    pub verification_pending: bool,
    pub last_daily_bonus: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for Profile {
    fn from(user: User) -> Self {
        Profile {
            id: user.id,
            email: user.email,
            username: user.username,
            balance: user.balance,
            referral_code: user.referral_code,
            referred_by: user.referred_by,
            verified: user.verified,
            verification_pending: user.verification_pending,
            last_daily_bonus: user.last_daily_bonus,
            created_at: user.created_at,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct DailyBonus {
    pub amount: i64,
    pub balance: i64,
    pub claimed_on: NaiveDate,
}

pub fn daily_bonus_amount(verified: bool) -> i64 {
    if verified {
        DAILY_BONUS_VERIFIED
    } else {
        DAILY_BONUS_UNVERIFIED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str, password: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            referral_code: None,
        }
    }

    #[test]
    fn test_new_user_validation() {
        assert!(new_user("ana_01", "ana@mail.co", "secreto").validate().is_ok());
        assert!(new_user("an", "ana@mail.co", "secreto").validate().is_err());
        assert!(new_user("ana perez", "ana@mail.co", "secreto").validate().is_err());
        assert!(new_user("ana", "ana.mail.co", "secreto").validate().is_err());
        assert!(new_user("ana", "ana@mail.co", "12345").validate().is_err());
    }

    #[test]
    fn test_daily_bonus_amount() {
        assert_eq!(daily_bonus_amount(true), 500);
        assert_eq!(daily_bonus_amount(false), 100);
    }
}
