use chrono::{DateTime, Utc};
use serde::Serialize;

pub const STATUS_PENDING: &str = "pendiente";
pub const STATUS_APPROVED: &str = "aprobada";
pub const STATUS_REJECTED: &str = "rechazada";

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Verification {
    pub id: String,
    pub user_id: String,
    pub file_path: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct PendingVerification {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub file_path: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct VerificationApproval {
    pub user_id: String,
    pub bonus: i64,
    pub balance: i64,
    /// Users credited for referring this one, with the amount.
    pub referral_bonuses: Vec<(String, i64)>,
}

#[derive(Clone, Debug, Serialize)]
pub struct VerificationRejection {
    pub user_id: String,
    pub verification_id: String,
    pub reason: String,
}
