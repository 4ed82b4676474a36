use chrono::{DateTime, Utc};
use serde::Serialize;

pub const HISTORY_LIMIT: i64 = 50;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Round {
    pub id: String,
    pub game: String,
    pub stake: i64,
    pub payout: i64,
    pub balance_after: i64,
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct GameStats {
    pub game: String,
    pub rounds: i64,
    pub total_staked: i64,
    pub total_paid: i64,
}

/// Result of settling a round against the balance.
#[derive(Clone, Debug, Serialize)]
pub struct Settlement {
    pub round_id: String,
    pub stake: i64,
    pub payout: i64,
    pub net: i64,
    pub balance: i64,
}

/// A player's aviator record. A flight counts as won when it was cashed out.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct AviatorStats {
    pub flights: i64,
    pub won: i64,
    pub lost: i64,
    pub total_won: i64,
    pub total_lost: i64,
    pub net: i64,
    pub biggest_win: i64,
    pub best_multiplier: Option<f64>,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct CrashPoint {
    pub crash: i32,
    pub created_at: DateTime<Utc>,
}
