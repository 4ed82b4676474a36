use crate::games::Wager;
use crate::models::rounds::{self, HISTORY_LIMIT};
use crate::utils::new_id;

use sqlx::{PgConnection, PgPool};

use super::adjust_balance;

#[derive(Clone)]
pub struct RoundRepository {
    conn: PgPool,
}

async fn insert_round(
    conn: &mut PgConnection,
    user_id: &str,
    wager: &impl Wager,
    balance_after: i64,
) -> Result<String, anyhow::Error> {
    let id = new_id();
    sqlx::query(
        r#"
            INSERT INTO game_rounds (id, user_id, game, stake, payout, balance_after, detail)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(wager.game())
    .bind(wager.stake())
    .bind(wager.payout())
    .bind(balance_after)
    .bind(serde_json::to_value(wager)?)
    .execute(&mut *conn)
    .await?;

    Ok(id)
}

impl RoundRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }

    /// Debits the stake and credits the payout of a finished round in one
    /// statement, recording the round in the same transaction.
    pub async fn settle_instant(
        &self,
        user_id: &str,
        wager: &impl Wager,
    ) -> Result<rounds::Settlement, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let balance = adjust_balance(&mut tx, user_id, wager.stake(), wager.payout()).await?;
        let round_id = insert_round(&mut tx, user_id, wager, balance).await?;

        tx.commit().await?;

        Ok(rounds::Settlement {
            round_id,
            stake: wager.stake(),
            payout: wager.payout(),
            net: wager.payout() - wager.stake(),
            balance,
        })
    }

    /// Takes the stake when a session game starts.
    pub async fn debit_stake(&self, user_id: &str, stake: i64) -> Result<i64, anyhow::Error> {
        let mut conn = self.conn.acquire().await?;
        adjust_balance(&mut conn, user_id, stake, 0).await
    }

    /// Pays out a finished session game whose stake was taken at the start.
    pub async fn settle_session(
        &self,
        user_id: &str,
        wager: &impl Wager,
    ) -> Result<rounds::Settlement, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let balance = adjust_balance(&mut tx, user_id, 0, wager.payout()).await?;
        let round_id = insert_round(&mut tx, user_id, wager, balance).await?;

        tx.commit().await?;

        Ok(rounds::Settlement {
            round_id,
            stake: wager.stake(),
            payout: wager.payout(),
            net: wager.payout() - wager.stake(),
            balance,
        })
    }

    pub async fn get_history(&self, user_id: &str) -> Result<Vec<rounds::Round>, anyhow::Error> {
        let history = sqlx::query_as::<_, rounds::Round>(
            r#"
                SELECT id, game, stake, payout, balance_after, detail, created_at
                FROM game_rounds
                WHERE user_id = $1
                ORDER BY created_at DESC
                LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(HISTORY_LIMIT)
        .fetch_all(&self.conn)
        .await?;

        Ok(history)
    }

    pub async fn get_stats(&self, user_id: &str) -> Result<Vec<rounds::GameStats>, anyhow::Error> {
        let stats = sqlx::query_as::<_, rounds::GameStats>(
            r#"
                SELECT game,
                       COUNT(*) AS rounds,
                       COALESCE(SUM(stake), 0)::BIGINT AS total_staked,
                       COALESCE(SUM(payout), 0)::BIGINT AS total_paid
                FROM game_rounds
                WHERE user_id = $1
                GROUP BY game
                ORDER BY game
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(stats)
    }

    pub async fn get_aviator_stats(
        &self,
        user_id: &str,
    ) -> Result<rounds::AviatorStats, anyhow::Error> {
        let stats = sqlx::query_as::<_, rounds::AviatorStats>(
            r#"
                SELECT COUNT(*) AS flights,
                       COUNT(*) FILTER (WHERE payout > 0) AS won,
                       COUNT(*) FILTER (WHERE payout = 0) AS lost,
                       COALESCE(SUM(payout - stake) FILTER (WHERE payout > stake), 0)::BIGINT
                           AS total_won,
                       COALESCE(SUM(stake - payout) FILTER (WHERE payout < stake), 0)::BIGINT
                           AS total_lost,
                       COALESCE(SUM(payout - stake), 0)::BIGINT AS net,
                       GREATEST(COALESCE(MAX(payout - stake), 0), 0)::BIGINT AS biggest_win,
                       MAX((detail->>'cashout_multiplier')::FLOAT8) AS best_multiplier
                FROM game_rounds
                WHERE user_id = $1 AND game = 'aviator'
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.conn)
        .await?;

        Ok(stats)
    }

    pub async fn get_crash_history(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<rounds::CrashPoint>, anyhow::Error> {
        let points = sqlx::query_as::<_, rounds::CrashPoint>(
            r#"
                SELECT (detail->>'crash')::INT AS crash, created_at
                FROM game_rounds
                WHERE user_id = $1 AND game = 'aviator'
                ORDER BY created_at DESC
                LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.conn)
        .await?;

        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{fixtures, Rejection};
    use serde::Serialize;

    #[derive(Serialize)]
    struct FixedRound {
        stake: i64,
        payout: i64,
    }

    impl Wager for FixedRound {
        fn game(&self) -> &'static str {
            "dados"
        }

        fn stake(&self) -> i64 {
            self.stake
        }

        fn payout(&self) -> i64 {
            self.payout
        }
    }

    #[sqlx::test]
    async fn test_settle_instant_moves_stake_and_payout(pool: PgPool) {
        let user = fixtures::user(&pool, "ana", 1_000).await;
        let repository = RoundRepository::new(pool.clone());

        let round = FixedRound {
            stake: 100,
            payout: 250,
        };
        let settlement = repository.settle_instant(&user, &round).await.unwrap();
        assert_eq!(settlement.balance, 1_000 - 100 + 250);
        assert_eq!(settlement.net, 150);

        let lost = FixedRound {
            stake: 500,
            payout: 0,
        };
        let settlement = repository.settle_instant(&user, &lost).await.unwrap();
        assert_eq!(settlement.balance, 650);

        let history = repository.get_history(&user).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().any(|r| r.balance_after == 1_150));
        assert_eq!(fixtures::balance(&pool, &user).await, 650);
    }

    #[sqlx::test]
    async fn test_settle_instant_without_funds(pool: PgPool) {
        let user = fixtures::user(&pool, "ana", 100).await;
        let repository = RoundRepository::new(pool.clone());

        let round = FixedRound {
            stake: 500,
            payout: 1_000,
        };
        let error = repository.settle_instant(&user, &round).await.unwrap_err();
        assert!(matches!(
            error.downcast_ref::<Rejection>(),
            Some(Rejection::InsufficientBalance)
        ));

        assert!(repository.get_history(&user).await.unwrap().is_empty());
        assert_eq!(fixtures::balance(&pool, &user).await, 100);
    }

    #[sqlx::test]
    async fn test_session_stake_then_settle(pool: PgPool) {
        let user = fixtures::user(&pool, "ana", 1_000).await;
        let repository = RoundRepository::new(pool.clone());

        assert_eq!(repository.debit_stake(&user, 400).await.unwrap(), 600);
        let round = FixedRound {
            stake: 400,
            payout: 800,
        };
        let settlement = repository.settle_session(&user, &round).await.unwrap();
        assert_eq!(settlement.balance, 1_400);
        assert_eq!(settlement.net, 400);
    }
}
