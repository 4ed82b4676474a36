use crate::models::draws;
use crate::utils::new_id;

use anyhow::bail;
use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::PgPool;

use super::{adjust_balance, credit_balance, is_unique_violation, Rejection};

const RESULTS_LIMIT: i64 = 50;

#[derive(Clone)]
pub struct DrawRepository {
    conn: PgPool,
}

impl DrawRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }

    /// Debits the entry cost and registers the entry. A user may only hold
    /// one active entry; the partial unique index backs that up.
    pub async fn insert_entry(
        &self,
        user_id: &str,
        cost: i64,
        tickets: i32,
    ) -> Result<(draws::Participant, i64), anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let active: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM draw_participants WHERE user_id = $1 AND active)",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        if active {
            bail!(Rejection::Invalid(
                "You already have an active entry in the draw".to_string()
            ));
        }

        let balance = adjust_balance(&mut tx, user_id, cost, 0).await?;

        let id = new_id();
        let inserted = sqlx::query(
            "INSERT INTO draw_participants (id, user_id, cost, tickets) VALUES ($1, $2, $3, $4)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(cost)
        .bind(tickets)
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            if is_unique_violation(&e) {
                bail!(Rejection::Invalid(
                    "You already have an active entry in the draw".to_string()
                ));
            }
            return Err(e.into());
        }

        let participant = sqlx::query_as::<_, draws::Participant>(
            r#"
                SELECT p.id, p.user_id, u.username, p.cost, p.tickets, p.created_at
                FROM draw_participants p
                JOIN users u ON u.id = p.user_id
                WHERE p.id = $1
            "#,
        )
        .bind(&id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((participant, balance))
    }

    pub async fn get_participants(&self) -> Result<Vec<draws::Participant>, anyhow::Error> {
        let participants = sqlx::query_as::<_, draws::Participant>(
            r#"
                SELECT p.id, p.user_id, u.username, p.cost, p.tickets, p.created_at
                FROM draw_participants p
                JOIN users u ON u.id = p.user_id
                WHERE p.active
                ORDER BY p.created_at
            "#,
        )
        .fetch_all(&self.conn)
        .await?;

        Ok(participants)
    }

    /// Active participants and tickets.
    pub async fn get_counts(&self) -> Result<(i64, i64), anyhow::Error> {
        let counts: (i64, i64) = sqlx::query_as(
            r#"
                SELECT COUNT(DISTINCT user_id), COALESCE(SUM(tickets), 0)::BIGINT
                FROM draw_participants
                WHERE active
            "#,
        )
        .fetch_one(&self.conn)
        .await?;

        Ok(counts)
    }

    pub async fn get_last_draw_at(&self) -> Result<Option<DateTime<Utc>>, anyhow::Error> {
        let drawn_at = sqlx::query_scalar("SELECT MAX(drawn_at) FROM draw_results")
            .fetch_one(&self.conn)
            .await?;

        Ok(drawn_at)
    }

    pub async fn has_entries_before(&self, before: DateTime<Utc>) -> Result<bool, anyhow::Error> {
        let waiting = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM draw_participants WHERE active AND created_at < $1)",
        )
        .bind(before)
        .fetch_one(&self.conn)
        .await?;

        Ok(waiting)
    }

    /// Picks the winner among the active entries, pays the prize and
    /// consumes the entries. With `before`, only entries created before that
    /// instant take part and later ones wait for the next draw. The entries
    /// stay locked until commit, so a concurrent draw finds none left.
    pub async fn draw<R: Rng + Send>(
        &self,
        prize: i64,
        before: Option<DateTime<Utc>>,
        rng: &mut R,
    ) -> Result<draws::DrawResult, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let entries = sqlx::query_as::<_, draws::Participant>(
            r#"
                SELECT p.id, p.user_id, u.username, p.cost, p.tickets, p.created_at
                FROM draw_participants p
                JOIN users u ON u.id = p.user_id
                WHERE p.active AND ($1::TIMESTAMPTZ IS NULL OR p.created_at < $1)
                ORDER BY p.created_at
                FOR UPDATE OF p
            "#,
        )
        .bind(before)
        .fetch_all(&mut *tx)
        .await?;
        if entries.is_empty() {
            bail!(Rejection::Invalid("There are no participants in the draw".to_string()));
        }

        let tallies = draws::tally(&entries);
        let total_tickets: i64 = tallies.iter().map(|t| t.2).sum();
        let roll = rng.gen_range(0..total_tickets);
        let Some(index) = draws::pick_weighted(&tallies, roll) else {
            bail!("Ticket {} outside a pool of {}", roll, total_tickets);
        };
        let (user_id, username, tickets) = &tallies[index];

        let balance_after = credit_balance(&mut tx, user_id, prize).await?;
        let winner = draws::Winner {
            user_id: user_id.clone(),
            username: username.clone(),
            balance_before: balance_after - prize,
            balance_after,
            tickets: *tickets,
            prize,
        };

        let result = sqlx::query_as::<_, draws::DrawResult>(
            r#"
                INSERT INTO draw_results
                (id, winning_number, winners, total_participants, total_winners)
                VALUES ($1, $2, $3, $4, 1)
                RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(user_id)
        .bind(serde_json::to_value(vec![winner])?)
        .bind(tallies.len() as i32)
        .fetch_one(&mut *tx)
        .await?;

        let ids: Vec<String> = entries.into_iter().map(|e| e.id).collect();
        sqlx::query("UPDATE draw_participants SET active = false, draw_id = $2 WHERE id = ANY($1)")
            .bind(&ids)
            .bind(&result.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result)
    }

    pub async fn get_results(&self) -> Result<Vec<draws::DrawResult>, anyhow::Error> {
        let results = sqlx::query_as::<_, draws::DrawResult>(
            "SELECT * FROM draw_results ORDER BY drawn_at DESC LIMIT $1",
        )
        .bind(RESULTS_LIMIT)
        .fetch_all(&self.conn)
        .await?;

        Ok(results)
    }

    /// Deactivates every active entry without drawing. Returns how many were cleared.
    pub async fn clear(&self) -> Result<u64, anyhow::Error> {
        let cleared = sqlx::query("UPDATE draw_participants SET active = false WHERE active")
            .execute(&self.conn)
            .await?;

        Ok(cleared.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::fixtures;
    use chrono::Duration;
    use rand::{rngs::StdRng, SeedableRng};

    #[sqlx::test]
    async fn test_one_active_entry_per_user(pool: PgPool) {
        let user = fixtures::user(&pool, "ana", 50_000).await;
        let repository = DrawRepository::new(pool.clone());

        let (participant, balance) = repository.insert_entry(&user, 10_000, 3).await.unwrap();
        assert_eq!(participant.username, "ana");
        assert_eq!(balance, 40_000);

        let error = repository.insert_entry(&user, 10_000, 3).await.unwrap_err();
        assert!(matches!(
            error.downcast_ref::<Rejection>(),
            Some(Rejection::Invalid(_))
        ));
        assert_eq!(fixtures::balance(&pool, &user).await, 40_000);
        assert_eq!(repository.get_counts().await.unwrap(), (1, 3));
    }

    #[sqlx::test]
    async fn test_draw_only_takes_entries_before_the_slot(pool: PgPool) {
        let early = fixtures::user(&pool, "ana", 50_000).await;
        let late = fixtures::user(&pool, "beto", 50_000).await;
        let repository = DrawRepository::new(pool.clone());

        repository.insert_entry(&early, 10_000, 3).await.unwrap();
        let slot = Utc::now() - Duration::hours(1);
        sqlx::query("UPDATE draw_participants SET created_at = $2 WHERE user_id = $1")
            .bind(&early)
            .bind(slot - Duration::hours(1))
            .execute(&pool)
            .await
            .unwrap();
        repository.insert_entry(&late, 10_000, 3).await.unwrap();

        let mut rng = StdRng::seed_from_u64(4);
        let result = repository.draw(100_000, Some(slot), &mut rng).await.unwrap();
        assert_eq!(result.winning_number, early);
        assert_eq!(result.total_participants, 1);
        assert_eq!(fixtures::balance(&pool, &early).await, 140_000);

        // The later entry waits for the next draw.
        let waiting = repository.get_participants().await.unwrap();
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].user_id, late);
        assert!(!repository.has_entries_before(slot).await.unwrap());

        let error = repository.draw(100_000, Some(slot), &mut rng).await.unwrap_err();
        assert!(matches!(
            error.downcast_ref::<Rejection>(),
            Some(Rejection::Invalid(_))
        ));
    }
}
