use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use uuid::Uuid;

use super::{to_json, SessionReply, SessionRequestHandler};
use crate::games::mines::{Difficulty, Mines, Status};
use crate::games::sessions::SessionGuard;
use crate::services::ServiceError;

pub enum MinesAction {
    Start {
        stake: i64,
        difficulty: Difficulty,
    },
    Open {
        session_id: Uuid,
        row: usize,
        col: usize,
    },
    Flag {
        session_id: Uuid,
        row: usize,
        col: usize,
    },
    Cashout {
        session_id: Uuid,
    },
    Cancel {
        session_id: Uuid,
    },
    Status {
        session_id: Uuid,
    },
    Active,
}

#[derive(Serialize)]
struct ActiveGame {
    session_id: Uuid,
    game: serde_json::Value,
}

impl SessionRequestHandler {
    pub(super) async fn mines(
        &self,
        user_id: &str,
        action: MinesAction,
    ) -> Result<serde_json::Value, ServiceError> {
        let reply = match action {
            MinesAction::Start { stake, difficulty } => {
                let game = Mines::start(stake, difficulty, &mut StdRng::from_entropy())?;
                let previous = self.mines.owned_by(user_id).await;
                let view = to_json(&game)?;
                let reply = self.open(&self.mines, user_id, stake, view, game).await?;
                // Older boards only go once the new stake has been taken.
                self.forfeit_mines(user_id, previous).await?;
                reply
            }
            MinesAction::Open {
                session_id,
                row,
                col,
            } => {
                let guard = self.mines.lock(session_id, user_id).await?;
                let mut game = guard.state().clone();
                game.open(row, col)?;
                self.mines_step(guard, user_id, game).await?
            }
            MinesAction::Flag {
                session_id,
                row,
                col,
            } => {
                let guard = self.mines.lock(session_id, user_id).await?;
                let mut game = guard.state().clone();
                game.toggle_flag(row, col)?;
                self.mines_step(guard, user_id, game).await?
            }
            MinesAction::Cashout { session_id } => {
                let guard = self.mines.lock(session_id, user_id).await?;
                let mut game = guard.state().clone();
                game.cash_out()?;
                self.mines_step(guard, user_id, game).await?
            }
            MinesAction::Cancel { session_id } => {
                let guard = self.mines.lock(session_id, user_id).await?;
                let mut game = guard.state().clone();
                game.cancel()?;
                self.mines_step(guard, user_id, game).await?
            }
            MinesAction::Status { session_id } => {
                let guard = self.mines.lock(session_id, user_id).await?;
                SessionReply::ongoing(guard.id(), to_json(guard.state())?)
            }
            MinesAction::Active => {
                let mut active = Vec::new();
                for id in self.mines.owned_by(user_id).await {
                    // Sessions may finish between listing and locking.
                    if let Ok(guard) = self.mines.lock(id, user_id).await {
                        active.push(ActiveGame {
                            session_id: id,
                            game: to_json(guard.state())?,
                        });
                    }
                }
                return to_json(&active);
            }
        };

        to_json(&reply)
    }

    /// A user plays one mines board at a time: starting a new one forfeits the rest.
    async fn forfeit_mines(&self, user_id: &str, boards: Vec<Uuid>) -> Result<(), ServiceError> {
        for id in boards {
            let Ok(guard) = self.mines.lock(id, user_id).await else {
                continue;
            };
            let mut game = guard.state().clone();
            game.cancel()?;
            self.conclude(guard, user_id, &game).await?;
            log::info!("User {} forfeited mines session {}.", user_id, id);
        }
        Ok(())
    }

    async fn mines_step(
        &self,
        guard: SessionGuard<Mines>,
        user_id: &str,
        game: Mines,
    ) -> Result<SessionReply, ServiceError> {
        match game.status {
            Status::Playing => {
                let view = to_json(&game)?;
                Ok(self.keep(guard, game, view))
            }
            Status::Won | Status::Exploded | Status::CashedOut | Status::Cancelled => {
                self.conclude(guard, user_id, &game).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::fixtures;
    use sqlx::PgPool;
    use std::time::Duration;

    fn handler(pool: &PgPool) -> SessionRequestHandler {
        let ttl = Duration::from_secs(600);
        SessionRequestHandler::new(pool.clone(), ttl, ttl)
    }

    fn start() -> MinesAction {
        MinesAction::Start {
            stake: 100,
            difficulty: Difficulty::Facil,
        }
    }

    #[sqlx::test]
    async fn test_new_board_forfeits_the_previous_one(pool: PgPool) {
        let user = fixtures::user(&pool, "ana", 200).await;
        let handler = handler(&pool);

        handler.mines(&user, start()).await.unwrap();
        let second = handler.mines(&user, start()).await.unwrap();

        let active = handler.mines(&user, MinesAction::Active).await.unwrap();
        let active = active.as_array().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0]["session_id"], second["session_id"]);
        assert_eq!(fixtures::balance(&pool, &user).await, 0);
    }

    #[sqlx::test]
    async fn test_unaffordable_start_keeps_the_open_board(pool: PgPool) {
        let user = fixtures::user(&pool, "ana", 100).await;
        let handler = handler(&pool);

        let first = handler.mines(&user, start()).await.unwrap();
        let error = handler.mines(&user, start()).await.unwrap_err();
        assert!(matches!(error, ServiceError::InsufficientBalance));

        let active = handler.mines(&user, MinesAction::Active).await.unwrap();
        let active = active.as_array().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0]["session_id"], first["session_id"]);
    }
}
