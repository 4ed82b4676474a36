use rand::{rngs::StdRng, SeedableRng};
use uuid::Uuid;

use super::{to_json, SessionReply, SessionRequestHandler};
use crate::games::poker::{Action, Poker};
use crate::games::sessions::SessionGuard;
use crate::services::ServiceError;

pub enum PokerAction {
    Start {
        buy_in: i64,
        small_blind: i64,
    },
    Act {
        session_id: Uuid,
        action: Action,
        amount: i64,
    },
    Surrender {
        session_id: Uuid,
    },
    Status {
        session_id: Uuid,
    },
}

impl SessionRequestHandler {
    pub(super) async fn poker(
        &self,
        user_id: &str,
        action: PokerAction,
    ) -> Result<serde_json::Value, ServiceError> {
        let reply = match action {
            PokerAction::Start {
                buy_in,
                small_blind,
            } => {
                let game = Poker::start(buy_in, small_blind, &mut StdRng::from_entropy())?;
                let view = to_json(&game)?;
                self.open(&self.poker, user_id, buy_in, view, game).await?
            }
            PokerAction::Act {
                session_id,
                action,
                amount,
            } => {
                let guard = self.poker.lock(session_id, user_id).await?;
                let mut game = guard.state().clone();
                game.act(action, amount, &mut StdRng::from_entropy())?;
                self.poker_step(guard, user_id, game).await?
            }
            PokerAction::Surrender { session_id } => {
                let guard = self.poker.lock(session_id, user_id).await?;
                let mut game = guard.state().clone();
                game.surrender()?;
                self.poker_step(guard, user_id, game).await?
            }
            PokerAction::Status { session_id } => {
                let guard = self.poker.lock(session_id, user_id).await?;
                SessionReply::ongoing(guard.id(), to_json(guard.state())?)
            }
        };

        to_json(&reply)
    }

    async fn poker_step(
        &self,
        guard: SessionGuard<Poker>,
        user_id: &str,
        game: Poker,
    ) -> Result<SessionReply, ServiceError> {
        if game.is_finished() {
            self.conclude(guard, user_id, &game).await
        } else {
            let view = to_json(&game)?;
            Ok(self.keep(guard, game, view))
        }
    }
}
