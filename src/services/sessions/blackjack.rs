use rand::{rngs::StdRng, SeedableRng};
use uuid::Uuid;

use super::{to_json, SessionReply, SessionRequestHandler};
use crate::games::blackjack::{Blackjack, Stage};
use crate::games::sessions::SessionGuard;
use crate::services::ServiceError;

pub enum BlackjackAction {
    Start { stake: i64 },
    Hit { session_id: Uuid },
    Stand { session_id: Uuid },
    Status { session_id: Uuid },
}

impl SessionRequestHandler {
    pub(super) async fn blackjack(
        &self,
        user_id: &str,
        action: BlackjackAction,
    ) -> Result<serde_json::Value, ServiceError> {
        let reply = match action {
            BlackjackAction::Start { stake } => {
                let game = Blackjack::deal(stake, &mut StdRng::from_entropy())?;
                let view = to_json(&game)?;
                self.open(&self.blackjack, user_id, game.stake, view, game)
                    .await?
            }
            BlackjackAction::Hit { session_id } => {
                let guard = self.blackjack.lock(session_id, user_id).await?;
                let mut game = guard.state().clone();
                game.hit()?;
                self.blackjack_step(guard, user_id, game).await?
            }
            BlackjackAction::Stand { session_id } => {
                let guard = self.blackjack.lock(session_id, user_id).await?;
                let mut game = guard.state().clone();
                game.stand()?;
                self.blackjack_step(guard, user_id, game).await?
            }
            BlackjackAction::Status { session_id } => {
                let guard = self.blackjack.lock(session_id, user_id).await?;
                SessionReply::ongoing(guard.id(), to_json(guard.state())?)
            }
        };

        to_json(&reply)
    }

    async fn blackjack_step(
        &self,
        guard: SessionGuard<Blackjack>,
        user_id: &str,
        game: Blackjack,
    ) -> Result<SessionReply, ServiceError> {
        match game.stage {
            Stage::Finished => self.conclude(guard, user_id, &game).await,
            Stage::Playing => {
                let view = to_json(&game)?;
                Ok(self.keep(guard, game, view))
            }
        }
    }
}
