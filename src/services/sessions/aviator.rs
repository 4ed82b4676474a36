use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use tokio::time::Instant;
use uuid::Uuid;

use super::{to_json, SessionReply, SessionRequestHandler};
use crate::games::aviator::{self, Aviator, FlightState};
use crate::games::sessions::SessionGuard;
use crate::services::ServiceError;

const HISTORY_SIZE: i64 = 20;

/// A flight and the moment it took off. Multipliers are always worked out
/// from the server clock.
#[derive(Clone)]
pub struct Flight {
    game: Aviator,
    launched_at: Instant,
}

pub enum AviatorAction {
    Start {
        stake: i64,
    },
    Status {
        session_id: Uuid,
    },
    Cashout {
        session_id: Uuid,
    },
    AutoCashout {
        session_id: Uuid,
        target: f64,
        enabled: bool,
    },
    History,
    Stats,
}

#[derive(Serialize)]
struct CrashEntry {
    multiplier: f64,
    color: &'static str,
    at: chrono::DateTime<chrono::Utc>,
}

impl SessionRequestHandler {
    pub(super) async fn aviator(
        &self,
        user_id: &str,
        action: AviatorAction,
    ) -> Result<serde_json::Value, ServiceError> {
        let reply = match action {
            AviatorAction::Start { stake } => {
                let game = Aviator::launch(stake, &mut StdRng::from_entropy())?;
                let view = to_json(&game.view())?;
                let flight = Flight {
                    game,
                    launched_at: Instant::now(),
                };
                self.open(&self.aviator, user_id, stake, view, flight)
                    .await?
            }
            AviatorAction::Status { session_id } => {
                let guard = self.aviator.lock(session_id, user_id).await?;
                let mut flight = guard.state().clone();
                flight.game.advance(flight.launched_at.elapsed());
                self.aviator_step(guard, user_id, flight).await?
            }
            AviatorAction::Cashout { session_id } => {
                let guard = self.aviator.lock(session_id, user_id).await?;
                let mut flight = guard.state().clone();
                flight.game.cash_out(flight.launched_at.elapsed())?;
                self.aviator_step(guard, user_id, flight).await?
            }
            AviatorAction::AutoCashout {
                session_id,
                target,
                enabled,
            } => {
                if !target.is_finite() || target < 0.0 {
                    return Err(ServiceError::BadRequest(
                        "Invalid auto cash-out target".to_string(),
                    ));
                }
                let guard = self.aviator.lock(session_id, user_id).await?;
                let mut flight = guard.state().clone();
                // The flight may already be over by the time the target arrives.
                if !flight.game.advance(flight.launched_at.elapsed()) {
                    flight
                        .game
                        .configure_auto_cashout((target * 100.0).round() as u32, enabled)?;
                }
                self.aviator_step(guard, user_id, flight).await?
            }
            AviatorAction::History => {
                let history: Vec<CrashEntry> = self
                    .rounds
                    .get_crash_history(user_id, HISTORY_SIZE)
                    .await?
                    .into_iter()
                    .map(|point| {
                        let crash = point.crash.max(0) as u32;
                        CrashEntry {
                            multiplier: aviator::as_multiplier(crash),
                            color: aviator::color(crash),
                            at: point.created_at,
                        }
                    })
                    .collect();
                return to_json(&history);
            }
            AviatorAction::Stats => {
                let stats = self.rounds.get_aviator_stats(user_id).await?;
                return to_json(&stats);
            }
        };

        to_json(&reply)
    }

    async fn aviator_step(
        &self,
        guard: SessionGuard<Flight>,
        user_id: &str,
        flight: Flight,
    ) -> Result<SessionReply, ServiceError> {
        match flight.game.state {
            FlightState::Flying => {
                let view = to_json(&flight.game.view())?;
                Ok(self.keep(guard, flight, view))
            }
            FlightState::CashedOut | FlightState::Exploded => {
                self.conclude(guard, user_id, &flight.game).await
            }
        }
    }
}
