//! Multi-step games. The stake is taken when a session opens; finishing it
//! credits the payout and records the round, so over the whole session the
//! balance moves by `payout - stake`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::{RequestHandler, Service, ServiceError};
use crate::games::{
    blackjack::Blackjack,
    mines::Mines,
    poker::Poker,
    sessions::{SessionGuard, SessionStore},
    Wager,
};
use crate::models::rounds::Settlement;
use crate::repositories::rounds::RoundRepository;

mod aviator;
mod blackjack;
mod mines;
mod poker;

pub use aviator::AviatorAction;
use aviator::Flight;
pub use blackjack::BlackjackAction;
pub use mines::MinesAction;
pub use poker::PokerAction;

#[derive(Debug, Serialize)]
pub struct SessionReply {
    pub session_id: Uuid,
    pub game: serde_json::Value,
    pub finished: bool,
    pub settlement: Option<Settlement>,
    /// Balance after the stake was taken, when the session just opened.
    pub balance: Option<i64>,
}

impl SessionReply {
    fn ongoing(session_id: Uuid, game: serde_json::Value) -> Self {
        SessionReply {
            session_id,
            game,
            finished: false,
            settlement: None,
            balance: None,
        }
    }
}

pub enum SessionRequest {
    Blackjack {
        user_id: String,
        action: BlackjackAction,
        response: oneshot::Sender<Result<serde_json::Value, ServiceError>>,
    },
    Aviator {
        user_id: String,
        action: AviatorAction,
        response: oneshot::Sender<Result<serde_json::Value, ServiceError>>,
    },
    Mines {
        user_id: String,
        action: MinesAction,
        response: oneshot::Sender<Result<serde_json::Value, ServiceError>>,
    },
    Poker {
        user_id: String,
        action: PokerAction,
        response: oneshot::Sender<Result<serde_json::Value, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct SessionRequestHandler {
    rounds: RoundRepository,
    blackjack: SessionStore<Blackjack>,
    aviator: SessionStore<Flight>,
    mines: SessionStore<Mines>,
    poker: SessionStore<Poker>,
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, ServiceError> {
    serde_json::to_value(value).map_err(|e| ServiceError::Internal(e.to_string()))
}

impl SessionRequestHandler {
    pub fn new(sql_conn: PgPool, ttl: Duration, poker_ttl: Duration) -> Self {
        SessionRequestHandler {
            rounds: RoundRepository::new(sql_conn),
            blackjack: SessionStore::new(ttl),
            aviator: SessionStore::new(ttl),
            mines: SessionStore::new(ttl),
            poker: SessionStore::new(poker_ttl),
        }
    }

    pub fn start_sweepers(&self, every: Duration) {
        self.blackjack.start_sweeper("blackjack", every);
        self.aviator.start_sweeper("aviator", every);
        self.mines.start_sweeper("minas", every);
        self.poker.start_sweeper("poker", every);
    }

    /// Takes the stake and stores the new session.
    async fn open<S: Send + 'static>(
        &self,
        store: &SessionStore<S>,
        user_id: &str,
        stake: i64,
        view: serde_json::Value,
        state: S,
    ) -> Result<SessionReply, ServiceError> {
        let balance = self.rounds.debit_stake(user_id, stake).await?;
        let id = store.insert(user_id, state);
        log::info!("User {} opened session {} with stake {}.", user_id, id, stake);

        Ok(SessionReply {
            session_id: id,
            game: view,
            finished: false,
            settlement: None,
            balance: Some(balance),
        })
    }

    /// Keeps the updated state in the session.
    fn keep<S>(
        &self,
        mut guard: SessionGuard<S>,
        state: S,
        view: serde_json::Value,
    ) -> SessionReply {
        guard.replace(state);
        SessionReply::ongoing(guard.id(), view)
    }

    /// Pays out a finished game and closes its session. The session is only
    /// closed once the payout is committed.
    async fn conclude<S, W: Wager + Sync>(
        &self,
        guard: SessionGuard<S>,
        user_id: &str,
        wager: &W,
    ) -> Result<SessionReply, ServiceError> {
        let settlement = self.rounds.settle_session(user_id, wager).await?;
        let id = guard.id();
        guard.finish();
        log::info!(
            "User {} settled {} session {}: stake {}, payout {}, balance {}.",
            user_id,
            wager.game(),
            id,
            settlement.stake,
            settlement.payout,
            settlement.balance
        );

        Ok(SessionReply {
            session_id: id,
            game: to_json(wager)?,
            finished: true,
            settlement: Some(settlement),
            balance: None,
        })
    }
}

#[async_trait]
impl RequestHandler<SessionRequest> for SessionRequestHandler {
    async fn handle_request(&self, request: SessionRequest) {
        match request {
            SessionRequest::Blackjack {
                user_id,
                action,
                response,
            } => {
                let reply = self.blackjack(&user_id, action).await;
                let _ = response.send(reply);
            }
            SessionRequest::Aviator {
                user_id,
                action,
                response,
            } => {
                let reply = self.aviator(&user_id, action).await;
                let _ = response.send(reply);
            }
            SessionRequest::Mines {
                user_id,
                action,
                response,
            } => {
                let reply = self.mines(&user_id, action).await;
                let _ = response.send(reply);
            }
            SessionRequest::Poker {
                user_id,
                action,
                response,
            } => {
                let reply = self.poker(&user_id, action).await;
                let _ = response.send(reply);
            }
        }
    }
}

pub struct SessionService;

impl SessionService {
    pub fn new() -> Self {
        SessionService {}
    }
}

#[async_trait]
impl Service<SessionRequest, SessionRequestHandler> for SessionService {}
