use async_trait::async_trait;
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::games::{
    cascades, coin_flip, dice, high_card, paylines, roulette, rps, slots, wheel, Wager,
};
use crate::models::{rounds, users::User};
use crate::repositories::rounds::RoundRepository;

/// One-shot games, resolved and settled within a single request.
pub enum InstantPlay {
    Dice {
        stake: i64,
    },
    Wheel,
    Slots {
        stake: i64,
    },
    Paylines {
        bet_per_line: i64,
        lines: usize,
    },
    Cascades {
        board: cascades::Board,
        stake: i64,
    },
    CoinFlip {
        stake: i64,
        choice: coin_flip::Side,
    },
    HighCard {
        stake: i64,
    },
    Rps {
        stake: i64,
        hand: rps::Hand,
    },
    Roulette {
        bets: Vec<roulette::BetRequest>,
    },
}

#[derive(Debug, Serialize)]
pub struct PlayedRound {
    pub game: &'static str,
    pub round: serde_json::Value,
    #[serde(flatten)]
    pub settlement: rounds::Settlement,
}

pub enum GameRequest {
    Play {
        user: User,
        play: InstantPlay,
        response: oneshot::Sender<Result<PlayedRound, ServiceError>>,
    },
    GetHistory {
        user_id: String,
        response: oneshot::Sender<Result<Vec<rounds::Round>, ServiceError>>,
    },
    GetStats {
        user_id: String,
        response: oneshot::Sender<Result<Vec<rounds::GameStats>, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct GameRequestHandler {
    repository: RoundRepository,
}

impl GameRequestHandler {
    pub fn new(sql_conn: PgPool) -> Self {
        GameRequestHandler {
            repository: RoundRepository::new(sql_conn),
        }
    }

    async fn settle<W: Wager + Sync>(&self, user: &User, round: W) -> Result<PlayedRound, ServiceError> {
        let settlement = self.repository.settle_instant(&user.id, &round).await?;
        log::info!(
            "User {} played {}: stake {}, payout {}, balance {}.",
            user.id,
            round.game(),
            settlement.stake,
            settlement.payout,
            settlement.balance
        );

        Ok(PlayedRound {
            game: round.game(),
            round: serde_json::to_value(&round)
                .map_err(|e| ServiceError::Internal(e.to_string()))?,
            settlement,
        })
    }

    async fn play(&self, user: User, play: InstantPlay) -> Result<PlayedRound, ServiceError> {
        let mut rng = StdRng::from_entropy();

        match play {
            InstantPlay::Dice { stake } => {
                let round = dice::play(stake, &mut rng)?;
                self.settle(&user, round).await
            }
            InstantPlay::Wheel => {
                if user.balance < wheel::SPIN_COST {
                    return Err(ServiceError::InsufficientBalance);
                }
                let round = wheel::spin(&mut rng);
                self.settle(&user, round).await
            }
            InstantPlay::Slots { stake } => {
                let round = slots::play(stake, &mut rng)?;
                self.settle(&user, round).await
            }
            InstantPlay::Paylines {
                bet_per_line,
                lines,
            } => {
                let round = paylines::play(bet_per_line, lines, &mut rng)?;
                self.settle(&user, round).await
            }
            InstantPlay::Cascades { board, stake } => {
                let round = cascades::play(board, stake, &mut rng)?;
                self.settle(&user, round).await
            }
            InstantPlay::CoinFlip { stake, choice } => {
                let round = coin_flip::play(stake, choice, &mut rng)?;
                self.settle(&user, round).await
            }
            InstantPlay::HighCard { stake } => {
                let round = high_card::play(stake, &mut rng)?;
                self.settle(&user, round).await
            }
            InstantPlay::Rps { stake, hand } => {
                let round = rps::play(stake, hand, &mut rng)?;
                self.settle(&user, round).await
            }
            InstantPlay::Roulette { bets } => {
                let round = roulette::play(&bets, &mut rng)?;
                self.settle(&user, round).await
            }
        }
    }
}

#[async_trait]
impl RequestHandler<GameRequest> for GameRequestHandler {
    async fn handle_request(&self, request: GameRequest) {
        match request {
            GameRequest::Play {
                user,
                play,
                response,
            } => {
                let _ = response.send(self.play(user, play).await);
            }
            GameRequest::GetHistory { user_id, response } => {
                let history = self.repository.get_history(&user_id).await;
                let _ = response.send(history.map_err(ServiceError::from));
            }
            GameRequest::GetStats { user_id, response } => {
                let stats = self.repository.get_stats(&user_id).await;
                let _ = response.send(stats.map_err(ServiceError::from));
            }
        }
    }
}

pub struct GameService;

impl GameService {
    pub fn new() -> Self {
        GameService {}
    }
}

#[async_trait]
impl Service<GameRequest, GameRequestHandler> for GameService {}
