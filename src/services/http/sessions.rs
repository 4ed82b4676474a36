use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{dispatch, AppState, AuthUser};
use crate::games::{
    mines::{self, Difficulty},
    poker::{self, Action},
    MAX_STAKE,
};
use crate::services::sessions::{
    AviatorAction, BlackjackAction, MinesAction, PokerAction, SessionRequest,
};
use crate::services::ServiceError;

type Reply = Result<(StatusCode, Json<Value>), ServiceError>;

#[derive(Deserialize)]
pub(super) struct StakeRequest {
    stake: i64,
}

#[derive(Deserialize)]
pub(super) struct SessionTarget {
    session_id: Uuid,
}

#[derive(Deserialize)]
pub(super) struct AutoCashoutRequest {
    session_id: Uuid,
    target: f64,
    #[serde(default = "enabled_by_default")]
    enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Deserialize)]
pub(super) struct MinesStart {
    stake: i64,
    difficulty: Difficulty,
}

#[derive(Deserialize)]
pub(super) struct MinesCell {
    session_id: Uuid,
    row: usize,
    col: usize,
}

#[derive(Deserialize)]
pub(super) struct PokerStart {
    buy_in: i64,
    small_blind: i64,
}

#[derive(Deserialize)]
pub(super) struct PokerMove {
    session_id: Uuid,
    action: Action,
    #[serde(default)]
    amount: i64,
}

fn reply(game: Value) -> Reply {
    Ok((StatusCode::OK, Json(game)))
}

async fn blackjack(state: &AppState, user_id: String, action: BlackjackAction) -> Reply {
    let game = dispatch(&state.channels.sessions, |response| SessionRequest::Blackjack {
        user_id,
        action,
        response,
    })
    .await?;
    reply(game)
}

async fn aviator(state: &AppState, user_id: String, action: AviatorAction) -> Reply {
    let game = dispatch(&state.channels.sessions, |response| SessionRequest::Aviator {
        user_id,
        action,
        response,
    })
    .await?;
    reply(game)
}

async fn mines(state: &AppState, user_id: String, action: MinesAction) -> Reply {
    let game = dispatch(&state.channels.sessions, |response| SessionRequest::Mines {
        user_id,
        action,
        response,
    })
    .await?;
    reply(game)
}

async fn poker(state: &AppState, user_id: String, action: PokerAction) -> Reply {
    let game = dispatch(&state.channels.sessions, |response| SessionRequest::Poker {
        user_id,
        action,
        response,
    })
    .await?;
    reply(game)
}

pub(super) async fn blackjack_start(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<StakeRequest>,
) -> Reply {
    let action = BlackjackAction::Start {
        stake: request.stake,
    };
    blackjack(&state, user.id, action).await
}

pub(super) async fn blackjack_hit(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(target): Json<SessionTarget>,
) -> Reply {
    let action = BlackjackAction::Hit {
        session_id: target.session_id,
    };
    blackjack(&state, user.id, action).await
}

pub(super) async fn blackjack_stand(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(target): Json<SessionTarget>,
) -> Reply {
    let action = BlackjackAction::Stand {
        session_id: target.session_id,
    };
    blackjack(&state, user.id, action).await
}

pub(super) async fn blackjack_status(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
) -> Reply {
    blackjack(&state, user.id, BlackjackAction::Status { session_id }).await
}

pub(super) async fn aviator_start(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<StakeRequest>,
) -> Reply {
    let action = AviatorAction::Start {
        stake: request.stake,
    };
    aviator(&state, user.id, action).await
}

pub(super) async fn aviator_cashout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(target): Json<SessionTarget>,
) -> Reply {
    let action = AviatorAction::Cashout {
        session_id: target.session_id,
    };
    aviator(&state, user.id, action).await
}

pub(super) async fn aviator_auto_cashout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<AutoCashoutRequest>,
) -> Reply {
    let action = AviatorAction::AutoCashout {
        session_id: request.session_id,
        target: request.target,
        enabled: request.enabled,
    };
    aviator(&state, user.id, action).await
}

pub(super) async fn aviator_status(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
) -> Reply {
    aviator(&state, user.id, AviatorAction::Status { session_id }).await
}

pub(super) async fn aviator_history(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Reply {
    aviator(&state, user.id, AviatorAction::History).await
}

pub(super) async fn aviator_stats(State(state): State<AppState>, AuthUser(user): AuthUser) -> Reply {
    aviator(&state, user.id, AviatorAction::Stats).await
}

pub(super) async fn mines_config() -> Json<Value> {
    let difficulties: Vec<Value> = [Difficulty::Facil, Difficulty::Medio, Difficulty::Dificil]
        .iter()
        .map(|difficulty| {
            let config = difficulty.config();
            json!({
                "difficulty": difficulty,
                "size": config.size,
                "mines": config.mines,
                "base_multiplier": config.base_milli as f64 / 1000.0
            })
        })
        .collect();

    Json(json!({
        "min_stake": mines::MIN_STAKE,
        "max_stake": MAX_STAKE,
        "stakes": mines::SUGGESTED_STAKES,
        "difficulties": difficulties
    }))
}

pub(super) async fn mines_start(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<MinesStart>,
) -> Reply {
    let action = MinesAction::Start {
        stake: request.stake,
        difficulty: request.difficulty,
    };
    mines(&state, user.id, action).await
}

pub(super) async fn mines_open(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(cell): Json<MinesCell>,
) -> Reply {
    let action = MinesAction::Open {
        session_id: cell.session_id,
        row: cell.row,
        col: cell.col,
    };
    mines(&state, user.id, action).await
}

pub(super) async fn mines_flag(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(cell): Json<MinesCell>,
) -> Reply {
    let action = MinesAction::Flag {
        session_id: cell.session_id,
        row: cell.row,
        col: cell.col,
    };
    mines(&state, user.id, action).await
}

pub(super) async fn mines_cashout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(target): Json<SessionTarget>,
) -> Reply {
    let action = MinesAction::Cashout {
        session_id: target.session_id,
    };
    mines(&state, user.id, action).await
}

pub(super) async fn mines_cancel(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(target): Json<SessionTarget>,
) -> Reply {
    let action = MinesAction::Cancel {
        session_id: target.session_id,
    };
    mines(&state, user.id, action).await
}

pub(super) async fn mines_status(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
) -> Reply {
    mines(&state, user.id, MinesAction::Status { session_id }).await
}

pub(super) async fn mines_active(State(state): State<AppState>, AuthUser(user): AuthUser) -> Reply {
    mines(&state, user.id, MinesAction::Active).await
}

pub(super) async fn poker_config() -> Json<Value> {
    let blinds: Vec<Value> = poker::SMALL_BLINDS
        .iter()
        .map(|small| json!({ "small_blind": small, "big_blind": small * 2 }))
        .collect();

    Json(json!({
        "buy_ins": poker::BUY_INS,
        "blinds": blinds
    }))
}

pub(super) async fn poker_start(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<PokerStart>,
) -> Reply {
    let action = PokerAction::Start {
        buy_in: request.buy_in,
        small_blind: request.small_blind,
    };
    poker(&state, user.id, action).await
}

pub(super) async fn poker_act(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<PokerMove>,
) -> Reply {
    let action = PokerAction::Act {
        session_id: request.session_id,
        action: request.action,
        amount: request.amount,
    };
    poker(&state, user.id, action).await
}

pub(super) async fn poker_surrender(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(target): Json<SessionTarget>,
) -> Reply {
    let action = PokerAction::Surrender {
        session_id: target.session_id,
    };
    poker(&state, user.id, action).await
}

pub(super) async fn poker_status(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
) -> Reply {
    poker(&state, user.id, PokerAction::Status { session_id }).await
}
