use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{dispatch, AppState, AuthUser};
use crate::games::{
    cascades, coin_flip, dice, high_card, paylines, roulette, rps, slots, wheel, MAX_STAKE,
    STANDARD_STAKES,
};
use crate::services::games::{GameRequest, InstantPlay};
use crate::services::ServiceError;

type Reply = Result<(StatusCode, Json<Value>), ServiceError>;

#[derive(Deserialize)]
pub(super) struct StakeRequest {
    stake: i64,
}

#[derive(Deserialize)]
pub(super) struct PaylinesRequest {
    bet_per_line: i64,
    lines: usize,
}

#[derive(Deserialize)]
pub(super) struct CascadesRequest {
    board: cascades::Board,
    stake: i64,
}

#[derive(Deserialize)]
pub(super) struct CoinFlipRequest {
    stake: i64,
    choice: coin_flip::Side,
}

#[derive(Deserialize)]
pub(super) struct RpsRequest {
    stake: i64,
    hand: rps::Hand,
}

#[derive(Deserialize)]
pub(super) struct RouletteRequest {
    bets: Vec<roulette::BetRequest>,
}

async fn play(state: &AppState, user: crate::models::users::User, play: InstantPlay) -> Reply {
    let round = dispatch(&state.channels.games, |response| GameRequest::Play {
        user,
        play,
        response,
    })
    .await?;

    Ok((StatusCode::OK, Json(json!(round))))
}

pub(super) async fn dice(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<StakeRequest>,
) -> Reply {
    play(&state, user, InstantPlay::Dice { stake: request.stake }).await
}

pub(super) async fn dice_config() -> Json<Value> {
    Json(json!({
        "stakes": STANDARD_STAKES,
        "multipliers": {
            "double_six": dice::DOUBLE_SIX_MULTIPLIER,
            "double": dice::DOUBLE_MULTIPLIER
        }
    }))
}

pub(super) async fn wheel(State(state): State<AppState>, AuthUser(user): AuthUser) -> Reply {
    play(&state, user, InstantPlay::Wheel).await
}

pub(super) async fn wheel_config() -> Json<Value> {
    let slots = wheel::slot_count();
    let prizes: Vec<Value> = [
        wheel::Prize::Mega,
        wheel::Prize::Grand,
        wheel::Prize::Double,
        wheel::Prize::FreeSpin,
        wheel::Prize::Nothing,
    ]
    .iter()
    .map(|prize| {
        let count = (0..slots).filter(|i| wheel::prize_at(*i) == *prize).count();
        json!({
            "prize": prize,
            "label": prize.label(),
            "multiplier": prize.multiplier(),
            "slots": count,
            "probability": count as f64 / slots as f64
        })
    })
    .collect();

    Json(json!({
        "cost": wheel::SPIN_COST,
        "slots": slots,
        "prizes": prizes
    }))
}

pub(super) async fn slots(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<StakeRequest>,
) -> Reply {
    play(&state, user, InstantPlay::Slots { stake: request.stake }).await
}

pub(super) async fn slots_stats() -> Json<Value> {
    let symbols: Vec<Value> = slots::SYMBOLS
        .iter()
        .map(|symbol| {
            json!({
                "symbol": symbol,
                "probability": symbol.weight() as f64 / 1000.0,
                "multiplier": symbol.multiplier()
            })
        })
        .collect();
    let win_chances: Vec<Value> = STANDARD_STAKES
        .iter()
        .map(|stake| json!({ "stake": stake, "win_chance": slots::win_chance(*stake) }))
        .collect();

    Json(json!({
        "stakes": STANDARD_STAKES,
        "symbols": symbols,
        "win_chances": win_chances
    }))
}

pub(super) async fn paylines(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<PaylinesRequest>,
) -> Reply {
    play(
        &state,
        user,
        InstantPlay::Paylines {
            bet_per_line: request.bet_per_line,
            lines: request.lines,
        },
    )
    .await
}

pub(super) async fn paylines_config() -> Json<Value> {
    let symbols: Vec<Value> = paylines::SYMBOLS
        .iter()
        .map(|symbol| {
            json!({
                "symbol": symbol,
                "weight": symbol.weight(),
                "pays": symbol.paytable()
            })
        })
        .collect();

    Json(json!({
        "reels": paylines::REELS,
        "rows": paylines::ROWS,
        "line_bets": paylines::LINE_BETS,
        "paylines": paylines::PAYLINES,
        "symbols": symbols
    }))
}

pub(super) async fn cascades(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<CascadesRequest>,
) -> Reply {
    play(
        &state,
        user,
        InstantPlay::Cascades {
            board: request.board,
            stake: request.stake,
        },
    )
    .await
}

pub(super) async fn cascades_config() -> Json<Value> {
    let boards: Vec<Value> = [cascades::Board::Small, cascades::Board::Large]
        .iter()
        .map(|board| {
            let config = board.config();
            json!({
                "board": board,
                "size": config.size,
                "base_multiplier": config.base_tenths as f64 / 10.0,
                "min_bet": config.min_bet,
                "max_bet": config.max_bet
            })
        })
        .collect();
    let combos: Vec<Value> = (3..=10)
        .map(|length| json!({ "length": length, "multiplier": cascades::combo_multiplier(length) }))
        .collect();
    let bonuses: Vec<Value> = (1..=6)
        .map(|level| {
            json!({
                "level": level,
                "bonus": cascades::cascade_bonus_tenths(level) as f64 / 10.0
            })
        })
        .collect();

    Json(json!({
        "boards": boards,
        "symbol_weights": cascades::SYMBOL_WEIGHTS,
        "combos": combos,
        "cascade_bonus": bonuses
    }))
}

pub(super) async fn coin_flip(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<CoinFlipRequest>,
) -> Reply {
    play(
        &state,
        user,
        InstantPlay::CoinFlip {
            stake: request.stake,
            choice: request.choice,
        },
    )
    .await
}

pub(super) async fn high_card(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<StakeRequest>,
) -> Reply {
    play(&state, user, InstantPlay::HighCard { stake: request.stake }).await
}

pub(super) async fn high_card_probabilities() -> Json<Value> {
    let (win, tie, loss) = high_card::probabilities();

    Json(json!({
        "min_stake": high_card::MIN_STAKE,
        "max_stake": MAX_STAKE,
        "player_ranges": high_card::PLAYER_RANGES,
        "house_range": high_card::HOUSE_RANGE,
        "win": win,
        "tie": tie,
        "loss": loss,
        "win_multiplier": high_card::WIN_MULTIPLIER
    }))
}

pub(super) async fn rps(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<RpsRequest>,
) -> Reply {
    play(
        &state,
        user,
        InstantPlay::Rps {
            stake: request.stake,
            hand: request.hand,
        },
    )
    .await
}

pub(super) async fn rps_probabilities() -> Json<Value> {
    let third = 1.0 / 3.0;

    Json(json!({
        "min_stake": rps::MIN_STAKE,
        "max_stake": MAX_STAKE,
        "win": third,
        "tie": third,
        "loss": third,
        "win_multiplier": rps::WIN_MULTIPLIER
    }))
}

pub(super) async fn roulette(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<RouletteRequest>,
) -> Reply {
    play(&state, user, InstantPlay::Roulette { bets: request.bets }).await
}

pub(super) async fn roulette_probabilities() -> Json<Value> {
    let bets: Vec<Value> = roulette::probabilities()
        .into_iter()
        .map(|(kind, probability, multiplier)| {
            json!({
                "kind": kind,
                "probability": probability,
                "multiplier": multiplier
            })
        })
        .collect();

    Json(json!({
        "min_bet": roulette::MIN_BET,
        "max_bet": roulette::MAX_BET,
        "bets": bets
    }))
}

pub(super) async fn history(State(state): State<AppState>, AuthUser(user): AuthUser) -> Reply {
    let rounds = dispatch(&state.channels.games, |response| GameRequest::GetHistory {
        user_id: user.id,
        response,
    })
    .await?;

    Ok((StatusCode::OK, Json(json!(rounds))))
}

pub(super) async fn stats(State(state): State<AppState>, AuthUser(user): AuthUser) -> Reply {
    let stats = dispatch(&state.channels.games, |response| GameRequest::GetStats {
        user_id: user.id,
        response,
    })
    .await?;

    Ok((StatusCode::OK, Json(json!(stats))))
}
