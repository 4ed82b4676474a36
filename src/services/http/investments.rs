use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use super::{dispatch, AppState, AuthUser};
use crate::models::investments::NewInvestment;
use crate::services::investments::InvestmentRequest;
use crate::services::ServiceError;

type Reply = Result<(StatusCode, Json<Value>), ServiceError>;

pub(super) async fn deposit(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(investment): Json<NewInvestment>,
) -> Reply {
    let (investment, balance) = dispatch(&state.channels.investments, |response| {
        InvestmentRequest::Deposit {
            user,
            amount: investment.amount,
            response,
        }
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Investment created",
            "investment": investment,
            "balance": balance
        })),
    ))
}

pub(super) async fn status(State(state): State<AppState>, AuthUser(user): AuthUser) -> Reply {
    let portfolio = dispatch(&state.channels.investments, |response| {
        InvestmentRequest::GetStatus {
            user_id: user.id,
            response,
        }
    })
    .await?;

    Ok((StatusCode::OK, Json(json!(portfolio))))
}

pub(super) async fn withdraw_interest(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(investment_id): Path<String>,
) -> Reply {
    let payout = dispatch(&state.channels.investments, |response| {
        InvestmentRequest::WithdrawInterest {
            user_id: user.id,
            investment_id,
            response,
        }
    })
    .await?;

    Ok((StatusCode::OK, Json(json!(payout))))
}

pub(super) async fn withdraw_capital(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(investment_id): Path<String>,
) -> Reply {
    let payout = dispatch(&state.channels.investments, |response| {
        InvestmentRequest::WithdrawCapital {
            user_id: user.id,
            investment_id,
            response,
        }
    })
    .await?;

    Ok((StatusCode::OK, Json(json!(payout))))
}

pub(super) async fn history(State(state): State<AppState>, AuthUser(user): AuthUser) -> Reply {
    let history = dispatch(&state.channels.investments, |response| {
        InvestmentRequest::GetHistory {
            user_id: user.id,
            response,
        }
    })
    .await?;

    Ok((StatusCode::OK, Json(json!(history))))
}
