use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use super::{dispatch, AdminUser, AppState, AuthUser};
use crate::models::draws::NewEntry;
use crate::services::draws::DrawRequest;
use crate::services::ServiceError;

type Reply = Result<(StatusCode, Json<Value>), ServiceError>;

pub(super) async fn enter(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(entry): Json<NewEntry>,
) -> Reply {
    let (participant, balance) = dispatch(&state.channels.draws, |response| DrawRequest::Enter {
        user,
        cost: entry.cost,
        response,
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Entered the VIP draw",
            "participant": participant,
            "balance": balance
        })),
    ))
}

pub(super) async fn next_draw(State(state): State<AppState>) -> Reply {
    let next = dispatch(&state.channels.draws, |response| DrawRequest::GetNextDraw {
        response,
    })
    .await?;

    Ok((StatusCode::OK, Json(json!(next))))
}

pub(super) async fn results(State(state): State<AppState>) -> Reply {
    let results = dispatch(&state.channels.draws, |response| DrawRequest::GetResults {
        response,
    })
    .await?;

    Ok((StatusCode::OK, Json(json!(results))))
}

pub(super) async fn participants(State(state): State<AppState>, AdminUser(_): AdminUser) -> Reply {
    let participants = dispatch(&state.channels.draws, |response| {
        DrawRequest::GetParticipants { response }
    })
    .await?;

    Ok((StatusCode::OK, Json(json!(participants))))
}

pub(super) async fn draw(State(state): State<AppState>, AdminUser(admin): AdminUser) -> Reply {
    log::info!("Admin {} running the VIP draw.", admin.username);
    let result = dispatch(&state.channels.draws, |response| DrawRequest::Draw {
        response,
    })
    .await?;

    Ok((StatusCode::OK, Json(json!(result))))
}

pub(super) async fn clear(State(state): State<AppState>, AdminUser(admin): AdminUser) -> Reply {
    log::info!("Admin {} clearing the VIP draw.", admin.username);
    let cleared = dispatch(&state.channels.draws, |response| DrawRequest::Clear {
        response,
    })
    .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Participants cleared",
            "cleared": cleared
        })),
    ))
}
