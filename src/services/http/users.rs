use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{dispatch, optional_json, AdminUser, AppState, AuthUser};
use crate::models::users::{self, Profile};
use crate::services::users::{Upload, UserRequest};
use crate::services::ServiceError;

type Reply = Result<(StatusCode, Json<Value>), ServiceError>;

#[derive(Default, Deserialize)]
struct RejectionNote {
    reason: Option<String>,
}

pub(super) async fn register(
    State(state): State<AppState>,
    Json(new_user): Json<users::NewUser>,
) -> Reply {
    let profile = dispatch(&state.channels.users, |response| UserRequest::Register {
        new_user,
        response,
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered",
            "user": profile
        })),
    ))
}

pub(super) async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<users::Credentials>,
) -> Reply {
    let token = dispatch(&state.channels.users, |response| UserRequest::Login {
        credentials,
        response,
    })
    .await?;

    Ok((StatusCode::OK, Json(json!(token))))
}

pub(super) async fn me(AuthUser(user): AuthUser) -> Reply {
    Ok((StatusCode::OK, Json(json!(Profile::from(user)))))
}

pub(super) async fn info(AuthUser(user): AuthUser) -> Reply {
    Ok((
        StatusCode::OK,
        Json(json!({
            "id": user.id,
            "username": user.username,
            "balance": user.balance
        })),
    ))
}

pub(super) async fn referrals(State(state): State<AppState>, AuthUser(user): AuthUser) -> Reply {
    let summary = dispatch(&state.channels.users, |response| UserRequest::GetReferrals {
        user,
        response,
    })
    .await?;

    Ok((StatusCode::OK, Json(json!(summary))))
}

pub(super) async fn claim_daily_bonus(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Reply {
    let bonus = dispatch(&state.channels.users, |response| UserRequest::ClaimDailyBonus {
        user,
        response,
    })
    .await?;

    Ok((StatusCode::OK, Json(json!(bonus))))
}

/// Reads the first file field of a multipart form.
async fn read_upload(multipart: &mut Multipart) -> Result<Option<Upload>, ServiceError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::BadRequest(e.body_text()))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServiceError::BadRequest(e.body_text()))?;

        return Ok(Some(Upload {
            file_name,
            bytes: bytes.to_vec(),
        }));
    }

    Ok(None)
}

pub(super) async fn request_verification(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Reply {
    let upload = read_upload(&mut multipart)
        .await?
        .ok_or_else(|| ServiceError::BadRequest("A document file is required".to_string()))?;

    let verification = dispatch(&state.channels.users, |response| {
        UserRequest::RequestVerification {
            user,
            upload,
            response,
        }
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Verification requested",
            "verification": verification
        })),
    ))
}

pub(super) async fn pending_verifications(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Reply {
    let pending = dispatch(&state.channels.users, |response| {
        UserRequest::GetPendingVerifications { response }
    })
    .await?;

    Ok((StatusCode::OK, Json(json!(pending))))
}

pub(super) async fn approve_verification(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<String>,
) -> Reply {
    log::info!("Admin {} approving verification of {}.", admin.username, user_id);
    let approval = dispatch(&state.channels.users, |response| {
        UserRequest::ApproveVerification { user_id, response }
    })
    .await?;

    Ok((StatusCode::OK, Json(json!(approval))))
}

pub(super) async fn reject_verification(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<String>,
    body: Bytes,
) -> Reply {
    log::info!("Admin {} rejecting verification of {}.", admin.username, user_id);
    let reason = optional_json::<RejectionNote>(&body)?.reason;
    let rejection = dispatch(&state.channels.users, |response| {
        UserRequest::RejectVerification {
            user_id,
            reason,
            response,
        }
    })
    .await?;

    Ok((StatusCode::OK, Json(json!(rejection))))
}

pub(super) async fn list_users(State(state): State<AppState>, AdminUser(_): AdminUser) -> Reply {
    let users = dispatch(&state.channels.users, |response| UserRequest::GetUsers { response }).await?;

    Ok((StatusCode::OK, Json(json!(users))))
}

pub(super) async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<String>,
) -> Reply {
    let deleted = dispatch(&state.channels.users, |response| UserRequest::DeleteUser {
        admin,
        user_id,
        response,
    })
    .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": format!("User {} deleted", deleted.username),
            "user": deleted
        })),
    ))
}
