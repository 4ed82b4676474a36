use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{dispatch, optional_json, AdminUser, AppState, AuthUser};
use crate::models::transactions::NewWithdrawal;
use crate::services::transactions::TransactionRequest;
use crate::services::users::Upload;
use crate::services::ServiceError;

type Reply = Result<(StatusCode, Json<Value>), ServiceError>;

#[derive(Default, Deserialize)]
struct WithdrawalNote {
    note: Option<String>,
}

/// Text fields and the receipt of a deposit form.
#[derive(Default)]
struct DepositForm {
    amount: Option<String>,
    method: Option<String>,
    receipt: Option<Upload>,
}

async fn read_deposit_form(multipart: &mut Multipart) -> Result<DepositForm, ServiceError> {
    let mut form = DepositForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "amount" => {
                form.amount = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ServiceError::BadRequest(e.body_text()))?,
                )
            }
            "method" => {
                form.method = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ServiceError::BadRequest(e.body_text()))?,
                )
            }
            "receipt" => {
                let file_name = field.file_name().unwrap_or("recibo").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServiceError::BadRequest(e.body_text()))?;
                form.receipt = Some(Upload {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    Ok(form)
}

pub(super) async fn request_deposit(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Reply {
    let form = read_deposit_form(&mut multipart).await?;
    let amount = form
        .amount
        .as_deref()
        .and_then(|amount| amount.trim().parse::<i64>().ok())
        .ok_or_else(|| ServiceError::BadRequest("A numeric amount is required".to_string()))?;
    let method = form.method.unwrap_or_default();

    let deposit = dispatch(&state.channels.transactions, |response| {
        TransactionRequest::NewDeposit {
            user,
            amount,
            method,
            receipt: form.receipt,
            response,
        }
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Deposit requested",
            "deposit": deposit
        })),
    ))
}

pub(super) async fn my_deposits(State(state): State<AppState>, AuthUser(user): AuthUser) -> Reply {
    let deposits = dispatch(&state.channels.transactions, |response| {
        TransactionRequest::GetUserDeposits {
            user_id: user.id,
            response,
        }
    })
    .await?;

    Ok((StatusCode::OK, Json(json!(deposits))))
}

pub(super) async fn deposit_detail(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Reply {
    let is_admin = user.username == state.admin_username;
    let deposit = dispatch(&state.channels.transactions, |response| {
        TransactionRequest::GetDeposit {
            user_id: user.id,
            is_admin,
            id,
            response,
        }
    })
    .await?;

    Ok((StatusCode::OK, Json(json!(deposit))))
}

pub(super) async fn request_withdrawal(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(withdrawal): Json<NewWithdrawal>,
) -> Reply {
    let withdrawal = dispatch(&state.channels.transactions, |response| {
        TransactionRequest::NewWithdrawal {
            user,
            withdrawal,
            response,
        }
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Withdrawal requested",
            "withdrawal": withdrawal
        })),
    ))
}

pub(super) async fn my_withdrawals(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Reply {
    let withdrawals = dispatch(&state.channels.transactions, |response| {
        TransactionRequest::GetUserWithdrawals {
            user_id: user.id,
            response,
        }
    })
    .await?;

    Ok((StatusCode::OK, Json(json!(withdrawals))))
}

pub(super) async fn pending_deposits(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Reply {
    let deposits = dispatch(&state.channels.transactions, |response| {
        TransactionRequest::GetPendingDeposits { response }
    })
    .await?;

    Ok((StatusCode::OK, Json(json!(deposits))))
}

pub(super) async fn pending_withdrawals(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Reply {
    let withdrawals = dispatch(&state.channels.transactions, |response| {
        TransactionRequest::GetPendingWithdrawals { response }
    })
    .await?;

    Ok((StatusCode::OK, Json(json!(withdrawals))))
}

pub(super) async fn approve_deposit(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Reply {
    log::info!("Admin {} approving deposit {}.", admin.username, id);
    let (deposit, balance) = dispatch(&state.channels.transactions, |response| {
        TransactionRequest::ApproveDeposit { id, response }
    })
    .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "deposit": deposit,
            "balance": balance
        })),
    ))
}

pub(super) async fn reject_deposit(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Reply {
    log::info!("Admin {} rejecting deposit {}.", admin.username, id);
    let deposit = dispatch(&state.channels.transactions, |response| {
        TransactionRequest::RejectDeposit { id, response }
    })
    .await?;

    Ok((StatusCode::OK, Json(json!(deposit))))
}

pub(super) async fn approve_withdrawal(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Reply {
    log::info!("Admin {} approving withdrawal {}.", admin.username, id);
    let decision = dispatch(&state.channels.transactions, |response| {
        TransactionRequest::ApproveWithdrawal { id, response }
    })
    .await?;

    Ok((StatusCode::OK, Json(json!(decision))))
}

pub(super) async fn reject_withdrawal(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    body: Bytes,
) -> Reply {
    log::info!("Admin {} rejecting withdrawal {}.", admin.username, id);
    let note = optional_json::<WithdrawalNote>(&body)?.note;
    let withdrawal = dispatch(&state.channels.transactions, |response| {
        TransactionRequest::RejectWithdrawal { id, note, response }
    })
    .await?;

    Ok((StatusCode::OK, Json(json!(withdrawal))))
}
