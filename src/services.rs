use std::time::Duration;

use async_trait::async_trait;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use tokio::sync::mpsc;

use crate::games::{sessions::SessionError, GameError};
use crate::repositories::Rejection;
use crate::settings::Settings;
use crate::utils::local_offset;

mod draws;
mod games;
mod http;
mod investments;
mod sessions;
mod transactions;
mod users;

const CHANNEL_CAPACITY: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Insufficient balance")]
    InsufficientBalance,
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Internal(_)
            | ServiceError::Database(_)
            | ServiceError::Communication(_, _) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::BadRequest(_) | ServiceError::InsufficientBalance => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<Rejection>() {
            Ok(Rejection::InsufficientBalance) => ServiceError::InsufficientBalance,
            Ok(Rejection::Invalid(message)) => ServiceError::BadRequest(message),
            Ok(Rejection::NotFound(message)) => ServiceError::NotFound(message),
            Ok(Rejection::Forbidden(message)) => ServiceError::Forbidden(message),
            Err(error) => ServiceError::Database(error.to_string()),
        }
    }
}

impl From<GameError> for ServiceError {
    fn from(error: GameError) -> Self {
        ServiceError::BadRequest(error.to_string())
    }
}

impl From<SessionError> for ServiceError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::NotFound => ServiceError::NotFound(error.to_string()),
            SessionError::Forbidden => ServiceError::Forbidden(error.to_string()),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{}", self);
            return (
                status,
                Json(json!({
                    "error": "Internal server error",
                    "details": self.to_string()
                })),
            )
                .into_response();
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

/// Spawns every service and then serves HTTP until the listener fails.
pub async fn start_services(pool: PgPool, settings: Settings) -> Result<(), anyhow::Error> {
    let (user_tx, mut user_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (transaction_tx, mut transaction_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (investment_tx, mut investment_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (draw_tx, mut draw_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (game_tx, mut game_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (session_tx, mut session_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let mut user_service = users::UserService::new();
    let mut transaction_service = transactions::TransactionService::new();
    let mut investment_service = investments::InvestmentService::new();
    let mut draw_service = draws::DrawService::new();
    let mut game_service = games::GameService::new();
    let mut session_service = sessions::SessionService::new();

    let offset = local_offset(settings.time.utc_offset_hours);

    log::info!("Starting user service.");
    let user_handler = users::UserRequestHandler::new(
        pool.clone(),
        settings.auth.token_ttl_minutes,
        settings.uploads.dir.clone(),
        offset,
    );
    tokio::spawn(async move {
        user_service.run(user_handler, &mut user_rx).await;
    });

    log::info!("Starting transaction service.");
    let transaction_handler =
        transactions::TransactionRequestHandler::new(pool.clone(), settings.uploads.dir.clone());
    tokio::spawn(async move {
        transaction_service
            .run(transaction_handler, &mut transaction_rx)
            .await;
    });

    log::info!("Starting investment service.");
    let investment_handler = investments::InvestmentRequestHandler::new(pool.clone(), offset);
    tokio::spawn(async move {
        investment_service
            .run(investment_handler, &mut investment_rx)
            .await;
    });

    log::info!("Starting draw service.");
    let draw_handler = draws::DrawRequestHandler::new(pool.clone(), settings.draw.clone(), offset);
    tokio::spawn(async move {
        draw_service.run(draw_handler, &mut draw_rx).await;
    });

    log::info!("Starting game service.");
    let game_handler = games::GameRequestHandler::new(pool.clone());
    tokio::spawn(async move {
        game_service.run(game_handler, &mut game_rx).await;
    });

    log::info!("Starting session service.");
    let session_handler = sessions::SessionRequestHandler::new(
        pool.clone(),
        Duration::from_secs(settings.games.session_ttl_minutes * 60),
        Duration::from_secs(settings.games.poker_session_ttl_minutes * 60),
    );
    session_handler.start_sweepers(Duration::from_secs(settings.games.sweep_interval_secs));
    tokio::spawn(async move {
        session_service
            .run(session_handler, &mut session_rx)
            .await;
    });

    log::info!("Starting HTTP server.");
    let channels = http::Channels {
        users: user_tx,
        transactions: transaction_tx,
        investments: investment_tx,
        draws: draw_tx,
        games: game_tx,
        sessions: session_tx,
    };
    http::start_http_server(
        &settings.server.listen,
        channels,
        settings.auth.admin_username.clone(),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_map_to_client_errors() {
        let error: ServiceError = anyhow::Error::from(Rejection::InsufficientBalance).into();
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);

        let error: ServiceError = anyhow::Error::from(Rejection::NotFound("x".into())).into();
        assert_eq!(error.status(), StatusCode::NOT_FOUND);

        let error: ServiceError = anyhow::anyhow!("connection reset").into();
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_game_and_session_errors() {
        assert_eq!(
            ServiceError::from(GameError::Finished).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::from(SessionError::Forbidden).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::from(SessionError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
    }
}
