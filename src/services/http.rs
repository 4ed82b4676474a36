use axum::{
    extract::{DefaultBodyLimit, FromRequestParts},
    http::{header, request::Parts},
    routing::{delete, get, post},
    Router,
};
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;

use super::{
    draws::DrawRequest, games::GameRequest, investments::InvestmentRequest,
    sessions::SessionRequest, transactions::TransactionRequest, users::UserRequest, ServiceError,
};
use crate::models::users::User;

mod draws;
mod games;
mod investments;
mod sessions;
mod transactions;
mod users;

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct Channels {
    pub users: mpsc::Sender<UserRequest>,
    pub transactions: mpsc::Sender<TransactionRequest>,
    pub investments: mpsc::Sender<InvestmentRequest>,
    pub draws: mpsc::Sender<DrawRequest>,
    pub games: mpsc::Sender<GameRequest>,
    pub sessions: mpsc::Sender<SessionRequest>,
}

#[derive(Clone)]
struct AppState {
    channels: Channels,
    admin_username: String,
}

/// Sends a request to a service and waits for its reply.
async fn dispatch<T, R>(
    channel: &mpsc::Sender<T>,
    request: impl FnOnce(oneshot::Sender<Result<R, ServiceError>>) -> T,
) -> Result<R, ServiceError> {
    let (response_tx, response_rx) = oneshot::channel();

    channel.send(request(response_tx)).await.map_err(|e| {
        ServiceError::Communication("Failed to process request".to_string(), e.to_string())
    })?;

    response_rx.await.map_err(|e| {
        ServiceError::Communication("Failed to receive response".to_string(), e.to_string())
    })?
}

/// Parses an optional JSON body. An empty body gives the default value.
fn optional_json<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ServiceError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ServiceError::BadRequest(e.to_string()))
}

/// The user behind the request's bearer token.
struct AuthUser(User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ServiceError::Unauthorized("Missing bearer token".to_string()))?;

        let user = dispatch(&state.channels.users, |response| UserRequest::Authenticate {
            token,
            response,
        })
        .await?;

        Ok(AuthUser(user))
    }
}

/// An authenticated user that is also the configured administrator.
struct AdminUser(User);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if user.username != state.admin_username {
            log::warn!("User {} tried to reach {}.", user.id, parts.uri.path());
            return Err(ServiceError::Forbidden("Admin access required".to_string()));
        }
        Ok(AdminUser(user))
    }
}

fn router(state: AppState) -> Router {
    let accounts = Router::new()
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        .route("/me", get(users::me))
        .route("/usuario/info", get(users::info))
        .route("/referidos", get(users::referrals))
        .route("/bono-diario", post(users::claim_daily_bonus))
        .route("/verificacion", post(users::request_verification))
        .route("/admin/usuarios", get(users::list_users))
        .route("/admin/usuarios/{user_id}", delete(users::delete_user))
        .route("/admin/verificaciones", get(users::pending_verifications))
        .route(
            "/admin/verificaciones/{user_id}/aprobar",
            post(users::approve_verification),
        )
        .route(
            "/admin/verificaciones/{user_id}/rechazar",
            post(users::reject_verification),
        );

    let money = Router::new()
        .route(
            "/depositos",
            get(transactions::my_deposits).post(transactions::request_deposit),
        )
        .route("/depositos/{id}", get(transactions::deposit_detail))
        .route(
            "/retiros",
            get(transactions::my_withdrawals).post(transactions::request_withdrawal),
        )
        .route("/admin/depositos", get(transactions::pending_deposits))
        .route(
            "/admin/depositos/{id}/aprobar",
            post(transactions::approve_deposit),
        )
        .route(
            "/admin/depositos/{id}/rechazar",
            post(transactions::reject_deposit),
        )
        .route("/admin/retiros", get(transactions::pending_withdrawals))
        .route(
            "/admin/retiros/{id}/aprobar",
            post(transactions::approve_withdrawal),
        )
        .route(
            "/admin/retiros/{id}/rechazar",
            post(transactions::reject_withdrawal),
        )
        .route(
            "/inversiones",
            get(investments::status).post(investments::deposit),
        )
        .route("/inversiones/historial", get(investments::history))
        .route(
            "/inversiones/{id}/retirar-intereses",
            post(investments::withdraw_interest),
        )
        .route(
            "/inversiones/{id}/retirar-capital",
            post(investments::withdraw_capital),
        );

    let draw = Router::new()
        .route("/sorteo/participar", post(draws::enter))
        .route("/sorteo/proximo", get(draws::next_draw))
        .route("/sorteo/resultados", get(draws::results))
        .route("/admin/sorteo/participantes", get(draws::participants))
        .route("/admin/sorteo/realizar", post(draws::draw))
        .route("/admin/sorteo/limpiar", post(draws::clear));

    let instant_games = Router::new()
        .route("/juegos/dados", post(games::dice))
        .route("/juegos/dados/config", get(games::dice_config))
        .route("/juegos/ruleta", post(games::wheel))
        .route("/juegos/ruleta/config", get(games::wheel_config))
        .route("/juegos/tragamonedas", post(games::slots))
        .route("/juegos/tragamonedas/estadisticas", get(games::slots_stats))
        .route("/juegos/tragamonedas5", post(games::paylines))
        .route("/juegos/tragamonedas5/config", get(games::paylines_config))
        .route("/juegos/cascadas", post(games::cascades))
        .route("/juegos/cascadas/config", get(games::cascades_config))
        .route("/juegos/cara-sello", post(games::coin_flip))
        .route("/juegos/carta-mayor", post(games::high_card))
        .route(
            "/juegos/carta-mayor/probabilidades",
            get(games::high_card_probabilities),
        )
        .route("/juegos/piedra-papel-tijera", post(games::rps))
        .route(
            "/juegos/piedra-papel-tijera/probabilidades",
            get(games::rps_probabilities),
        )
        .route("/juegos/ruleta-europea", post(games::roulette))
        .route(
            "/juegos/ruleta-europea/probabilidades",
            get(games::roulette_probabilities),
        )
        .route("/juegos/historial", get(games::history))
        .route("/juegos/estadisticas", get(games::stats));

    let session_games = Router::new()
        .route("/juegos/blackjack/iniciar", post(sessions::blackjack_start))
        .route("/juegos/blackjack/pedir", post(sessions::blackjack_hit))
        .route("/juegos/blackjack/plantarse", post(sessions::blackjack_stand))
        .route(
            "/juegos/blackjack/estado/{session_id}",
            get(sessions::blackjack_status),
        )
        .route("/juegos/aviator/iniciar", post(sessions::aviator_start))
        .route("/juegos/aviator/cashout", post(sessions::aviator_cashout))
        .route(
            "/juegos/aviator/auto-cashout",
            post(sessions::aviator_auto_cashout),
        )
        .route(
            "/juegos/aviator/estado/{session_id}",
            get(sessions::aviator_status),
        )
        .route("/juegos/aviator/historial", get(sessions::aviator_history))
        .route("/juegos/aviator/estadisticas", get(sessions::aviator_stats))
        .route("/juegos/minas/config", get(sessions::mines_config))
        .route("/juegos/minas/iniciar", post(sessions::mines_start))
        .route("/juegos/minas/abrir", post(sessions::mines_open))
        .route("/juegos/minas/bandera", post(sessions::mines_flag))
        .route("/juegos/minas/cashout", post(sessions::mines_cashout))
        .route("/juegos/minas/cancelar", post(sessions::mines_cancel))
        .route(
            "/juegos/minas/estado/{session_id}",
            get(sessions::mines_status),
        )
        .route("/juegos/minas/activas", get(sessions::mines_active))
        .route("/juegos/poker/config", get(sessions::poker_config))
        .route("/juegos/poker/iniciar", post(sessions::poker_start))
        .route("/juegos/poker/accion", post(sessions::poker_act))
        .route("/juegos/poker/rendirse", post(sessions::poker_surrender))
        .route(
            "/juegos/poker/estado/{session_id}",
            get(sessions::poker_status),
        );

    Router::new()
        .merge(accounts)
        .merge(money)
        .merge(draw)
        .merge(instant_games)
        .merge(session_games)
        .route("/health", get(|| async { "OK" }))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_http_server(
    listen: &str,
    channels: Channels,
    admin_username: String,
) -> Result<(), anyhow::Error> {
    let app = router(AppState {
        channels,
        admin_username,
    });

    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use chrono::Utc;
    use tower::ServiceExt;

    fn test_state() -> (AppState, mpsc::Receiver<UserRequest>) {
        let (users, users_rx) = mpsc::channel(8);
        let channels = Channels {
            users,
            transactions: mpsc::channel(1).0,
            investments: mpsc::channel(1).0,
            draws: mpsc::channel(1).0,
            games: mpsc::channel(1).0,
            sessions: mpsc::channel(1).0,
        };
        let state = AppState {
            channels,
            admin_username: "admin".to_string(),
        };
        (state, users_rx)
    }

    fn player(username: &str) -> User {
        User {
            id: "user-1".to_string(),
            email: format!("{}@example.com", username),
            username: username.to_string(),
            password_hash: String::new(),
            balance: 1000,
            referral_code: "ABCD1234".to_string(),
            referred_by: None,
            verified: false,
            verification_pending: false,
            last_daily_bonus: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Answers every authentication with the given user.
    fn serve_tokens(mut users_rx: mpsc::Receiver<UserRequest>, user: User) {
        tokio::spawn(async move {
            while let Some(request) = users_rx.recv().await {
                if let UserRequest::Authenticate { token, response } = request {
                    let reply = if token == "valid" {
                        Ok(user.clone())
                    } else {
                        Err(ServiceError::Unauthorized("Invalid or expired token".to_string()))
                    };
                    let _ = response.send(reply);
                }
            }
        });
    }

    fn get_with_token(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut request = Request::builder().uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        request.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_optional_json() {
        #[derive(Default, serde::Deserialize)]
        struct Note {
            note: Option<String>,
        }

        assert!(optional_json::<Note>(b"").unwrap().note.is_none());
        assert_eq!(
            optional_json::<Note>(br#"{"note": "late"}"#).unwrap().note.as_deref(),
            Some("late")
        );
        assert!(optional_json::<Note>(b"{").is_err());
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _users_rx) = test_state();
        let response = router(state)
            .oneshot(get_with_token("/health", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_bearer_is_unauthorized() {
        let (state, _users_rx) = test_state();
        let response = router(state)
            .oneshot(get_with_token("/me", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_token_is_unauthorized() {
        let (state, users_rx) = test_state();
        serve_tokens(users_rx, player("ana"));

        let response = router(state)
            .oneshot(get_with_token("/usuario/info", Some("stale")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_routes_reject_players() {
        let (state, users_rx) = test_state();
        serve_tokens(users_rx, player("ana"));

        let response = router(state)
            .oneshot(get_with_token("/admin/depositos", Some("valid")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_deletes_user() {
        let (state, mut users_rx) = test_state();
        tokio::spawn(async move {
            while let Some(request) = users_rx.recv().await {
                match request {
                    UserRequest::Authenticate { response, .. } => {
                        let _ = response.send(Ok(player("admin")));
                    }
                    UserRequest::DeleteUser {
                        admin,
                        user_id,
                        response,
                    } => {
                        assert_eq!(admin.username, "admin");
                        assert_eq!(user_id, "user-2");
                        let _ = response.send(Ok(player("beto").into()));
                    }
                    _ => {}
                }
            }
        });

        let request = Request::builder()
            .method("DELETE")
            .uri("/admin/usuarios/user-2")
            .header(header::AUTHORIZATION, "Bearer valid")
            .body(Body::empty())
            .unwrap();
        let response = router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let reply: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(reply["user"]["username"], "beto");
    }

    #[tokio::test]
    async fn test_user_info() {
        let (state, users_rx) = test_state();
        serve_tokens(users_rx, player("ana"));

        let response = router(state)
            .oneshot(get_with_token("/usuario/info", Some("valid")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let info: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(info["username"], "ana");
        assert_eq!(info["balance"], 1000);
    }

    #[tokio::test]
    async fn test_public_game_tables() {
        let (state, _users_rx) = test_state();
        let response = router(state)
            .oneshot(get_with_token("/juegos/dados/config", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
