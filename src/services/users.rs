use async_trait::async_trait;
use chrono::{Duration, FixedOffset, Utc};
use sqlx::PgPool;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::{
    referrals,
    users::{self, daily_bonus_amount},
    verifications::{self, Verification},
};
use crate::repositories::users::UserRepository;
use crate::utils::{
    hash_password, local_date, new_token, sanitize_file_name, verify_password, PASSWORD_COST,
};

const DEFAULT_REJECTION_REASON: &str = "Sin comentarios";

/// A file received in a multipart form.
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

pub enum UserRequest {
    Register {
        new_user: users::NewUser,
        response: oneshot::Sender<Result<users::Profile, ServiceError>>,
    },
    Login {
        credentials: users::Credentials,
        response: oneshot::Sender<Result<users::AuthToken, ServiceError>>,
    },
    Authenticate {
        token: String,
        response: oneshot::Sender<Result<users::User, ServiceError>>,
    },
    GetReferrals {
        user: users::User,
        response: oneshot::Sender<Result<referrals::ReferralSummary, ServiceError>>,
    },
    ClaimDailyBonus {
        user: users::User,
        response: oneshot::Sender<Result<users::DailyBonus, ServiceError>>,
    },
    RequestVerification {
        user: users::User,
        upload: Upload,
        response: oneshot::Sender<Result<Verification, ServiceError>>,
    },
    GetPendingVerifications {
        response: oneshot::Sender<Result<Vec<verifications::PendingVerification>, ServiceError>>,
    },
    ApproveVerification {
        user_id: String,
        response: oneshot::Sender<Result<verifications::VerificationApproval, ServiceError>>,
    },
    RejectVerification {
        user_id: String,
        reason: Option<String>,
        response: oneshot::Sender<Result<verifications::VerificationRejection, ServiceError>>,
    },
    GetUsers {
        response: oneshot::Sender<Result<Vec<users::Profile>, ServiceError>>,
    },
    DeleteUser {
        admin: users::User,
        user_id: String,
        response: oneshot::Sender<Result<users::Profile, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct UserRequestHandler {
    repository: UserRepository,
    token_ttl_minutes: i64,
    uploads_dir: String,
    offset: FixedOffset,
}

impl UserRequestHandler {
    pub fn new(
        sql_conn: PgPool,
        token_ttl_minutes: i64,
        uploads_dir: String,
        offset: FixedOffset,
    ) -> Self {
        let repository = UserRepository::new(sql_conn);

        UserRequestHandler {
            repository,
            token_ttl_minutes,
            uploads_dir,
            offset,
        }
    }

    async fn register(&self, new_user: users::NewUser) -> Result<users::Profile, ServiceError> {
        new_user.validate().map_err(ServiceError::BadRequest)?;

        let password = new_user.password.clone();
        let hash = tokio::task::spawn_blocking(move || hash_password(&password, PASSWORD_COST))
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        let (user, referred_by) = self.repository.insert_user(&new_user, &hash).await?;

        match referred_by {
            Some(referrer) => log::info!(
                "Registered user {} ({}) referred by {}.",
                user.username,
                user.id,
                referrer
            ),
            None => log::info!("Registered user {} ({}).", user.username, user.id),
        }
        Ok(user.into())
    }

    async fn login(&self, credentials: users::Credentials) -> Result<users::AuthToken, ServiceError> {
        let invalid = || ServiceError::Unauthorized("Invalid username or password".to_string());

        let user = self
            .repository
            .get_user_by_login(&credentials.username)
            .await?
            .ok_or_else(invalid)?;
        let password = credentials.password.clone();
        let stored = user.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        if !matches {
            return Err(invalid());
        }

        let token = new_token();
        let expires_at = Utc::now() + Duration::minutes(self.token_ttl_minutes);
        self.repository
            .insert_token(&user.id, &token, expires_at)
            .await?;

        Ok(users::AuthToken {
            access_token: token,
            token_type: "bearer",
            expires_in: self.token_ttl_minutes * 60,
            user_id: user.id,
            username: user.username,
        })
    }

    async fn authenticate(&self, token: &str) -> Result<users::User, ServiceError> {
        self.repository
            .get_user_by_token(token)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid or expired token".to_string()))
    }

    async fn get_referrals(
        &self,
        user: users::User,
    ) -> Result<referrals::ReferralSummary, ServiceError> {
        let (direct, second_level) = self.repository.get_referrals(&user.id).await?;

        Ok(referrals::summarize(user.referral_code, direct, second_level))
    }

    async fn claim_daily_bonus(&self, user: users::User) -> Result<users::DailyBonus, ServiceError> {
        let today = local_date(Utc::now(), self.offset);
        let amount = daily_bonus_amount(user.verified);

        match self
            .repository
            .claim_daily_bonus(&user.id, today, amount)
            .await?
        {
            Some(balance) => {
                log::info!("User {} claimed the daily bonus of {}.", user.id, amount);
                Ok(users::DailyBonus {
                    amount,
                    balance,
                    claimed_on: today,
                })
            }
            None => Err(ServiceError::BadRequest(
                "Daily bonus already claimed today".to_string(),
            )),
        }
    }

    async fn request_verification(
        &self,
        user: users::User,
        upload: Upload,
    ) -> Result<Verification, ServiceError> {
        if user.verified {
            return Err(ServiceError::BadRequest(
                "User is already verified".to_string(),
            ));
        }
        if upload.bytes.is_empty() {
            return Err(ServiceError::BadRequest("Empty file".to_string()));
        }

        let path = format!(
            "{}/{}_{}",
            self.uploads_dir,
            user.id,
            sanitize_file_name(&upload.file_name)
        );
        tokio::fs::write(&path, &upload.bytes)
            .await
            .map_err(|e| ServiceError::Internal(format!("Could not store {}: {}", path, e)))?;

        let verification = self.repository.insert_verification(&user.id, &path).await?;
        log::info!("User {} requested verification.", user.id);
        Ok(verification)
    }

    async fn approve_verification(
        &self,
        user_id: &str,
    ) -> Result<verifications::VerificationApproval, ServiceError> {
        let approval = self.repository.approve_verification(user_id).await?;
        log::info!(
            "Verified user {}; referral bonuses paid: {:?}.",
            user_id,
            approval.referral_bonuses
        );
        Ok(approval)
    }

    async fn reject_verification(
        &self,
        user_id: &str,
        reason: Option<String>,
    ) -> Result<verifications::VerificationRejection, ServiceError> {
        let reason = reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REJECTION_REASON.to_string());
        let rejection = self
            .repository
            .reject_verification(user_id, reason)
            .await?;
        log::info!("Rejected verification of user {}.", user_id);
        Ok(rejection)
    }

    async fn get_users(&self) -> Result<Vec<users::Profile>, ServiceError> {
        let users = self.repository.get_users().await?;
        Ok(users.into_iter().map(users::Profile::from).collect())
    }

    async fn delete_user(
        &self,
        admin: users::User,
        user_id: &str,
    ) -> Result<users::Profile, ServiceError> {
        if admin.id == user_id {
            return Err(ServiceError::BadRequest(
                "The administrator cannot be deleted".to_string(),
            ));
        }

        let user = self.repository.delete_user(user_id).await?;
        log::warn!(
            "Admin {} deleted user {} ({}) with balance {}.",
            admin.username,
            user.username,
            user.id,
            user.balance
        );
        Ok(user.into())
    }
}

#[async_trait]
impl RequestHandler<UserRequest> for UserRequestHandler {
    async fn handle_request(&self, request: UserRequest) {
        match request {
            UserRequest::Register { new_user, response } => {
                let _ = response.send(self.register(new_user).await);
            }
            UserRequest::Login {
                credentials,
                response,
            } => {
                let _ = response.send(self.login(credentials).await);
            }
            UserRequest::Authenticate { token, response } => {
                let _ = response.send(self.authenticate(&token).await);
            }
            UserRequest::GetReferrals { user, response } => {
                let _ = response.send(self.get_referrals(user).await);
            }
            UserRequest::ClaimDailyBonus { user, response } => {
                let _ = response.send(self.claim_daily_bonus(user).await);
            }
            UserRequest::RequestVerification {
                user,
                upload,
                response,
            } => {
                let _ = response.send(self.request_verification(user, upload).await);
            }
            UserRequest::GetPendingVerifications { response } => {
                let pending = self
                    .repository
                    .get_pending_verifications()
                    .await
                    .map_err(ServiceError::from);
                let _ = response.send(pending);
            }
            UserRequest::ApproveVerification { user_id, response } => {
                let _ = response.send(self.approve_verification(&user_id).await);
            }
            UserRequest::RejectVerification {
                user_id,
                reason,
                response,
            } => {
                let _ = response.send(self.reject_verification(&user_id, reason).await);
            }
            UserRequest::GetUsers { response } => {
                let _ = response.send(self.get_users().await);
            }
            UserRequest::DeleteUser {
                admin,
                user_id,
                response,
            } => {
                let _ = response.send(self.delete_user(admin, &user_id).await);
            }
        }
    }
}

pub struct UserService;

impl UserService {
    pub fn new() -> Self {
        UserService {}
    }
}

#[async_trait]
impl Service<UserRequest, UserRequestHandler> for UserService {}
