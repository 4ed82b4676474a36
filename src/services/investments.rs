use async_trait::async_trait;
use chrono::{FixedOffset, Utc};
use sqlx::PgPool;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::{investments, users::User};
use crate::repositories::investments::InvestmentRepository;

pub enum InvestmentRequest {
    Deposit {
        user: User,
        amount: i64,
        response: oneshot::Sender<Result<(investments::InvestmentStatus, i64), ServiceError>>,
    },
    GetStatus {
        user_id: String,
        response: oneshot::Sender<Result<investments::Portfolio, ServiceError>>,
    },
    WithdrawInterest {
        user_id: String,
        investment_id: String,
        response: oneshot::Sender<Result<investments::Payout, ServiceError>>,
    },
    WithdrawCapital {
        user_id: String,
        investment_id: String,
        response: oneshot::Sender<Result<investments::Payout, ServiceError>>,
    },
    GetHistory {
        user_id: String,
        response: oneshot::Sender<Result<Vec<investments::InvestmentHistory>, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct InvestmentRequestHandler {
    repository: InvestmentRepository,
    offset: FixedOffset,
}

impl InvestmentRequestHandler {
    pub fn new(sql_conn: PgPool, offset: FixedOffset) -> Self {
        InvestmentRequestHandler {
            repository: InvestmentRepository::new(sql_conn),
            offset,
        }
    }

    async fn deposit(
        &self,
        user: User,
        amount: i64,
    ) -> Result<(investments::InvestmentStatus, i64), ServiceError> {
        investments::validate_principal(amount, user.balance).map_err(ServiceError::BadRequest)?;

        let now = Utc::now();
        let (investment, balance) = self
            .repository
            .insert_investment(&user.id, amount, now)
            .await?;
        log::info!("User {} invested {}.", user.id, amount);

        Ok((investment.status(now), balance))
    }

    async fn get_status(&self, user_id: &str) -> Result<investments::Portfolio, ServiceError> {
        let active = self.repository.get_active_investments(user_id).await?;

        Ok(investments::portfolio(&active, Utc::now()))
    }

    async fn withdraw_interest(
        &self,
        user_id: &str,
        investment_id: &str,
    ) -> Result<investments::Payout, ServiceError> {
        let payout = self
            .repository
            .withdraw_interest(user_id, investment_id, Utc::now(), self.offset)
            .await?;
        log::info!(
            "User {} withdrew {} of interest from {}.",
            user_id,
            payout.amount,
            investment_id
        );
        Ok(payout)
    }

    async fn withdraw_capital(
        &self,
        user_id: &str,
        investment_id: &str,
    ) -> Result<investments::Payout, ServiceError> {
        let payout = self
            .repository
            .withdraw_capital(user_id, investment_id, Utc::now(), self.offset)
            .await?;
        log::info!(
            "User {} closed investment {} for {}.",
            user_id,
            investment_id,
            payout.amount
        );
        Ok(payout)
    }
}

#[async_trait]
impl RequestHandler<InvestmentRequest> for InvestmentRequestHandler {
    async fn handle_request(&self, request: InvestmentRequest) {
        match request {
            InvestmentRequest::Deposit {
                user,
                amount,
                response,
            } => {
                let _ = response.send(self.deposit(user, amount).await);
            }
            InvestmentRequest::GetStatus { user_id, response } => {
                let _ = response.send(self.get_status(&user_id).await);
            }
            InvestmentRequest::WithdrawInterest {
                user_id,
                investment_id,
                response,
            } => {
                let _ = response.send(self.withdraw_interest(&user_id, &investment_id).await);
            }
            InvestmentRequest::WithdrawCapital {
                user_id,
                investment_id,
                response,
            } => {
                let _ = response.send(self.withdraw_capital(&user_id, &investment_id).await);
            }
            InvestmentRequest::GetHistory { user_id, response } => {
                let history = self.repository.get_history(&user_id).await;
                let _ = response.send(history.map_err(ServiceError::from));
            }
        }
    }
}

pub struct InvestmentService;

impl InvestmentService {
    pub fn new() -> Self {
        InvestmentService {}
    }
}

#[async_trait]
impl Service<InvestmentRequest, InvestmentRequestHandler> for InvestmentService {}
