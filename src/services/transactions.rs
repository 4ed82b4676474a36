use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::oneshot;

use super::{users::Upload, RequestHandler, Service, ServiceError};
use crate::models::{transactions, users::User};
use crate::repositories::transactions::TransactionRepository;
use crate::utils::{new_id, sanitize_file_name};

pub enum TransactionRequest {
    NewDeposit {
        user: User,
        amount: i64,
        method: String,
        receipt: Option<Upload>,
        response: oneshot::Sender<Result<transactions::Deposit, ServiceError>>,
    },
    GetUserDeposits {
        user_id: String,
        response: oneshot::Sender<Result<Vec<transactions::Deposit>, ServiceError>>,
    },
    GetDeposit {
        user_id: String,
        is_admin: bool,
        id: String,
        response: oneshot::Sender<Result<transactions::Deposit, ServiceError>>,
    },
    NewWithdrawal {
        user: User,
        withdrawal: transactions::NewWithdrawal,
        response: oneshot::Sender<Result<transactions::Withdrawal, ServiceError>>,
    },
    GetUserWithdrawals {
        user_id: String,
        response: oneshot::Sender<Result<Vec<transactions::Withdrawal>, ServiceError>>,
    },
    GetPendingDeposits {
        response: oneshot::Sender<Result<Vec<transactions::PendingDeposit>, ServiceError>>,
    },
    GetPendingWithdrawals {
        response: oneshot::Sender<Result<Vec<transactions::PendingWithdrawal>, ServiceError>>,
    },
    ApproveDeposit {
        id: String,
        response: oneshot::Sender<Result<(transactions::Deposit, i64), ServiceError>>,
    },
    RejectDeposit {
        id: String,
        response: oneshot::Sender<Result<transactions::Deposit, ServiceError>>,
    },
    ApproveWithdrawal {
        id: String,
        response: oneshot::Sender<Result<transactions::WithdrawalDecision, ServiceError>>,
    },
    RejectWithdrawal {
        id: String,
        note: Option<String>,
        response: oneshot::Sender<Result<transactions::Withdrawal, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct TransactionRequestHandler {
    repository: TransactionRepository,
    uploads_dir: String,
}

impl TransactionRequestHandler {
    pub fn new(sql_conn: PgPool, uploads_dir: String) -> Self {
        TransactionRequestHandler {
            repository: TransactionRepository::new(sql_conn),
            uploads_dir,
        }
    }

    async fn store_receipt(&self, user_id: &str, receipt: &Upload) -> Result<String, ServiceError> {
        let path = format!(
            "{}/{}_{}_{}",
            self.uploads_dir,
            user_id,
            &new_id()[..8],
            sanitize_file_name(&receipt.file_name)
        );
        tokio::fs::write(&path, &receipt.bytes)
            .await
            .map_err(|e| ServiceError::Internal(format!("Could not store {}: {}", path, e)))?;

        Ok(path)
    }

    async fn new_deposit(
        &self,
        user: User,
        amount: i64,
        method: String,
        receipt: Option<Upload>,
    ) -> Result<transactions::Deposit, ServiceError> {
        let receipt = receipt.filter(|r| !r.bytes.is_empty());
        transactions::validate_deposit(amount, user.verified, receipt.is_some())
            .map_err(ServiceError::BadRequest)?;
        if method.trim().is_empty() {
            return Err(ServiceError::BadRequest("Payment method is required".to_string()));
        }

        let receipt_path = match &receipt {
            Some(receipt) => Some(self.store_receipt(&user.id, receipt).await?),
            None => None,
        };

        let deposit = self
            .repository
            .new_deposit(
                &user.id,
                &transactions::NewDeposit {
                    amount,
                    method,
                    receipt_path,
                },
            )
            .await?;

        log::info!(
            "Deposit {} of {} requested by user {}.",
            deposit.reference,
            deposit.amount,
            user.id
        );
        Ok(deposit)
    }

    async fn get_deposit(
        &self,
        user_id: &str,
        is_admin: bool,
        id: &str,
    ) -> Result<transactions::Deposit, ServiceError> {
        let deposit = self
            .repository
            .get_deposit(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Deposit not found".to_string()))?;

        if deposit.user_id != user_id && !is_admin {
            return Err(ServiceError::Forbidden(
                "You cannot see this deposit".to_string(),
            ));
        }
        Ok(deposit)
    }

    async fn new_withdrawal(
        &self,
        user: User,
        withdrawal: transactions::NewWithdrawal,
    ) -> Result<transactions::Withdrawal, ServiceError> {
        withdrawal
            .validate(user.balance, user.verified)
            .map_err(ServiceError::BadRequest)?;

        let withdrawal = self.repository.new_withdrawal(&user.id, &withdrawal).await?;
        log::info!(
            "Withdrawal {} of {} requested by user {}.",
            withdrawal.reference,
            withdrawal.amount,
            user.id
        );
        Ok(withdrawal)
    }

    async fn approve_deposit(&self, id: &str) -> Result<(transactions::Deposit, i64), ServiceError> {
        let (deposit, balance) = self.repository.approve_deposit(id).await?;
        log::info!(
            "Approved deposit {}: {} credited to user {}.",
            deposit.reference,
            deposit.amount,
            deposit.user_id
        );
        Ok((deposit, balance))
    }

    async fn approve_withdrawal(
        &self,
        id: &str,
    ) -> Result<transactions::WithdrawalDecision, ServiceError> {
        let decision = self.repository.approve_withdrawal(id).await?;
        let withdrawal = &decision.withdrawal;
        if decision.balance.is_some() {
            log::info!(
                "Approved withdrawal {}: {} debited from user {}.",
                withdrawal.reference,
                withdrawal.amount,
                withdrawal.user_id
            );
        } else {
            log::info!(
                "Withdrawal {} rejected at processing: insufficient balance.",
                withdrawal.reference
            );
        }
        Ok(decision)
    }
}

#[async_trait]
impl RequestHandler<TransactionRequest> for TransactionRequestHandler {
    async fn handle_request(&self, request: TransactionRequest) {
        match request {
            TransactionRequest::NewDeposit {
                user,
                amount,
                method,
                receipt,
                response,
            } => {
                let _ = response.send(self.new_deposit(user, amount, method, receipt).await);
            }
            TransactionRequest::GetUserDeposits { user_id, response } => {
                let deposits = self.repository.get_user_deposits(&user_id).await;
                let _ = response.send(deposits.map_err(ServiceError::from));
            }
            TransactionRequest::GetDeposit {
                user_id,
                is_admin,
                id,
                response,
            } => {
                let _ = response.send(self.get_deposit(&user_id, is_admin, &id).await);
            }
            TransactionRequest::NewWithdrawal {
                user,
                withdrawal,
                response,
            } => {
                let _ = response.send(self.new_withdrawal(user, withdrawal).await);
            }
            TransactionRequest::GetUserWithdrawals { user_id, response } => {
                let withdrawals = self.repository.get_user_withdrawals(&user_id).await;
                let _ = response.send(withdrawals.map_err(ServiceError::from));
            }
            TransactionRequest::GetPendingDeposits { response } => {
                let deposits = self.repository.get_pending_deposits().await;
                let _ = response.send(deposits.map_err(ServiceError::from));
            }
            TransactionRequest::GetPendingWithdrawals { response } => {
                let withdrawals = self.repository.get_pending_withdrawals().await;
                let _ = response.send(withdrawals.map_err(ServiceError::from));
            }
            TransactionRequest::ApproveDeposit { id, response } => {
                let _ = response.send(self.approve_deposit(&id).await);
            }
            TransactionRequest::RejectDeposit { id, response } => {
                let deposit = self.repository.reject_deposit(&id).await;
                if let Ok(deposit) = &deposit {
                    log::info!("Rejected deposit {}.", deposit.reference);
                }
                let _ = response.send(deposit.map_err(ServiceError::from));
            }
            TransactionRequest::ApproveWithdrawal { id, response } => {
                let _ = response.send(self.approve_withdrawal(&id).await);
            }
            TransactionRequest::RejectWithdrawal { id, note, response } => {
                let withdrawal = self.repository.reject_withdrawal(&id, note).await;
                if let Ok(withdrawal) = &withdrawal {
                    log::info!("Rejected withdrawal {}.", withdrawal.reference);
                }
                let _ = response.send(withdrawal.map_err(ServiceError::from));
            }
        }
    }
}

pub struct TransactionService;

impl TransactionService {
    pub fn new() -> Self {
        TransactionService {}
    }
}

#[async_trait]
impl Service<TransactionRequest, TransactionRequestHandler> for TransactionService {}
