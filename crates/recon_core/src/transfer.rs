//! Balance transfer between two accounts behind data-access traits.

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{error, info};

/// Account row as seen by the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecAccount {
    pub account_id: String,
    pub balance: Decimal,
    pub if_frozen: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecTransferRequest {
    /// Idempotency key; a second request with the same id is rejected.
    pub transfer_id: String,
    pub account_from: String,
    pub account_to: String,
    pub amount: Decimal,
}

/// Persisted outcome of an accepted transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecTransferRecord {
    pub request: SpecTransferRequest,
    pub balance_from_after: Decimal,
    pub balance_to_after: Decimal,
}

/// Failure reported by a data-access implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct StorageError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("transfer amount must be positive, got {0}")]
    InvalidAmount(Decimal),
    #[error("source and destination are the same account {0}")]
    SameAccount(String),
    #[error("transfer {0} already processed")]
    DuplicateTransfer(String),
    #[error("account {0} not found")]
    AccountNotFound(String),
    #[error("account {0} is frozen")]
    AccountFrozen(String),
    #[error("account {account_id} has {balance}, needs {amount}")]
    InsufficientFunds {
        account_id: String,
        balance: Decimal,
        amount: Decimal,
    },
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<StorageError> for TransferError {
    fn from(err: StorageError) -> Self {
        TransferError::Storage(err.0)
    }
}

pub trait AccountDao {
    fn find_account(&self, account_id: &str) -> Result<Option<SpecAccount>, StorageError>;
    fn update_balance(&mut self, account_id: &str, balance: Decimal) -> Result<(), StorageError>;
}

pub trait TransferDao {
    fn exists_transfer(&self, transfer_id: &str) -> Result<bool, StorageError>;
    fn insert_transfer(&mut self, record: &SpecTransferRecord) -> Result<(), StorageError>;
}

/// Validates and applies transfers: debit, credit, then record.
///
/// A failed credit or record step restores the balances written so far
/// before the error is returned.
pub struct BalanceTransferHandler<A, T> {
    accounts: A,
    transfers: T,
}

impl<A: AccountDao, T: TransferDao> BalanceTransferHandler<A, T> {
    pub fn new(accounts: A, transfers: T) -> Self {
        Self {
            accounts,
            transfers,
        }
    }

    pub fn accounts(&self) -> &A {
        &self.accounts
    }

    pub fn transfers(&self) -> &T {
        &self.transfers
    }

    pub fn into_parts(self) -> (A, T) {
        (self.accounts, self.transfers)
    }

    fn load_account(&self, account_id: &str) -> Result<SpecAccount, TransferError> {
        self.accounts
            .find_account(account_id)?
            .ok_or_else(|| TransferError::AccountNotFound(account_id.to_string()))
    }

    fn restore_balance(&mut self, account_id: &str, balance: Decimal) {
        if let Err(err) = self.accounts.update_balance(account_id, balance) {
            error!(account = account_id, %balance, error = %err, "balance restore failed");
        }
    }

    /// Run the checks in order, then move the funds.
    pub fn handle(
        &mut self,
        req: &SpecTransferRequest,
    ) -> Result<SpecTransferRecord, TransferError> {
        if req.amount <= Decimal::ZERO {
            return Err(TransferError::InvalidAmount(req.amount));
        }
        if req.account_from == req.account_to {
            return Err(TransferError::SameAccount(req.account_from.clone()));
        }
        if self.transfers.exists_transfer(&req.transfer_id)? {
            return Err(TransferError::DuplicateTransfer(req.transfer_id.clone()));
        }
        let account_from = self.load_account(&req.account_from)?;
        let account_to = self.load_account(&req.account_to)?;
        for account in [&account_from, &account_to] {
            if account.if_frozen {
                return Err(TransferError::AccountFrozen(account.account_id.clone()));
            }
        }
        if account_from.balance < req.amount {
            return Err(TransferError::InsufficientFunds {
                account_id: account_from.account_id,
                balance: account_from.balance,
                amount: req.amount,
            });
        }

        let balance_from_after = account_from.balance - req.amount;
        let balance_to_after = account_to.balance + req.amount;

        self.accounts
            .update_balance(&req.account_from, balance_from_after)?;
        if let Err(err) = self.accounts.update_balance(&req.account_to, balance_to_after) {
            self.restore_balance(&req.account_from, account_from.balance);
            return Err(err.into());
        }

        let record = SpecTransferRecord {
            request: req.clone(),
            balance_from_after,
            balance_to_after,
        };
        if let Err(err) = self.transfers.insert_transfer(&record) {
            self.restore_balance(&req.account_to, account_to.balance);
            self.restore_balance(&req.account_from, account_from.balance);
            return Err(err.into());
        }

        info!(
            transfer = %req.transfer_id,
            from = %req.account_from,
            to = %req.account_to,
            amount = %req.amount,
            "transfer applied"
        );
        Ok(record)
    }
}
