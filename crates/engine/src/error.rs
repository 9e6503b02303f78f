//! The module contains the errors the ledger engine can return.
//!
//! Validation errors are raised before any mutation reaches the store:
//!
//! - [`InvalidAmount`] for non-positive or over-limit order amounts.
//! - [`InsufficientParticipants`] when an order has fewer than two members.
//! - [`InvalidPaymentAmount`] for non-positive payments.
//! - [`PaymentExceedsDebt`] when a payment is larger than the outstanding debt.
//! - [`DebtNotFound`] when there is nothing to pay.
//!
//! Storage failures are wrapped in [`Persistence`] and returned unchanged
//! after the in-flight transaction is rolled back.
//!
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`InsufficientParticipants`]: EngineError::InsufficientParticipants
//!  [`InvalidPaymentAmount`]: EngineError::InvalidPaymentAmount
//!  [`PaymentExceedsDebt`]: EngineError::PaymentExceedsDebt
//!  [`DebtNotFound`]: EngineError::DebtNotFound
//!  [`Persistence`]: EngineError::Persistence
use sea_orm::DbErr;
use thiserror::Error;

use crate::Money;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("At least 2 participants are required, got {0}")]
    InsufficientParticipants(usize),
    #[error("Invalid payment amount: {0}")]
    InvalidPaymentAmount(String),
    #[error("Payment of {requested} exceeds the outstanding debt of {outstanding}")]
    PaymentExceedsDebt { requested: Money, outstanding: Money },
    #[error("No debt from \"{debtor}\" to \"{creditor}\"")]
    DebtNotFound { debtor: String, creditor: String },
    #[error("Invalid participant: {0}")]
    InvalidParticipant(String),
    #[error("\"{0}\" order not found!")]
    OrderNotFound(String),
    #[error(transparent)]
    Persistence(#[from] DbErr),
}

/// Stable, matchable kind of an [`EngineError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidAmount,
    InsufficientParticipants,
    InvalidPaymentAmount,
    PaymentExceedsDebt,
    DebtNotFound,
    InvalidParticipant,
    OrderNotFound,
    PersistenceFailure,
}

impl EngineError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAmount(_) => ErrorKind::InvalidAmount,
            Self::InsufficientParticipants(_) => ErrorKind::InsufficientParticipants,
            Self::InvalidPaymentAmount(_) => ErrorKind::InvalidPaymentAmount,
            Self::PaymentExceedsDebt { .. } => ErrorKind::PaymentExceedsDebt,
            Self::DebtNotFound { .. } => ErrorKind::DebtNotFound,
            Self::InvalidParticipant(_) => ErrorKind::InvalidParticipant,
            Self::OrderNotFound(_) => ErrorKind::OrderNotFound,
            Self::Persistence(_) => ErrorKind::PersistenceFailure,
        }
    }

    /// Returns `true` for errors raised by input validation (no state was touched).
    #[must_use]
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Persistence(_))
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InsufficientParticipants(a), Self::InsufficientParticipants(b)) => a == b,
            (Self::InvalidPaymentAmount(a), Self::InvalidPaymentAmount(b)) => a == b,
            (
                Self::PaymentExceedsDebt {
                    requested: ra,
                    outstanding: oa,
                },
                Self::PaymentExceedsDebt {
                    requested: rb,
                    outstanding: ob,
                },
            ) => ra == rb && oa == ob,
            (
                Self::DebtNotFound {
                    debtor: da,
                    creditor: ca,
                },
                Self::DebtNotFound {
                    debtor: db,
                    creditor: cb,
                },
            ) => da == db && ca == cb,
            (Self::InvalidParticipant(a), Self::InvalidParticipant(b)) => a == b,
            (Self::OrderNotFound(a), Self::OrderNotFound(b)) => a == b,
            (Self::Persistence(a), Self::Persistence(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
