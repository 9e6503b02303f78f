//! Persistence contract for the ledger.
//!
//! Every read and write happens inside a [`LedgerTx`] obtained from
//! [`Repository::begin`]. A service operation that touches several rows
//! (save an order, accumulate its debts) runs in one transaction, so readers
//! see all of it or none of it.
//!
//! Dropping a transaction without calling [`LedgerTx::commit`] discards its
//! writes.
//!
//! All operations are scoped by [`ChatId`]; nothing here can observe or touch
//! rows of another chat.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{ChatId, Debt, DebtKey, Order, ParticipantId, Payment, ResultEngine};

mod memory;
mod sqlite;

pub use memory::MemoryRepository;
pub use sqlite::SqliteRepository;

/// What a transaction intends to do. Write transactions are serialized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxMode {
    Read,
    Write,
}

/// Debt rows to return from [`LedgerTx::list_debts`], ordered by
/// `(debtor, creditor)`.
#[derive(Clone, Copy, Debug)]
pub enum DebtFilter<'a> {
    All,
    Debtor(&'a ParticipantId),
    Creditor(&'a ParticipantId),
}

impl DebtFilter<'_> {
    pub(crate) fn matches(&self, debt: &Debt) -> bool {
        match self {
            Self::All => true,
            Self::Debtor(p) => debt.debtor == **p,
            Self::Creditor(p) => debt.creditor == **p,
        }
    }
}

/// Orders to return from [`LedgerTx::list_orders`], newest first.
#[derive(Clone, Copy, Debug)]
pub enum OrderFilter<'a> {
    All,
    CreatedBy(&'a ParticipantId),
}

impl OrderFilter<'_> {
    pub(crate) fn matches(&self, order: &Order) -> bool {
        match self {
            Self::All => true,
            Self::CreatedBy(p) => order.created_by == **p,
        }
    }
}

/// Payments to return from [`LedgerTx::list_payments`], newest first.
#[derive(Clone, Copy, Debug)]
pub enum PaymentFilter<'a> {
    All,
    Debtor(&'a ParticipantId),
    Creditor(&'a ParticipantId),
}

impl PaymentFilter<'_> {
    pub(crate) fn matches(&self, payment: &Payment) -> bool {
        match self {
            Self::All => true,
            Self::Debtor(p) => payment.debtor == **p,
            Self::Creditor(p) => payment.creditor == **p,
        }
    }
}

/// A store that can hand out ledger transactions.
#[async_trait]
pub trait Repository: Send + Sync + std::fmt::Debug {
    async fn begin(&self, mode: TxMode) -> ResultEngine<Box<dyn LedgerTx>>;
}

/// One logical unit of work against the store.
#[async_trait]
pub trait LedgerTx: Send {
    /// Insert an order; an existing id is replaced.
    async fn save_order(&mut self, order: &Order) -> ResultEngine<()>;
    async fn get_order(&mut self, chat_id: ChatId, id: Uuid) -> ResultEngine<Option<Order>>;
    async fn list_orders(
        &mut self,
        chat_id: ChatId,
        filter: OrderFilter<'_>,
    ) -> ResultEngine<Vec<Order>>;
    async fn delete_order(&mut self, chat_id: ChatId, id: Uuid) -> ResultEngine<()>;

    /// Upsert keyed by `(debtor, creditor, chat_id)`.
    async fn save_debt(&mut self, debt: &Debt) -> ResultEngine<()>;
    async fn get_debt(&mut self, key: &DebtKey) -> ResultEngine<Option<Debt>>;
    async fn list_debts(
        &mut self,
        chat_id: ChatId,
        filter: DebtFilter<'_>,
    ) -> ResultEngine<Vec<Debt>>;
    async fn delete_debt(&mut self, key: &DebtKey) -> ResultEngine<()>;

    /// Append an audit record.
    async fn save_payment(&mut self, payment: &Payment) -> ResultEngine<()>;
    async fn list_payments(
        &mut self,
        chat_id: ChatId,
        filter: PaymentFilter<'_>,
    ) -> ResultEngine<Vec<Payment>>;

    async fn commit(self: Box<Self>) -> ResultEngine<()>;
    async fn rollback(self: Box<Self>) -> ResultEngine<()>;
}

/// Run a block inside a ledger transaction, committing on success and rolling
/// back on error. A `?` inside the block drops the transaction, which also
/// discards it.
macro_rules! with_tx {
    ($repo:expr, $mode:expr, |$tx:ident| $body:expr) => {{
        let mut $tx = $repo.begin($mode).await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = $tx.rollback().await {
                    tracing::warn!("rollback failed after {err}: {rollback_err}");
                }
                Err(err)
            }
        }
    }};
}

pub(crate) use with_tx;
