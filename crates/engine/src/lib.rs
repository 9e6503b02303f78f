//! Shared-expense ledger for group chats.
//!
//! An [`Order`] records who paid for what and who shared it. Creating one
//! splits the amount equally and adds each participant's share to their
//! [`Debt`] towards the payer. A [`Payment`] reduces a debt and is kept as an
//! audit record. Everything is scoped by [`ChatId`].
//!
//! Services live in [`Ledger`] and talk to storage only through the
//! [`Repository`] contract, so the same logic runs against
//! [`MemoryRepository`] and [`SqliteRepository`].

pub use commands::{CreateOrderCmd, RecordPaymentCmd};
pub use debts::{Debt, DebtKey};
pub use error::{EngineError, ErrorKind};
pub use money::Money;
pub use ops::{
    Consolidated, CounterpartyBalance, DebtPart, DebtService, DebtSummary, Ledger, LedgerBuilder,
    NetBalance, NetDirection, OrderService, PaymentReceipt, PaymentService, consolidate_debts,
};
pub use orders::{DEFAULT_ORDER_LABEL, Order};
pub use participants::{ChatId, ParticipantId};
pub use payments::Payment;
pub use repository::{
    DebtFilter, LedgerTx, MemoryRepository, OrderFilter, PaymentFilter, Repository,
    SqliteRepository, TxMode,
};

mod commands;
mod debts;
mod error;
mod money;
mod ops;
mod orders;
mod participants;
mod payments;
mod repository;
mod util;

pub type ResultEngine<T> = Result<T, EngineError>;
