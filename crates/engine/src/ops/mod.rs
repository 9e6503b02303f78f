use std::sync::Arc;

use crate::{
    ChatId, CreateOrderCmd, MemoryRepository, Order, RecordPaymentCmd, Repository, ResultEngine,
    SqliteRepository,
};

mod debts;
mod orders;
mod payments;

pub use debts::{
    Consolidated, CounterpartyBalance, DebtPart, DebtService, DebtSummary, NetBalance,
    NetDirection, consolidate_debts,
};
pub use orders::OrderService;
pub use payments::{PaymentReceipt, PaymentService};

/// The ledger as seen by the chat front end: the three services sharing one
/// repository handle.
#[derive(Clone, Debug)]
pub struct Ledger {
    orders: OrderService,
    debts: DebtService,
    payments: PaymentService,
}

impl Ledger {
    /// Return a builder for `Ledger`. Help to build the struct.
    pub fn builder() -> LedgerBuilder {
        LedgerBuilder::default()
    }

    #[must_use]
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self {
            orders: OrderService::new(repository.clone()),
            debts: DebtService::new(repository.clone()),
            payments: PaymentService::new(repository),
        }
    }

    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.orders
    }

    #[must_use]
    pub fn debts(&self) -> &DebtService {
        &self.debts
    }

    #[must_use]
    pub fn payments(&self) -> &PaymentService {
        &self.payments
    }

    pub async fn create_order(&self, cmd: CreateOrderCmd) -> ResultEngine<Order> {
        self.orders.create_order(cmd).await
    }

    pub async fn record_payment(&self, cmd: RecordPaymentCmd) -> ResultEngine<PaymentReceipt> {
        self.payments.record_payment(cmd).await
    }

    /// What `participant` owes, per creditor, without netting.
    pub async fn get_my_debts(
        &self,
        participant: &str,
        chat_id: ChatId,
    ) -> ResultEngine<DebtSummary> {
        self.debts.list_debts_of(participant, chat_id).await
    }

    /// What others owe `participant`, per debtor, without netting.
    pub async fn get_owed_to_me(
        &self,
        participant: &str,
        chat_id: ChatId,
    ) -> ResultEngine<DebtSummary> {
        self.debts.list_credits_of(participant, chat_id).await
    }

    pub async fn consolidate(
        &self,
        participant: &str,
        chat_id: ChatId,
    ) -> ResultEngine<Consolidated> {
        self.debts.consolidate(participant, chat_id).await
    }

    pub async fn all_debts(&self, chat_id: ChatId) -> ResultEngine<DebtSummary> {
        self.debts.list_all(chat_id).await
    }

    pub async fn delete_last_order(
        &self,
        created_by: &str,
        chat_id: ChatId,
    ) -> ResultEngine<Order> {
        self.orders.delete_last_order(created_by, chat_id).await
    }
}

/// The builder for `Ledger`
#[derive(Default)]
pub struct LedgerBuilder {
    repository: Option<Arc<dyn Repository>>,
    database_url: Option<String>,
}

impl LedgerBuilder {
    /// Use an existing repository handle.
    pub fn repository(mut self, repository: Arc<dyn Repository>) -> LedgerBuilder {
        self.repository = Some(repository);
        self
    }

    /// Open (and migrate) a SQLite store at `url`.
    pub fn database_url(mut self, url: impl Into<String>) -> LedgerBuilder {
        self.database_url = Some(url.into());
        self
    }

    /// Construct `Ledger`. Without a repository or URL the ledger is volatile.
    pub async fn build(self) -> ResultEngine<Ledger> {
        let repository: Arc<dyn Repository> = match (self.repository, self.database_url) {
            (Some(repository), _) => repository,
            (None, Some(url)) => Arc::new(SqliteRepository::open(&url).await?),
            (None, None) => Arc::new(MemoryRepository::new()),
        };
        Ok(Ledger::new(repository))
    }
}
