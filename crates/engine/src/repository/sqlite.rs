//! Durable repository on top of `sea-orm` (SQLite).
//!
//! Each [`LedgerTx`] wraps one `DatabaseTransaction`: it commits on success
//! and rolls back on error or drop, releasing its connection on every path.
//!
//! SQLite allows a single writer. Write transactions here read a debt and then
//! update it, so they take an in-process gate before `BEGIN`; the second
//! writer then starts after the first has committed and reads its result.

use std::sync::Arc;

use async_trait::async_trait;
use migration::{Migrator, MigratorTrait};
use sea_orm::{
    ColumnTrait, Condition, ConnectOptions, Database, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, TransactionTrait, sea_query::OnConflict,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{ChatId, Debt, DebtKey, Order, Payment, ResultEngine, debts, orders, payments};

use super::{DebtFilter, LedgerTx, OrderFilter, PaymentFilter, Repository, TxMode};

#[derive(Clone, Debug)]
pub struct SqliteRepository {
    database: DatabaseConnection,
    writer: Arc<Mutex<()>>,
}

impl SqliteRepository {
    /// Wrap an already migrated connection.
    #[must_use]
    pub fn new(database: DatabaseConnection) -> Self {
        Self {
            database,
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// Connect to `url` and bring the schema up to date.
    ///
    /// Migrations are additive and check for existing columns and indexes,
    /// so opening an already migrated store (or one created by an older
    /// release) is always safe.
    pub async fn open(url: &str) -> ResultEngine<Self> {
        let mut options = ConnectOptions::new(url.to_string());
        options.sqlx_logging(false);
        // Every connection to `:memory:` is a separate database.
        if url.contains(":memory:") {
            options.max_connections(1);
        }
        let database = Database::connect(options).await?;
        Migrator::up(&database, None).await?;
        tracing::debug!("ledger store ready at {url}");
        Ok(Self::new(database))
    }

    #[must_use]
    pub fn database(&self) -> &DatabaseConnection {
        &self.database
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn begin(&self, mode: TxMode) -> ResultEngine<Box<dyn LedgerTx>> {
        let gate = match mode {
            TxMode::Write => Some(self.writer.clone().lock_owned().await),
            TxMode::Read => None,
        };
        let tx = self.database.begin().await?;
        Ok(Box::new(SqliteTx { tx, _gate: gate }))
    }
}

struct SqliteTx {
    tx: DatabaseTransaction,
    _gate: Option<OwnedMutexGuard<()>>,
}

#[async_trait]
impl LedgerTx for SqliteTx {
    async fn save_order(&mut self, order: &Order) -> ResultEngine<()> {
        orders::Entity::insert(orders::ActiveModel::from(order))
            .on_conflict(
                OnConflict::column(orders::Column::Id)
                    .update_columns([
                        orders::Column::ChatId,
                        orders::Column::Description,
                        orders::Column::AmountMinor,
                        orders::Column::PerPersonMinor,
                        orders::Column::Payer,
                        orders::Column::Participants,
                        orders::Column::CreatedBy,
                        orders::Column::CreatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.tx)
            .await?;
        Ok(())
    }

    async fn get_order(&mut self, chat_id: ChatId, id: Uuid) -> ResultEngine<Option<Order>> {
        orders::Entity::find_by_id(id.to_string())
            .filter(orders::Column::ChatId.eq(chat_id.get()))
            .one(&self.tx)
            .await?
            .map(Order::try_from)
            .transpose()
    }

    async fn list_orders(
        &mut self,
        chat_id: ChatId,
        filter: OrderFilter<'_>,
    ) -> ResultEngine<Vec<Order>> {
        let mut query = orders::Entity::find().filter(orders::Column::ChatId.eq(chat_id.get()));
        if let OrderFilter::CreatedBy(creator) = filter {
            // Rows older than the creator column name nobody; they belong to the payer.
            query = query.filter(
                Condition::any()
                    .add(orders::Column::CreatedBy.eq(creator.as_str()))
                    .add(
                        Condition::all()
                            .add(orders::Column::CreatedBy.eq(""))
                            .add(orders::Column::Payer.eq(creator.as_str())),
                    ),
            );
        }
        query
            .order_by_desc(orders::Column::Id)
            .all(&self.tx)
            .await?
            .into_iter()
            .map(Order::try_from)
            .collect()
    }

    async fn delete_order(&mut self, chat_id: ChatId, id: Uuid) -> ResultEngine<()> {
        orders::Entity::delete_many()
            .filter(orders::Column::Id.eq(id.to_string()))
            .filter(orders::Column::ChatId.eq(chat_id.get()))
            .exec(&self.tx)
            .await?;
        Ok(())
    }

    async fn save_debt(&mut self, debt: &Debt) -> ResultEngine<()> {
        debts::Entity::insert(debts::ActiveModel::from(debt))
            .on_conflict(
                OnConflict::columns([
                    debts::Column::Debtor,
                    debts::Column::Creditor,
                    debts::Column::ChatId,
                ])
                .update_columns([
                    debts::Column::AmountMinor,
                    debts::Column::Description,
                    debts::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.tx)
            .await?;
        Ok(())
    }

    async fn get_debt(&mut self, key: &DebtKey) -> ResultEngine<Option<Debt>> {
        debts::Entity::find()
            .filter(debts::Column::Debtor.eq(key.debtor.as_str()))
            .filter(debts::Column::Creditor.eq(key.creditor.as_str()))
            .filter(debts::Column::ChatId.eq(key.chat_id.get()))
            .one(&self.tx)
            .await?
            .map(Debt::try_from)
            .transpose()
    }

    async fn list_debts(
        &mut self,
        chat_id: ChatId,
        filter: DebtFilter<'_>,
    ) -> ResultEngine<Vec<Debt>> {
        let mut query = debts::Entity::find().filter(debts::Column::ChatId.eq(chat_id.get()));
        query = match filter {
            DebtFilter::All => query,
            DebtFilter::Debtor(p) => query.filter(debts::Column::Debtor.eq(p.as_str())),
            DebtFilter::Creditor(p) => query.filter(debts::Column::Creditor.eq(p.as_str())),
        };
        query
            .order_by_asc(debts::Column::Debtor)
            .order_by_asc(debts::Column::Creditor)
            .all(&self.tx)
            .await?
            .into_iter()
            .map(Debt::try_from)
            .collect()
    }

    async fn delete_debt(&mut self, key: &DebtKey) -> ResultEngine<()> {
        debts::Entity::delete_many()
            .filter(debts::Column::Debtor.eq(key.debtor.as_str()))
            .filter(debts::Column::Creditor.eq(key.creditor.as_str()))
            .filter(debts::Column::ChatId.eq(key.chat_id.get()))
            .exec(&self.tx)
            .await?;
        Ok(())
    }

    async fn save_payment(&mut self, payment: &Payment) -> ResultEngine<()> {
        payments::Entity::insert(payments::ActiveModel::from(payment))
            .exec_without_returning(&self.tx)
            .await?;
        Ok(())
    }

    async fn list_payments(
        &mut self,
        chat_id: ChatId,
        filter: PaymentFilter<'_>,
    ) -> ResultEngine<Vec<Payment>> {
        let mut query =
            payments::Entity::find().filter(payments::Column::ChatId.eq(chat_id.get()));
        query = match filter {
            PaymentFilter::All => query,
            PaymentFilter::Debtor(p) => query.filter(payments::Column::Debtor.eq(p.as_str())),
            PaymentFilter::Creditor(p) => query.filter(payments::Column::Creditor.eq(p.as_str())),
        };
        query
            .order_by_desc(payments::Column::Id)
            .all(&self.tx)
            .await?
            .into_iter()
            .map(Payment::try_from)
            .collect()
    }

    async fn commit(self: Box<Self>) -> ResultEngine<()> {
        let this = *self;
        this.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> ResultEngine<()> {
        let this = *self;
        this.tx.rollback().await?;
        Ok(())
    }
}
