//! Scope every table by chat.
//!
//! Rows written before this migration belong to chat `0`. The `debts` primary
//! key must include `chat_id`, and SQLite cannot alter a primary key, so that
//! table is rebuilt and its rows copied over.

use sea_orm::{ConnectionTrait, TransactionTrait};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Orders {
    Table,
    ChatId,
}

#[derive(Iden)]
enum Payments {
    Table,
    ChatId,
}

#[derive(Iden)]
enum Debts {
    Table,
    Debtor,
    Creditor,
    ChatId,
    AmountMinor,
    Description,
    CreatedAt,
    UpdatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        if !manager.has_column("orders", "chat_id").await? {
            manager
                .alter_table(
                    Table::alter()
                        .table(Orders::Table)
                        .add_column(chat_id_column(Orders::ChatId))
                        .to_owned(),
                )
                .await?;
        }

        if !manager.has_column("payments", "chat_id").await? {
            manager
                .alter_table(
                    Table::alter()
                        .table(Payments::Table)
                        .add_column(chat_id_column(Payments::ChatId))
                        .to_owned(),
                )
                .await?;
        }

        if manager.has_table("debts_old").await?
            || !manager.has_column("debts", "chat_id").await?
        {
            rebuild_debts(manager).await?;
        }

        if !manager.has_index("orders", "idx-orders-chat_id").await? {
            manager
                .create_index(
                    Index::create()
                        .name("idx-orders-chat_id")
                        .table(Orders::Table)
                        .col(Orders::ChatId)
                        .to_owned(),
                )
                .await?;
        }
        if !manager.has_index("debts", "idx-debts-chat_id").await? {
            manager
                .create_index(
                    Index::create()
                        .name("idx-debts-chat_id")
                        .table(Debts::Table)
                        .col(Debts::ChatId)
                        .to_owned(),
                )
                .await?;
        }
        if !manager.has_index("payments", "idx-payments-chat_id").await? {
            manager
                .create_index(
                    Index::create()
                        .name("idx-payments-chat_id")
                        .table(Payments::Table)
                        .col(Payments::ChatId)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
        Err(DbErr::Custom(
            "m20250501_000000_chat_scope is irreversible".to_string(),
        ))
    }
}

fn chat_id_column(column: impl IntoIden) -> ColumnDef {
    ColumnDef::new(column)
        .big_integer()
        .not_null()
        .default(0)
        .to_owned()
}

/// Moves `debts` onto the chat-scoped key inside one transaction.
///
/// A `debts_old` table only survives a rebuild that was cut short before this
/// ran transactionally; its rows are copied over the same way and it is
/// dropped.
async fn rebuild_debts(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    let txn = manager.get_connection().begin().await?;
    let schema = SchemaManager::new(&txn);

    if !schema.has_table("debts_old").await? {
        txn.execute_unprepared("ALTER TABLE debts RENAME TO debts_old;")
            .await?;
    }

    schema
        .create_table(
            Table::create()
                .table(Debts::Table)
                .if_not_exists()
                .col(ColumnDef::new(Debts::Debtor).string().not_null())
                .col(ColumnDef::new(Debts::Creditor).string().not_null())
                .col(chat_id_column(Debts::ChatId))
                .col(ColumnDef::new(Debts::AmountMinor).big_integer().not_null())
                .col(ColumnDef::new(Debts::Description).string())
                .col(ColumnDef::new(Debts::CreatedAt).timestamp().not_null())
                .col(ColumnDef::new(Debts::UpdatedAt).timestamp().not_null())
                .primary_key(
                    Index::create()
                        .col(Debts::Debtor)
                        .col(Debts::Creditor)
                        .col(Debts::ChatId),
                )
                .to_owned(),
        )
        .await?;

    // Rows already present under chat 0 win over their legacy copy.
    txn.execute_unprepared(
        "INSERT INTO debts (debtor, creditor, chat_id, amount_minor, description, created_at, updated_at) \
         SELECT o.debtor, o.creditor, 0, o.amount_minor, o.description, o.created_at, o.updated_at \
         FROM debts_old o WHERE NOT EXISTS (SELECT 1 FROM debts d \
         WHERE d.debtor = o.debtor AND d.creditor = o.creditor AND d.chat_id = 0);",
    )
    .await?;

    // Drops the old debtor/creditor indexes along with the table.
    schema
        .drop_table(Table::drop().table(Alias::new("debts_old")).to_owned())
        .await?;

    for (name, column) in [
        ("idx-debts-debtor", Debts::Debtor),
        ("idx-debts-creditor", Debts::Creditor),
    ] {
        schema
            .create_index(
                Index::create()
                    .name(name)
                    .table(Debts::Table)
                    .col(column)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
    }

    txn.commit().await?;
    Ok(())
}
