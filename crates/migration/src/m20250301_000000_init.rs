//! Initial schema: the single-chat layout of the first release.
//!
//! - `orders`: shared expenses, participants stored comma separated
//! - `debts`: one row per `(debtor, creditor)`, amounts in minor units
//! - `payments`: append-only audit of debt reductions
//!
//! Tables and indexes are created with `IF NOT EXISTS`, so stores created by
//! hand before migrations were tracked go through unchanged.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Orders {
    Table,
    Id,
    Description,
    AmountMinor,
    PerPersonMinor,
    Payer,
    Participants,
    CreatedAt,
}

#[derive(Iden)]
enum Debts {
    Table,
    Debtor,
    Creditor,
    AmountMinor,
    Description,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Payments {
    Table,
    Id,
    Debtor,
    Creditor,
    AmountMinor,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Orders::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Orders::Description).string())
                    .col(ColumnDef::new(Orders::AmountMinor).big_integer().not_null())
                    .col(
                        ColumnDef::new(Orders::PerPersonMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Orders::Payer).string().not_null())
                    .col(ColumnDef::new(Orders::Participants).string().not_null())
                    .col(ColumnDef::new(Orders::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Debts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Debts::Debtor).string().not_null())
                    .col(ColumnDef::new(Debts::Creditor).string().not_null())
                    .col(ColumnDef::new(Debts::AmountMinor).big_integer().not_null())
                    .col(ColumnDef::new(Debts::Description).string())
                    .col(ColumnDef::new(Debts::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Debts::UpdatedAt).timestamp().not_null())
                    .primary_key(Index::create().col(Debts::Debtor).col(Debts::Creditor))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Payments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Payments::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Payments::Debtor).string().not_null())
                    .col(ColumnDef::new(Payments::Creditor).string().not_null())
                    .col(
                        ColumnDef::new(Payments::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Payments::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-orders-payer")
                    .table(Orders::Table)
                    .col(Orders::Payer)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        for (name, column) in [
            ("idx-debts-debtor", Debts::Debtor),
            ("idx-debts-creditor", Debts::Creditor),
        ] {
            manager
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

        for (name, column) in [
            ("idx-payments-debtor", Payments::Debtor),
            ("idx-payments-creditor", Payments::Creditor),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(Payments::Table)
                        .col(column)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Payments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Debts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Orders::Table).to_owned())
            .await?;
        Ok(())
    }
}
