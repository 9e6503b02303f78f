pub use sea_orm_migration::prelude::*;

mod m20250301_000000_init;
mod m20250401_000000_order_creator;
mod m20250501_000000_chat_scope;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000000_init::Migration),
            Box::new(m20250401_000000_order_creator::Migration),
            Box::new(m20250501_000000_chat_scope::Migration),
        ]
    }
}
