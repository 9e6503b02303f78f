use migration::{Migrator, MigratorTrait, SchemaManager};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement};

async fn exec(db: &DatabaseConnection, sql: &str) {
    db.execute(Statement::from_string(DbBackend::Sqlite, sql.to_string()))
        .await
        .unwrap();
}

async fn count(db: &DatabaseConnection, sql: &str) -> i64 {
    let row = db
        .query_one(Statement::from_string(DbBackend::Sqlite, sql.to_string()))
        .await
        .unwrap()
        .unwrap();
    row.try_get("", "n").unwrap()
}

/// The single-chat layout written by the first release, before migrations
/// were tracked.
async fn legacy_store() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    exec(
        &db,
        "CREATE TABLE orders (
            id TEXT NOT NULL PRIMARY KEY,
            description TEXT,
            amount_minor BIGINT NOT NULL,
            per_person_minor BIGINT NOT NULL,
            payer TEXT NOT NULL,
            participants TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
    )
    .await;
    exec(
        &db,
        "CREATE TABLE debts (
            debtor TEXT NOT NULL,
            creditor TEXT NOT NULL,
            amount_minor BIGINT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (debtor, creditor)
        )",
    )
    .await;
    exec(
        &db,
        "CREATE TABLE payments (
            id TEXT NOT NULL PRIMARY KEY,
            debtor TEXT NOT NULL,
            creditor TEXT NOT NULL,
            amount_minor BIGINT NOT NULL,
            created_at TEXT NOT NULL
        )",
    )
    .await;

    exec(
        &db,
        "INSERT INTO orders VALUES ('0190a5e2-7b3c-7000-8000-000000000001', 'pizza', 300000, \
         100000, 'ivan', 'ivan,petya,masha', '2025-01-10 12:00:00+00:00')",
    )
    .await;
    exec(
        &db,
        "INSERT INTO debts VALUES \
         ('petya', 'ivan', 100000, 'pizza', '2025-01-10 12:00:00+00:00', '2025-01-10 12:00:00+00:00'), \
         ('masha', 'ivan', 60000, 'pizza', '2025-01-10 12:00:00+00:00', '2025-01-11 09:00:00+00:00')",
    )
    .await;
    exec(
        &db,
        "INSERT INTO payments VALUES ('0190a5e2-7b3c-7000-8000-000000000002', 'masha', 'ivan', \
         40000, '2025-01-11 09:00:00+00:00')",
    )
    .await;
    db
}

#[tokio::test]
async fn legacy_rows_land_in_chat_zero() {
    let db = legacy_store().await;
    Migrator::up(&db, None).await.unwrap();

    let manager = SchemaManager::new(&db);
    for table in ["orders", "debts", "payments"] {
        assert!(manager.has_column(table, "chat_id").await.unwrap(), "{table}");
        let index = format!("idx-{table}-chat_id");
        assert!(manager.has_index(table, &index).await.unwrap(), "{index}");
    }
    assert!(manager.has_column("orders", "created_by").await.unwrap());

    assert_eq!(count(&db, "SELECT COUNT(*) AS n FROM orders WHERE chat_id = 0").await, 1);
    assert_eq!(count(&db, "SELECT COUNT(*) AS n FROM debts WHERE chat_id = 0").await, 2);
    assert_eq!(count(&db, "SELECT COUNT(*) AS n FROM payments WHERE chat_id = 0").await, 1);
    assert_eq!(
        count(&db, "SELECT COUNT(*) AS n FROM orders WHERE created_by = ''").await,
        1
    );
    assert_eq!(
        count(
            &db,
            "SELECT amount_minor AS n FROM debts WHERE debtor = 'masha' AND creditor = 'ivan'"
        )
        .await,
        60000
    );
}

#[tokio::test]
async fn running_up_twice_is_a_no_op() {
    let db = legacy_store().await;
    Migrator::up(&db, None).await.unwrap();
    Migrator::up(&db, None).await.unwrap();

    assert_eq!(count(&db, "SELECT COUNT(*) AS n FROM debts").await, 2);
    assert_eq!(count(&db, "SELECT COUNT(*) AS n FROM seaql_migrations").await, 3);
}

#[tokio::test]
async fn debts_key_includes_chat() {
    let db = legacy_store().await;
    Migrator::up(&db, None).await.unwrap();

    // Same pair, another chat: a distinct row now.
    exec(
        &db,
        "INSERT INTO debts (debtor, creditor, chat_id, amount_minor, description, created_at, \
         updated_at) VALUES ('petya', 'ivan', 42, 500, NULL, '2025-02-01 10:00:00+00:00', \
         '2025-02-01 10:00:00+00:00')",
    )
    .await;
    assert_eq!(
        count(&db, "SELECT COUNT(*) AS n FROM debts WHERE debtor = 'petya'").await,
        2
    );

    let duplicate = db
        .execute(Statement::from_string(
            DbBackend::Sqlite,
            "INSERT INTO debts (debtor, creditor, chat_id, amount_minor, created_at, updated_at) \
             VALUES ('petya', 'ivan', 42, 1, '2025-02-01 10:00:00+00:00', \
             '2025-02-01 10:00:00+00:00')"
                .to_string(),
        ))
        .await;
    assert!(duplicate.is_err());
}

#[tokio::test]
async fn fresh_store_gets_the_current_layout() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();

    let manager = SchemaManager::new(&db);
    assert!(manager.has_column("orders", "created_by").await.unwrap());
    assert!(manager.has_column("debts", "chat_id").await.unwrap());
    assert!(manager.has_index("debts", "idx-debts-debtor").await.unwrap());
    assert!(manager.has_index("payments", "idx-payments-creditor").await.unwrap());
}

#[tokio::test]
async fn failed_debts_rebuild_leaves_legacy_rows_in_place() {
    let db = legacy_store().await;
    exec(&db, "DROP TABLE debts").await;
    exec(
        &db,
        "CREATE TABLE debts (
            debtor TEXT NOT NULL,
            creditor TEXT NOT NULL,
            amount_minor BIGINT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT,
            PRIMARY KEY (debtor, creditor)
        )",
    )
    .await;
    exec(
        &db,
        "INSERT INTO debts VALUES ('petya', 'ivan', 100000, 'pizza', \
         '2025-01-10 12:00:00+00:00', NULL)",
    )
    .await;

    // The row cannot satisfy the new NOT NULL column, so the copy fails.
    assert!(Migrator::up(&db, None).await.is_err());
    assert!(Migrator::up(&db, None).await.is_err());

    let manager = SchemaManager::new(&db);
    assert!(!manager.has_table("debts_old").await.unwrap());
    assert!(!manager.has_column("debts", "chat_id").await.unwrap());
    assert_eq!(count(&db, "SELECT COUNT(*) AS n FROM debts").await, 1);
    assert_eq!(count(&db, "SELECT COUNT(*) AS n FROM seaql_migrations").await, 2);
}

#[tokio::test]
async fn interrupted_debts_rebuild_is_finished_on_the_next_run() {
    let db = legacy_store().await;

    // State left behind by a rebuild that stopped after creating the new table.
    exec(&db, "ALTER TABLE debts RENAME TO debts_old").await;
    exec(
        &db,
        "CREATE TABLE debts (
            debtor TEXT NOT NULL,
            creditor TEXT NOT NULL,
            chat_id BIGINT NOT NULL DEFAULT 0,
            amount_minor BIGINT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (debtor, creditor, chat_id)
        )",
    )
    .await;
    exec(
        &db,
        "INSERT INTO debts VALUES ('petya', 'ivan', 0, 100000, 'pizza', \
         '2025-01-10 12:00:00+00:00', '2025-01-10 12:00:00+00:00')",
    )
    .await;

    Migrator::up(&db, None).await.unwrap();

    let manager = SchemaManager::new(&db);
    assert!(!manager.has_table("debts_old").await.unwrap());
    assert!(manager.has_index("debts", "idx-debts-debtor").await.unwrap());
    assert_eq!(count(&db, "SELECT COUNT(*) AS n FROM debts WHERE chat_id = 0").await, 2);
    assert_eq!(
        count(
            &db,
            "SELECT amount_minor AS n FROM debts WHERE debtor = 'masha' AND creditor = 'ivan'"
        )
        .await,
        60000
    );
}
