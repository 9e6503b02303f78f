use std::{path::PathBuf, sync::Arc};

use engine::{
    ChatId, CreateOrderCmd, ErrorKind, Ledger, MemoryRepository, Money, RecordPaymentCmd,
};
use sea_orm::{ConnectionTrait, Database, Statement};
use uuid::Uuid;

const CHAT: ChatId = ChatId::new(7);

fn file_db_url(prefix: &str) -> (String, PathBuf) {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();

    let path = root.join(format!("{prefix}_{}.db", Uuid::new_v4()));
    let url = format!("sqlite:{}?mode=rwc", path.display());
    (url, path)
}

async fn open(url: &str) -> Ledger {
    Ledger::builder().database_url(url).build().await.unwrap()
}

#[tokio::test]
async fn state_survives_a_restart() {
    let (url, path) = file_db_url("ledger");

    let ledger = open(&url).await;
    let order = ledger
        .create_order(
            CreateOrderCmd::new(CHAT, "ivan", Money::from_major(3000))
                .participants(["petya", "masha"])
                .description("pizza"),
        )
        .await
        .unwrap();
    let receipt = ledger
        .record_payment(RecordPaymentCmd::new(CHAT, "masha", "ivan", Money::from_major(400)))
        .await
        .unwrap();
    let debts = ledger.all_debts(CHAT).await.unwrap();
    drop(ledger);

    let ledger = open(&url).await;
    assert_eq!(ledger.orders().get_order(CHAT, order.id).await.unwrap(), order);
    assert_eq!(ledger.all_debts(CHAT).await.unwrap(), debts);
    assert_eq!(
        ledger.payments().payments_by("masha", CHAT).await.unwrap(),
        vec![receipt.payment]
    );
    assert_eq!(
        ledger.debts().get_debt("masha", "ivan", CHAT).await.unwrap(),
        Money::from_major(600)
    );

    // Later writes keep accumulating on the reloaded rows.
    ledger
        .create_order(
            CreateOrderCmd::new(CHAT, "ivan", Money::from_major(200))
                .participant("petya")
                .description("coffee"),
        )
        .await
        .unwrap();
    let mine = ledger.get_my_debts("petya", CHAT).await.unwrap();
    assert_eq!(mine.total, Money::from_major(1100));
    assert_eq!(mine.debts[0].description.as_deref(), Some("pizza, coffee"));

    drop(ledger);
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn paid_debt_stays_zero_after_restart() {
    let (url, path) = file_db_url("ledger");

    let ledger = open(&url).await;
    ledger
        .create_order(
            CreateOrderCmd::new(CHAT, "ivan", Money::from_major(2000)).participant("petya"),
        )
        .await
        .unwrap();
    ledger
        .record_payment(RecordPaymentCmd::new(CHAT, "petya", "ivan", Money::from_major(1000)))
        .await
        .unwrap();
    for _ in 0..2 {
        let debt = ledger.debts().get_debt("petya", "ivan", CHAT).await.unwrap();
        assert_eq!(debt, Money::ZERO);
    }
    drop(ledger);

    let ledger = open(&url).await;
    for _ in 0..2 {
        let debt = ledger.debts().get_debt("petya", "ivan", CHAT).await.unwrap();
        assert_eq!(debt, Money::ZERO);
    }
    assert!(ledger.all_debts(CHAT).await.unwrap().is_empty());
    let err = ledger
        .record_payment(RecordPaymentCmd::new(CHAT, "petya", "ivan", Money::new(1)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DebtNotFound);

    drop(ledger);
    let _ = std::fs::remove_file(path);
}

async fn race_payments(ledger: Ledger) {
    ledger
        .create_order(
            CreateOrderCmd::new(CHAT, "ivan", Money::from_major(2000)).participant("petya"),
        )
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .record_payment(RecordPaymentCmd::new(
                    CHAT,
                    "petya",
                    "ivan",
                    Money::from_major(150),
                ))
                .await
        }));
    }

    let mut applied = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => applied += 1,
            Err(err) => assert_eq!(err.kind(), ErrorKind::PaymentExceedsDebt),
        }
    }
    assert_eq!(applied, 6);
    assert_eq!(
        ledger.debts().get_debt("petya", "ivan", CHAT).await.unwrap(),
        Money::from_major(100)
    );
    let history = ledger.payments().payments_by("petya", CHAT).await.unwrap();
    assert_eq!(history.len(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_payments_never_overdraw_sqlite() {
    let (url, path) = file_db_url("race");
    race_payments(open(&url).await).await;
    let _ = std::fs::remove_file(path);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_payments_never_overdraw_memory() {
    race_payments(Ledger::new(Arc::new(MemoryRepository::new()))).await;
}

#[tokio::test]
async fn legacy_store_is_read_under_chat_zero() {
    let (url, path) = file_db_url("legacy");

    let db = Database::connect(&url).await.unwrap();
    let backend = db.get_database_backend();
    for sql in [
        "CREATE TABLE orders (id TEXT NOT NULL PRIMARY KEY, description TEXT, \
         amount_minor BIGINT NOT NULL, per_person_minor BIGINT NOT NULL, payer TEXT NOT NULL, \
         participants TEXT NOT NULL, created_at TEXT NOT NULL)",
        "CREATE TABLE debts (debtor TEXT NOT NULL, creditor TEXT NOT NULL, \
         amount_minor BIGINT NOT NULL, description TEXT, created_at TEXT NOT NULL, \
         updated_at TEXT NOT NULL, PRIMARY KEY (debtor, creditor))",
        "CREATE TABLE payments (id TEXT NOT NULL PRIMARY KEY, debtor TEXT NOT NULL, \
         creditor TEXT NOT NULL, amount_minor BIGINT NOT NULL, created_at TEXT NOT NULL)",
        "INSERT INTO orders VALUES ('0190a5e2-7b3c-7000-8000-000000000001', 'pizza', 300000, \
         100000, 'ivan', 'ivan,petya,masha', '2025-01-10 12:00:00+00:00')",
        "INSERT INTO debts VALUES ('petya', 'ivan', 100000, 'pizza', \
         '2025-01-10 12:00:00+00:00', '2025-01-10 12:00:00+00:00')",
    ] {
        db.execute(Statement::from_string(backend, sql.to_string()))
            .await
            .unwrap();
    }
    db.close().await.unwrap();

    let ledger = open(&url).await;
    let legacy = ChatId::LEGACY;
    assert_eq!(
        ledger.debts().get_debt("petya", "ivan", legacy).await.unwrap(),
        Money::from_major(1000)
    );
    assert!(ledger.all_debts(CHAT).await.unwrap().is_empty());

    // Rows without a creator are attributed to their payer.
    let last = ledger.orders().last_order("ivan", legacy).await.unwrap().unwrap();
    assert_eq!(last.created_by.as_str(), "ivan");
    assert_eq!(last.participants.len(), 3);

    ledger
        .record_payment(RecordPaymentCmd::new(legacy, "petya", "ivan", Money::from_major(1000)))
        .await
        .unwrap();
    assert!(ledger.all_debts(legacy).await.unwrap().is_empty());

    drop(ledger);
    let _ = std::fs::remove_file(path);
}
