use std::error::Error;

use clap::{Args, Parser, Subcommand};
use engine::{
    ChatId, Consolidated, CreateOrderCmd, DebtSummary, Ledger, Money, NetDirection, Order,
    Payment, RecordPaymentCmd,
};
use serde::Serialize;

mod settings;

type AppResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(name = "splitledger")]
#[command(about = "Shared-expense ledger for group chats")]
struct Cli {
    /// Database connection string; overrides `settings.toml` (also read from `DATABASE_URL`).
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Chat the command applies to. Chat 0 holds rows from before chats existed.
    #[arg(long, global = true, default_value_t = 0)]
    chat: i64,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending migrations and exit.
    Migrate,
    /// Record a shared expense split equally.
    Order(OrderArgs),
    /// Pay back (part of) a debt.
    Pay(PayArgs),
    /// What a participant owes.
    Debts { participant: String },
    /// What others owe a participant.
    Owed { participant: String },
    /// Netted balance of a participant against everyone.
    Balance { participant: String },
    /// Net position between two participants.
    Net { a: String, b: String },
    /// Every debt in the chat.
    All,
    /// Orders of the chat, newest first.
    Orders,
    /// Delete the newest order a participant created and revert its debts.
    DeleteLast { participant: String },
    /// Payments made (or, with `--received`, received) by a participant.
    Payments(PaymentsArgs),
}

#[derive(Args, Debug)]
struct OrderArgs {
    #[arg(long)]
    payer: String,
    #[arg(long)]
    amount: Money,
    /// Repeat for every participant; the payer is added automatically.
    #[arg(long = "participant", short = 'p')]
    participants: Vec<String>,
    #[arg(long)]
    description: Option<String>,
    /// Defaults to the payer.
    #[arg(long)]
    created_by: Option<String>,
}

#[derive(Args, Debug)]
struct PayArgs {
    #[arg(long)]
    debtor: String,
    #[arg(long)]
    creditor: String,
    #[arg(long)]
    amount: Money,
}

#[derive(Args, Debug)]
struct PaymentsArgs {
    participant: String,
    #[arg(long)]
    received: bool,
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "splitledger={level},engine={level},migration={level}",
            level = settings.app.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let url = cli.database_url.clone().or_else(|| settings.database.url());
    let ledger = match &url {
        Some(url) => {
            tracing::info!("opening ledger at {url}");
            Ledger::builder().database_url(url.as_str()).build().await?
        }
        None => {
            tracing::info!("using a volatile in-memory ledger");
            Ledger::builder().build().await?
        }
    };

    run(&ledger, url.as_deref(), cli).await
}

/// Store that `migrate` reports on. A volatile ledger has nothing to migrate.
fn migrate_target(url: Option<&str>) -> AppResult<&str> {
    url.ok_or_else(|| {
        "nothing to migrate: the ledger is in memory; set --database-url or [database] sqlite"
            .into()
    })
}

async fn run(ledger: &Ledger, url: Option<&str>, cli: Cli) -> AppResult<()> {
    let chat = ChatId::new(cli.chat);
    let json = cli.json;

    match cli.command {
        Command::Migrate => {
            // Opening the ledger already ran every pending migration.
            let target = migrate_target(url)?;
            tracing::info!("migrations applied to {target}");
        }
        Command::Order(args) => {
            let mut cmd = CreateOrderCmd::new(chat, args.payer, args.amount)
                .participants(args.participants);
            if let Some(description) = args.description {
                cmd = cmd.description(description);
            }
            if let Some(created_by) = args.created_by {
                cmd = cmd.created_by(created_by);
            }
            let order = ledger.create_order(cmd).await?;
            emit(json, &order, print_order)?;
        }
        Command::Pay(args) => {
            let receipt = ledger
                .record_payment(RecordPaymentCmd::new(
                    chat,
                    args.debtor,
                    args.creditor,
                    args.amount,
                ))
                .await?;
            emit(json, &receipt, |r| {
                let p = &r.payment;
                println!(
                    "{} paid {} to {}, {} remaining",
                    p.debtor, p.amount, p.creditor, r.remaining
                );
            })?;
        }
        Command::Debts { participant } => {
            let summary = ledger.get_my_debts(&participant, chat).await?;
            emit(json, &summary, |s| print_summary(s, "owes nobody"))?;
        }
        Command::Owed { participant } => {
            let summary = ledger.get_owed_to_me(&participant, chat).await?;
            emit(json, &summary, |s| print_summary(s, "is owed nothing"))?;
        }
        Command::Balance { participant } => {
            let view = ledger.consolidate(&participant, chat).await?;
            emit(json, &view, print_consolidated)?;
        }
        Command::Net { a, b } => {
            let net = ledger.debts().net_balance(&a, &b, chat).await?;
            emit(json, &net, |n| match (&n.debtor, &n.creditor) {
                (Some(debtor), Some(creditor)) => {
                    println!("{debtor} owes {creditor} {}", n.amount)
                }
                _ => println!("{a} and {b} are settled"),
            })?;
        }
        Command::All => {
            let summary = ledger.all_debts(chat).await?;
            emit(json, &summary, |s| print_summary(s, "no debts"))?;
        }
        Command::Orders => {
            let orders = ledger.orders().list_orders(chat).await?;
            emit(json, &orders, |orders| orders.iter().for_each(print_order))?;
        }
        Command::DeleteLast { participant } => {
            let order = ledger.delete_last_order(&participant, chat).await?;
            emit(json, &order, |o| {
                println!("deleted:");
                print_order(o);
            })?;
        }
        Command::Payments(args) => {
            let payments = if args.received {
                ledger.payments().payments_to(&args.participant, chat).await?
            } else {
                ledger.payments().payments_by(&args.participant, chat).await?
            };
            emit(json, &payments, |payments| {
                payments.iter().for_each(print_payment)
            })?;
        }
    }

    Ok(())
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T)) -> AppResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        text(value);
    }
    Ok(())
}

fn print_order(order: &Order) {
    let participants: Vec<&str> = order.participants.iter().map(|p| p.as_str()).collect();
    println!(
        "{} [{}] {} paid {} for {}: {} each ({})",
        order.created_at.format("%Y-%m-%d %H:%M"),
        order.id,
        order.payer,
        order.amount,
        order.label(),
        order.per_person,
        participants.join(", ")
    );
}

fn print_payment(payment: &Payment) {
    println!(
        "{} {} -> {}: {}",
        payment.created_at.format("%Y-%m-%d %H:%M"),
        payment.debtor,
        payment.creditor,
        payment.amount
    );
}

fn print_summary(summary: &DebtSummary, empty: &str) {
    if summary.is_empty() {
        println!("{empty}");
        return;
    }
    for debt in &summary.debts {
        match &debt.description {
            Some(description) => println!(
                "{} -> {}: {} ({description})",
                debt.debtor, debt.creditor, debt.amount
            ),
            None => println!("{} -> {}: {}", debt.debtor, debt.creditor, debt.amount),
        }
    }
    println!("total: {}", summary.total);
}

fn print_consolidated(view: &Consolidated) {
    if view.is_settled() {
        println!("{} is settled up", view.participant);
        return;
    }
    for balance in &view.balances {
        let part = |side: &Option<engine::DebtPart>| match side {
            Some(part) => part.amount,
            None => Money::ZERO,
        };
        match balance.direction {
            NetDirection::IOwe => println!(
                "owes {} {} (owed {}, receives {})",
                balance.counterparty,
                balance.net_amount,
                part(&balance.i_owe),
                part(&balance.they_owe)
            ),
            NetDirection::TheyOwe => println!(
                "{} owes {} (owed {}, receives {})",
                balance.counterparty,
                balance.net_amount,
                part(&balance.i_owe),
                part(&balance.they_owe)
            ),
        }
    }
    println!(
        "total owed: {}, total receivable: {}",
        view.total_i_owe, view.total_they_owe
    );
}
