//! Process-local repository.
//!
//! The whole state sits behind one async mutex. A transaction holds the lock
//! from `begin` until it is committed or dropped, so transactions never
//! interleave. Writes apply in place and record how to undo them; a
//! transaction dropped or rolled back replays that log backwards.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{ChatId, Debt, DebtKey, Order, Payment, ResultEngine};

use super::{DebtFilter, LedgerTx, OrderFilter, PaymentFilter, Repository, TxMode};

#[derive(Debug, Default)]
struct State {
    orders: BTreeMap<(ChatId, Uuid), Order>,
    debts: BTreeMap<DebtKey, Debt>,
    payments: Vec<Payment>,
}

/// In-memory [`Repository`]. Cloning shares the same underlying state.
#[derive(Clone, Debug, Default)]
pub struct MemoryRepository {
    state: Arc<Mutex<State>>,
}

impl MemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn begin(&self, _mode: TxMode) -> ResultEngine<Box<dyn LedgerTx>> {
        let guard = self.state.clone().lock_owned().await;
        Ok(Box::new(MemoryTx {
            guard,
            undo: Vec::new(),
        }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<State>,
    undo: Vec<Undo>,
}

/// Previous value of an entry touched by the open transaction.
enum Undo {
    Order((ChatId, Uuid), Option<Order>),
    Debt(DebtKey, Option<Debt>),
    Payment,
}

impl MemoryTx {
    fn revert(&mut self) {
        let state = &mut *self.guard;
        while let Some(entry) = self.undo.pop() {
            match entry {
                Undo::Order(key, Some(order)) => {
                    state.orders.insert(key, order);
                }
                Undo::Order(key, None) => {
                    state.orders.remove(&key);
                }
                Undo::Debt(key, Some(debt)) => {
                    state.debts.insert(key, debt);
                }
                Undo::Debt(key, None) => {
                    state.debts.remove(&key);
                }
                Undo::Payment => {
                    state.payments.pop();
                }
            }
        }
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        self.revert();
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn save_order(&mut self, order: &Order) -> ResultEngine<()> {
        let key = (order.chat_id, order.id);
        let previous = self.guard.orders.insert(key, order.clone());
        self.undo.push(Undo::Order(key, previous));
        Ok(())
    }

    async fn get_order(&mut self, chat_id: ChatId, id: Uuid) -> ResultEngine<Option<Order>> {
        Ok(self.guard.orders.get(&(chat_id, id)).cloned())
    }

    async fn list_orders(
        &mut self,
        chat_id: ChatId,
        filter: OrderFilter<'_>,
    ) -> ResultEngine<Vec<Order>> {
        // Ids are v7 UUIDs, so key order within a chat is creation order.
        Ok(self
            .guard
            .orders
            .range((chat_id, Uuid::nil())..=(chat_id, Uuid::max()))
            .rev()
            .map(|(_, order)| order)
            .filter(|order| filter.matches(order))
            .cloned()
            .collect())
    }

    async fn delete_order(&mut self, chat_id: ChatId, id: Uuid) -> ResultEngine<()> {
        let key = (chat_id, id);
        if let Some(previous) = self.guard.orders.remove(&key) {
            self.undo.push(Undo::Order(key, Some(previous)));
        }
        Ok(())
    }

    async fn save_debt(&mut self, debt: &Debt) -> ResultEngine<()> {
        let key = debt.key();
        let previous = self.guard.debts.insert(key.clone(), debt.clone());
        self.undo.push(Undo::Debt(key, previous));
        Ok(())
    }

    async fn get_debt(&mut self, key: &DebtKey) -> ResultEngine<Option<Debt>> {
        Ok(self.guard.debts.get(key).cloned())
    }

    async fn list_debts(
        &mut self,
        chat_id: ChatId,
        filter: DebtFilter<'_>,
    ) -> ResultEngine<Vec<Debt>> {
        Ok(self
            .guard
            .debts
            .iter()
            .filter(|(key, debt)| key.chat_id == chat_id && filter.matches(debt))
            .map(|(_, debt)| debt.clone())
            .collect())
    }

    async fn delete_debt(&mut self, key: &DebtKey) -> ResultEngine<()> {
        if let Some(previous) = self.guard.debts.remove(key) {
            self.undo.push(Undo::Debt(key.clone(), Some(previous)));
        }
        Ok(())
    }

    async fn save_payment(&mut self, payment: &Payment) -> ResultEngine<()> {
        self.guard.payments.push(payment.clone());
        self.undo.push(Undo::Payment);
        Ok(())
    }

    async fn list_payments(
        &mut self,
        chat_id: ChatId,
        filter: PaymentFilter<'_>,
    ) -> ResultEngine<Vec<Payment>> {
        Ok(self
            .guard
            .payments
            .iter()
            .rev()
            .filter(|p| p.chat_id == chat_id && filter.matches(p))
            .cloned()
            .collect())
    }

    async fn commit(self: Box<Self>) -> ResultEngine<()> {
        let mut this = self;
        this.undo.clear();
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> ResultEngine<()> {
        let mut this = self;
        this.revert();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{Money, ParticipantId};

    fn debt(debtor: &str, creditor: &str, chat: i64, minor: i64) -> Debt {
        let now = Utc::now();
        Debt {
            debtor: ParticipantId::new(debtor).unwrap(),
            creditor: ParticipantId::new(creditor).unwrap(),
            chat_id: ChatId::new(chat),
            amount: Money::new(minor),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn dropped_transaction_leaves_no_trace() {
        let repo = MemoryRepository::new();
        {
            let mut tx = repo.begin(TxMode::Write).await.unwrap();
            tx.save_debt(&debt("petya", "ivan", 1, 100)).await.unwrap();
            // dropped without commit
        }
        let mut tx = repo.begin(TxMode::Read).await.unwrap();
        let all = tx.list_debts(ChatId::new(1), DebtFilter::All).await.unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn writes_visible_inside_and_after_commit() {
        let repo = MemoryRepository::new();
        let d = debt("petya", "ivan", 1, 100);

        let mut tx = repo.begin(TxMode::Write).await.unwrap();
        tx.save_debt(&d).await.unwrap();
        assert_eq!(tx.get_debt(&d.key()).await.unwrap(), Some(d.clone()));
        tx.commit().await.unwrap();

        let mut tx = repo.begin(TxMode::Read).await.unwrap();
        assert_eq!(tx.get_debt(&d.key()).await.unwrap(), Some(d));
    }

    #[tokio::test]
    async fn debts_listed_per_chat_in_key_order() {
        let repo = MemoryRepository::new();
        let mut tx = repo.begin(TxMode::Write).await.unwrap();
        for d in [
            debt("petya", "ivan", 1, 100),
            debt("masha", "ivan", 1, 200),
            debt("masha", "ivan", 2, 300),
        ] {
            tx.save_debt(&d).await.unwrap();
        }
        tx.commit().await.unwrap();

        let mut tx = repo.begin(TxMode::Read).await.unwrap();
        let chat1 = tx.list_debts(ChatId::new(1), DebtFilter::All).await.unwrap();
        let debtors: Vec<_> = chat1.iter().map(|d| d.debtor.as_str()).collect();
        assert_eq!(debtors, ["masha", "petya"]);

        let chat2 = tx.list_debts(ChatId::new(2), DebtFilter::All).await.unwrap();
        assert_eq!(chat2.len(), 1);
        assert_eq!(chat2[0].amount, Money::new(300));
    }

    #[tokio::test]
    async fn rollback_restores_touched_entries_only() {
        let repo = MemoryRepository::new();
        let kept = debt("petya", "ivan", 1, 100);
        let gone = debt("masha", "ivan", 1, 200);
        let mut tx = repo.begin(TxMode::Write).await.unwrap();
        tx.save_debt(&kept).await.unwrap();
        tx.save_debt(&gone).await.unwrap();
        tx.commit().await.unwrap();

        let payment = Payment {
            id: Uuid::now_v7(),
            chat_id: ChatId::new(1),
            debtor: kept.debtor.clone(),
            creditor: kept.creditor.clone(),
            amount: Money::new(40),
            created_at: Utc::now(),
        };
        let mut tx = repo.begin(TxMode::Write).await.unwrap();
        tx.save_debt(&debt("petya", "ivan", 1, 60)).await.unwrap();
        tx.delete_debt(&gone.key()).await.unwrap();
        tx.save_debt(&debt("sasha", "ivan", 1, 10)).await.unwrap();
        tx.save_payment(&payment).await.unwrap();
        let seen = tx.list_payments(ChatId::new(1), PaymentFilter::All).await.unwrap();
        assert_eq!(seen, vec![payment]);
        tx.rollback().await.unwrap();

        let mut tx = repo.begin(TxMode::Read).await.unwrap();
        let all = tx.list_debts(ChatId::new(1), DebtFilter::All).await.unwrap();
        assert_eq!(all, vec![gone, kept]);
        let payments = tx.list_payments(ChatId::new(1), PaymentFilter::All).await.unwrap();
        assert!(payments.is_empty());
    }
}
