//! Debt ledger: accumulation, queries and netting.

use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    ChatId, Debt, DebtKey, EngineError, Money, Order, ParticipantId, ResultEngine,
    debts::{push_label, remove_label},
    repository::{DebtFilter, LedgerTx, Repository, TxMode, with_tx},
    util::now,
};

/// Debts in one direction plus their sum.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtSummary {
    pub debts: Vec<Debt>,
    pub total: Money,
}

impl DebtSummary {
    fn new(debts: Vec<Debt>) -> Self {
        let total = debts.iter().map(|d| d.amount).sum();
        Self { debts, total }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.debts.is_empty()
    }
}

/// Net position between two participants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetBalance {
    pub amount: Money,
    /// `None` when the pair is settled.
    pub debtor: Option<ParticipantId>,
    pub creditor: Option<ParticipantId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetDirection {
    IOwe,
    TheyOwe,
}

/// One un-netted side of a counterparty relationship.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtPart {
    pub amount: Money,
    pub description: Option<String>,
}

impl From<&Debt> for DebtPart {
    fn from(debt: &Debt) -> Self {
        Self {
            amount: debt.amount,
            description: debt.description.clone(),
        }
    }
}

/// Netted balance with one counterparty, with its composition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterpartyBalance {
    pub counterparty: ParticipantId,
    pub i_owe: Option<DebtPart>,
    pub they_owe: Option<DebtPart>,
    /// Always positive; see `direction`.
    pub net_amount: Money,
    pub direction: NetDirection,
}

/// Consolidated view of a participant's position in a chat.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consolidated {
    pub participant: ParticipantId,
    pub chat_id: ChatId,
    /// Ordered by counterparty; settled pairs are left out.
    pub balances: Vec<CounterpartyBalance>,
    pub total_i_owe: Money,
    pub total_they_owe: Money,
}

impl Consolidated {
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.balances.is_empty()
    }

    #[must_use]
    pub fn with(&self, counterparty: &str) -> Option<&CounterpartyBalance> {
        self.balances
            .iter()
            .find(|b| b.counterparty.as_str() == counterparty)
    }
}

/// Nets `owed` (participant is debtor) against `credits` (participant is
/// creditor), one entry per counterparty.
pub fn consolidate_debts(
    participant: &ParticipantId,
    chat_id: ChatId,
    owed: &[Debt],
    credits: &[Debt],
) -> Consolidated {
    let mut pairs: BTreeMap<&ParticipantId, (Option<&Debt>, Option<&Debt>)> = BTreeMap::new();
    for debt in owed.iter().filter(|d| d.creditor != *participant) {
        pairs.entry(&debt.creditor).or_default().0 = Some(debt);
    }
    for debt in credits.iter().filter(|d| d.debtor != *participant) {
        pairs.entry(&debt.debtor).or_default().1 = Some(debt);
    }

    let mut balances = Vec::with_capacity(pairs.len());
    let mut total_i_owe = Money::ZERO;
    let mut total_they_owe = Money::ZERO;
    for (counterparty, (i_owe, they_owe)) in pairs {
        let mine = i_owe.map_or(Money::ZERO, |d| d.amount);
        let theirs = they_owe.map_or(Money::ZERO, |d| d.amount);
        let net = mine - theirs;
        let direction = if net.is_positive() {
            total_i_owe += net;
            NetDirection::IOwe
        } else if net.is_negative() {
            total_they_owe += net.abs();
            NetDirection::TheyOwe
        } else {
            continue;
        };
        balances.push(CounterpartyBalance {
            counterparty: counterparty.clone(),
            i_owe: i_owe.map(DebtPart::from),
            they_owe: they_owe.map(DebtPart::from),
            net_amount: net.abs(),
            direction,
        });
    }

    Consolidated {
        participant: participant.clone(),
        chat_id,
        balances,
        total_i_owe,
        total_they_owe,
    }
}

/// Owns the debt ledger. Reads go straight to the repository.
#[derive(Clone, Debug)]
pub struct DebtService {
    repository: Arc<dyn Repository>,
}

impl DebtService {
    #[must_use]
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Add `amount` to the debt `debtor -> creditor`, creating it if missing.
    pub async fn accumulate(
        &self,
        debtor: &str,
        creditor: &str,
        chat_id: ChatId,
        amount: Money,
        description: Option<&str>,
    ) -> ResultEngine<Debt> {
        let key = DebtKey::new(
            ParticipantId::new(debtor)?,
            ParticipantId::new(creditor)?,
            chat_id,
        );
        if key.debtor == key.creditor {
            return Err(EngineError::InvalidParticipant(format!(
                "\"{}\" cannot owe themselves",
                key.debtor
            )));
        }
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(format!(
                "debt increase must be positive, got {amount}"
            )));
        }
        if amount > Money::MAX_ORDER {
            return Err(EngineError::InvalidAmount(format!(
                "debt increase {amount} exceeds the limit of {}",
                Money::MAX_ORDER
            )));
        }
        let label = description.unwrap_or_default();
        with_tx!(self.repository, TxMode::Write, |tx| {
            Self::add_to_debt(tx.as_mut(), &key, amount, label).await
        })
    }

    /// Accumulate inside an open transaction. Self-debts and zero amounts are
    /// ignored and return `None`.
    pub(crate) async fn accumulate_in(
        tx: &mut dyn LedgerTx,
        key: &DebtKey,
        amount: Money,
        label: &str,
    ) -> ResultEngine<Option<Debt>> {
        if key.debtor == key.creditor || amount.is_zero() {
            return Ok(None);
        }
        Self::add_to_debt(tx, key, amount, label).await.map(Some)
    }

    async fn add_to_debt(
        tx: &mut dyn LedgerTx,
        key: &DebtKey,
        amount: Money,
        label: &str,
    ) -> ResultEngine<Debt> {
        let timestamp = now();
        let debt = match tx.get_debt(key).await? {
            Some(existing) => Debt {
                amount: existing.amount.checked_add(amount).ok_or_else(|| {
                    EngineError::InvalidAmount(format!(
                        "debt of {} cannot grow by {amount}",
                        existing.amount
                    ))
                })?,
                description: push_label(existing.description.as_deref(), label),
                updated_at: timestamp,
                ..existing
            },
            None => Debt {
                debtor: key.debtor.clone(),
                creditor: key.creditor.clone(),
                chat_id: key.chat_id,
                amount,
                description: push_label(None, label),
                created_at: timestamp,
                updated_at: timestamp,
            },
        };
        tx.save_debt(&debt).await?;
        tracing::debug!(
            chat_id = %key.chat_id,
            debtor = %key.debtor,
            creditor = %key.creditor,
            "debt accumulated to {}",
            debt.amount
        );
        Ok(debt)
    }

    /// Undo an order's contribution to each `(participant -> payer)` debt.
    ///
    /// Debts already (partly) paid are clamped at zero, and zero debts are
    /// deleted.
    pub(crate) async fn revert_order_in(tx: &mut dyn LedgerTx, order: &Order) -> ResultEngine<()> {
        for debtor in order.debtors() {
            let key = DebtKey::new(debtor.clone(), order.payer.clone(), order.chat_id);
            let Some(existing) = tx.get_debt(&key).await? else {
                continue;
            };
            let remaining = existing.amount.saturating_sub_to_zero(order.per_person);
            if remaining.is_zero() {
                tx.delete_debt(&key).await?;
                continue;
            }
            let debt = Debt {
                amount: remaining,
                description: remove_label(existing.description.as_deref(), order.label()),
                updated_at: now(),
                ..existing
            };
            tx.save_debt(&debt).await?;
        }
        Ok(())
    }

    /// Amount `debtor` owes `creditor`, zero when there is no debt.
    pub async fn get_debt(
        &self,
        debtor: &str,
        creditor: &str,
        chat_id: ChatId,
    ) -> ResultEngine<Money> {
        let key = DebtKey::new(
            ParticipantId::new(debtor)?,
            ParticipantId::new(creditor)?,
            chat_id,
        );
        tracing::debug!(
            chat_id = %chat_id,
            debtor = %key.debtor,
            creditor = %key.creditor,
            "reading debt"
        );
        let debt = with_tx!(self.repository, TxMode::Read, |tx| tx.get_debt(&key).await)?;
        Ok(debt.map_or(Money::ZERO, |d| d.amount))
    }

    /// Debts where `participant` is the debtor.
    pub async fn list_debts_of(
        &self,
        participant: &str,
        chat_id: ChatId,
    ) -> ResultEngine<DebtSummary> {
        let participant = ParticipantId::new(participant)?;
        tracing::debug!(chat_id = %chat_id, participant = %participant, "listing debts");
        let debts = with_tx!(self.repository, TxMode::Read, |tx| {
            tx.list_debts(chat_id, DebtFilter::Debtor(&participant)).await
        })?;
        Ok(DebtSummary::new(debts))
    }

    /// Debts where `participant` is the creditor.
    pub async fn list_credits_of(
        &self,
        participant: &str,
        chat_id: ChatId,
    ) -> ResultEngine<DebtSummary> {
        let participant = ParticipantId::new(participant)?;
        tracing::debug!(chat_id = %chat_id, participant = %participant, "listing credits");
        let debts = with_tx!(self.repository, TxMode::Read, |tx| {
            tx.list_debts(chat_id, DebtFilter::Creditor(&participant)).await
        })?;
        Ok(DebtSummary::new(debts))
    }

    pub async fn total_owed_by(&self, participant: &str, chat_id: ChatId) -> ResultEngine<Money> {
        Ok(self.list_debts_of(participant, chat_id).await?.total)
    }

    pub async fn total_owed_to(&self, participant: &str, chat_id: ChatId) -> ResultEngine<Money> {
        Ok(self.list_credits_of(participant, chat_id).await?.total)
    }

    /// Every debt in the chat, ordered by `(debtor, creditor)`.
    pub async fn list_all(&self, chat_id: ChatId) -> ResultEngine<DebtSummary> {
        let debts = with_tx!(self.repository, TxMode::Read, |tx| {
            tx.list_debts(chat_id, DebtFilter::All).await
        })?;
        Ok(DebtSummary::new(debts))
    }

    /// Net position between `a` and `b`.
    pub async fn net_balance(&self, a: &str, b: &str, chat_id: ChatId) -> ResultEngine<NetBalance> {
        let a = ParticipantId::new(a)?;
        let b = ParticipantId::new(b)?;
        let forward = DebtKey::new(a.clone(), b.clone(), chat_id);
        let backward = forward.reversed();
        let (a_to_b, b_to_a) = with_tx!(self.repository, TxMode::Read, |tx| {
            let a_to_b = tx.get_debt(&forward).await?;
            let b_to_a = tx.get_debt(&backward).await?;
            Ok::<_, EngineError>((a_to_b, b_to_a))
        })?;
        let net =
            a_to_b.map_or(Money::ZERO, |d| d.amount) - b_to_a.map_or(Money::ZERO, |d| d.amount);
        Ok(if net.is_positive() {
            NetBalance {
                amount: net,
                debtor: Some(a),
                creditor: Some(b),
            }
        } else if net.is_negative() {
            NetBalance {
                amount: net.abs(),
                debtor: Some(b),
                creditor: Some(a),
            }
        } else {
            NetBalance {
                amount: Money::ZERO,
                debtor: None,
                creditor: None,
            }
        })
    }

    /// Netted view of everything `participant` owes or is owed in the chat.
    pub async fn consolidate(
        &self,
        participant: &str,
        chat_id: ChatId,
    ) -> ResultEngine<Consolidated> {
        let participant = ParticipantId::new(participant)?;
        tracing::debug!(chat_id = %chat_id, participant = %participant, "consolidating debts");
        let (owed, credits) = with_tx!(self.repository, TxMode::Read, |tx| {
            let owed = tx.list_debts(chat_id, DebtFilter::Debtor(&participant)).await?;
            let credits = tx.list_debts(chat_id, DebtFilter::Creditor(&participant)).await?;
            Ok::<_, EngineError>((owed, credits))
        })?;
        Ok(consolidate_debts(&participant, chat_id, &owed, &credits))
    }
}
