use std::sync::Arc;

use uuid::Uuid;

use crate::{
    ChatId, CreateOrderCmd, DebtKey, EngineError, Money, Order, ParticipantId, ResultEngine,
    repository::{OrderFilter, Repository, TxMode, with_tx},
    util::{normalize_optional_text, now},
};

use super::DebtService;

const MIN_PARTICIPANTS: usize = 2;

/// Validates and records orders, and fans them out into debts.
#[derive(Clone, Debug)]
pub struct OrderService {
    repository: Arc<dyn Repository>,
}

impl OrderService {
    #[must_use]
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Create an order and accumulate each participant's share onto their
    /// debt to the payer, atomically.
    ///
    /// The payer is added to the participants when missing and duplicates are
    /// dropped. Shares are rounded half-up independently, so their sum may
    /// differ from the total by a minor unit.
    pub async fn create_order(&self, cmd: CreateOrderCmd) -> ResultEngine<Order> {
        let CreateOrderCmd {
            chat_id,
            description,
            amount,
            payer,
            participants,
            created_by,
        } = cmd;

        if let Err(err) = validate_amount(amount) {
            tracing::warn!(chat_id = %chat_id, "order rejected: {err}");
            return Err(err);
        }
        let payer = ParticipantId::new(&payer)?;
        let created_by = ParticipantId::new(&created_by)?;
        let participants = normalize_participants(&payer, &participants)?;
        if participants.len() < MIN_PARTICIPANTS {
            tracing::warn!(
                chat_id = %chat_id,
                payer = %payer,
                "order rejected: not enough participants"
            );
            return Err(EngineError::InsufficientParticipants(participants.len()));
        }
        let per_person = amount
            .split(participants.len())
            .ok_or(EngineError::InsufficientParticipants(0))?;

        let order = Order {
            id: Uuid::now_v7(),
            chat_id,
            description: normalize_optional_text(description.as_deref()),
            amount,
            per_person,
            payer,
            participants,
            created_by,
            created_at: now(),
        };

        with_tx!(self.repository, TxMode::Write, |tx| {
            tx.save_order(&order).await?;
            for debtor in order.debtors() {
                let key = DebtKey::new(debtor.clone(), order.payer.clone(), order.chat_id);
                DebtService::accumulate_in(tx.as_mut(), &key, order.per_person, order.label())
                    .await?;
            }
            Ok::<_, EngineError>(())
        })?;

        tracing::info!(
            chat_id = %order.chat_id,
            order_id = %order.id,
            payer = %order.payer,
            "order created: {} split {} ways ({} each)",
            order.amount,
            order.participants.len(),
            order.per_person
        );
        Ok(order)
    }

    pub async fn get_order(&self, chat_id: ChatId, id: Uuid) -> ResultEngine<Order> {
        with_tx!(self.repository, TxMode::Read, |tx| tx.get_order(chat_id, id).await)?
            .ok_or_else(|| EngineError::OrderNotFound(id.to_string()))
    }

    /// Orders of the chat, newest first.
    pub async fn list_orders(&self, chat_id: ChatId) -> ResultEngine<Vec<Order>> {
        with_tx!(self.repository, TxMode::Read, |tx| {
            tx.list_orders(chat_id, OrderFilter::All).await
        })
    }

    /// Newest order `created_by` recorded in the chat.
    pub async fn last_order(
        &self,
        created_by: &str,
        chat_id: ChatId,
    ) -> ResultEngine<Option<Order>> {
        let created_by = ParticipantId::new(created_by)?;
        let orders = with_tx!(self.repository, TxMode::Read, |tx| {
            tx.list_orders(chat_id, OrderFilter::CreatedBy(&created_by)).await
        })?;
        Ok(orders.into_iter().next())
    }

    /// Delete an order and take its shares back off the debts it created.
    pub async fn delete_order(&self, chat_id: ChatId, id: Uuid) -> ResultEngine<Order> {
        let order = with_tx!(self.repository, TxMode::Write, |tx| {
            let order = tx
                .get_order(chat_id, id)
                .await?
                .ok_or_else(|| EngineError::OrderNotFound(id.to_string()))?;
            DebtService::revert_order_in(tx.as_mut(), &order).await?;
            tx.delete_order(chat_id, id).await?;
            Ok::<_, EngineError>(order)
        })?;
        tracing::info!(chat_id = %chat_id, order_id = %id, "order deleted");
        Ok(order)
    }

    /// Delete the newest order `created_by` recorded in the chat.
    pub async fn delete_last_order(
        &self,
        created_by: &str,
        chat_id: ChatId,
    ) -> ResultEngine<Order> {
        let creator = ParticipantId::new(created_by)?;
        let order = with_tx!(self.repository, TxMode::Write, |tx| {
            let order = tx
                .list_orders(chat_id, OrderFilter::CreatedBy(&creator))
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| EngineError::OrderNotFound(format!("last order of {creator}")))?;
            DebtService::revert_order_in(tx.as_mut(), &order).await?;
            tx.delete_order(chat_id, order.id).await?;
            Ok::<_, EngineError>(order)
        })?;
        tracing::info!(chat_id = %chat_id, order_id = %order.id, "last order of {creator} deleted");
        Ok(order)
    }
}

fn validate_amount(amount: Money) -> ResultEngine<()> {
    if !amount.is_positive() {
        return Err(EngineError::InvalidAmount(format!(
            "amount must be positive, got {amount}"
        )));
    }
    if amount > Money::MAX_ORDER {
        return Err(EngineError::InvalidAmount(format!(
            "amount {amount} exceeds the limit of {}",
            Money::MAX_ORDER
        )));
    }
    Ok(())
}

/// Payer first, then the listed participants in order, without duplicates.
fn normalize_participants(
    payer: &ParticipantId,
    raw: &[String],
) -> ResultEngine<Vec<ParticipantId>> {
    let mut participants = vec![payer.clone()];
    for candidate in raw {
        let candidate = ParticipantId::new(candidate)?;
        if !participants.contains(&candidate) {
            participants.push(candidate);
        }
    }
    Ok(participants)
}
