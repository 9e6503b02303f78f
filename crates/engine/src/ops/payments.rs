use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    ChatId, Debt, DebtKey, EngineError, Money, ParticipantId, Payment, RecordPaymentCmd,
    ResultEngine,
    repository::{LedgerTx, PaymentFilter, Repository, TxMode, with_tx},
    util::now,
};

/// Outcome of an applied payment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub payment: Payment,
    /// What is still owed on the same debt; zero once it is settled.
    pub remaining: Money,
}

/// Applies payments against existing debts.
#[derive(Clone, Debug)]
pub struct PaymentService {
    repository: Arc<dyn Repository>,
}

impl PaymentService {
    #[must_use]
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Reduce the debt `debtor -> creditor` by `amount` and append the audit
    /// record, atomically.
    ///
    /// The debt is deleted once it reaches zero. A payment larger than the
    /// debt is rejected without touching it; the reverse direction is never
    /// involved.
    pub async fn record_payment(&self, cmd: RecordPaymentCmd) -> ResultEngine<PaymentReceipt> {
        let RecordPaymentCmd {
            chat_id,
            debtor,
            creditor,
            amount,
        } = cmd;

        if !amount.is_positive() {
            tracing::warn!(chat_id = %chat_id, "payment rejected: non-positive amount {amount}");
            return Err(EngineError::InvalidPaymentAmount(format!(
                "payment must be positive, got {amount}"
            )));
        }
        let key = DebtKey::new(
            ParticipantId::new(&debtor)?,
            ParticipantId::new(&creditor)?,
            chat_id,
        );

        let receipt = with_tx!(self.repository, TxMode::Write, |tx| {
            Self::apply_in(tx.as_mut(), &key, amount).await
        });

        match &receipt {
            Ok(receipt) => tracing::info!(
                chat_id = %chat_id,
                debtor = %key.debtor,
                creditor = %key.creditor,
                "payment of {} applied, {} remaining",
                receipt.payment.amount,
                receipt.remaining
            ),
            Err(err) if err.is_validation() => {
                tracing::warn!(chat_id = %chat_id, debtor = %key.debtor, "payment rejected: {err}")
            }
            Err(err) => tracing::error!(chat_id = %chat_id, "payment failed: {err}"),
        }
        receipt
    }

    async fn apply_in(
        tx: &mut dyn LedgerTx,
        key: &DebtKey,
        amount: Money,
    ) -> ResultEngine<PaymentReceipt> {
        let debt = tx
            .get_debt(key)
            .await?
            .ok_or_else(|| EngineError::DebtNotFound {
                debtor: key.debtor.to_string(),
                creditor: key.creditor.to_string(),
            })?;
        if amount > debt.amount {
            return Err(EngineError::PaymentExceedsDebt {
                requested: amount,
                outstanding: debt.amount,
            });
        }

        let timestamp = now();
        let remaining = debt.amount - amount;
        if remaining.is_zero() {
            tx.delete_debt(key).await?;
        } else {
            tx.save_debt(&Debt {
                amount: remaining,
                updated_at: timestamp,
                ..debt
            })
            .await?;
        }

        let payment = Payment {
            id: Uuid::now_v7(),
            debtor: key.debtor.clone(),
            creditor: key.creditor.clone(),
            chat_id: key.chat_id,
            amount,
            created_at: timestamp,
        };
        tx.save_payment(&payment).await?;
        Ok(PaymentReceipt { payment, remaining })
    }

    /// Payments made by `participant`, newest first.
    pub async fn payments_by(
        &self,
        participant: &str,
        chat_id: ChatId,
    ) -> ResultEngine<Vec<Payment>> {
        let participant = ParticipantId::new(participant)?;
        with_tx!(self.repository, TxMode::Read, |tx| {
            tx.list_payments(chat_id, PaymentFilter::Debtor(&participant)).await
        })
    }

    /// Payments received by `participant`, newest first.
    pub async fn payments_to(
        &self,
        participant: &str,
        chat_id: ChatId,
    ) -> ResultEngine<Vec<Payment>> {
        let participant = ParticipantId::new(participant)?;
        with_tx!(self.repository, TxMode::Read, |tx| {
            tx.list_payments(chat_id, PaymentFilter::Creditor(&participant)).await
        })
    }
}
