//! Command structs for ledger write operations.
//!
//! Participant handles arrive as raw strings from the chat front end and are
//! validated by the services, once, at the boundary.

use crate::{ChatId, Money};

/// Record a shared expense split equally among participants.
#[derive(Clone, Debug)]
pub struct CreateOrderCmd {
    pub chat_id: ChatId,
    pub description: Option<String>,
    pub amount: Money,
    pub payer: String,
    /// May omit the payer; it is added during normalization.
    pub participants: Vec<String>,
    pub created_by: String,
}

impl CreateOrderCmd {
    /// New order paid (and created) by `payer`, with no other participants yet.
    #[must_use]
    pub fn new(chat_id: impl Into<ChatId>, payer: impl Into<String>, amount: Money) -> Self {
        let payer = payer.into();
        Self {
            chat_id: chat_id.into(),
            description: None,
            amount,
            created_by: payer.clone(),
            payer,
            participants: Vec::new(),
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn participant(mut self, participant: impl Into<String>) -> Self {
        self.participants.push(participant.into());
        self
    }

    #[must_use]
    pub fn participants<I, S>(mut self, participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.participants
            .extend(participants.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = created_by.into();
        self
    }
}

/// Pay back (part of) the debt `debtor -> creditor`.
#[derive(Clone, Debug)]
pub struct RecordPaymentCmd {
    pub chat_id: ChatId,
    pub debtor: String,
    pub creditor: String,
    pub amount: Money,
}

impl RecordPaymentCmd {
    #[must_use]
    pub fn new(
        chat_id: impl Into<ChatId>,
        debtor: impl Into<String>,
        creditor: impl Into<String>,
        amount: Money,
    ) -> Self {
        Self {
            chat_id: chat_id.into(),
            debtor: debtor.into(),
            creditor: creditor.into(),
            amount,
        }
    }
}
