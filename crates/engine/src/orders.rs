//! Orders: shared expenses split equally among participants.
//!
//! An [`Order`] is written once and never updated. It fans out into one debt
//! accumulation per non-payer participant.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    ChatId, EngineError, Money, ParticipantId,
    participants::{join_participants, split_participants},
    util::parse_uuid,
};

/// Label used for debts whose originating order has no description.
pub const DEFAULT_ORDER_LABEL: &str = "order";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub chat_id: ChatId,
    pub description: Option<String>,
    pub amount: Money,
    /// Rounded share owed by each participant.
    pub per_person: Money,
    pub payer: ParticipantId,
    /// Unique participants, payer included.
    pub participants: Vec<ParticipantId>,
    pub created_by: ParticipantId,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Label attached to the debts this order creates.
    #[must_use]
    pub fn label(&self) -> &str {
        self.description.as_deref().unwrap_or(DEFAULT_ORDER_LABEL)
    }

    /// Participants that owe the payer a share.
    pub fn debtors(&self) -> impl Iterator<Item = &ParticipantId> {
        self.participants.iter().filter(|p| **p != self.payer)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub chat_id: i64,
    pub description: Option<String>,
    pub amount_minor: i64,
    pub per_person_minor: i64,
    pub payer: String,
    pub participants: String,
    pub created_by: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Order> for ActiveModel {
    fn from(order: &Order) -> Self {
        Self {
            id: ActiveValue::Set(order.id.to_string()),
            chat_id: ActiveValue::Set(order.chat_id.get()),
            description: ActiveValue::Set(order.description.clone()),
            amount_minor: ActiveValue::Set(order.amount.minor()),
            per_person_minor: ActiveValue::Set(order.per_person.minor()),
            payer: ActiveValue::Set(order.payer.to_string()),
            participants: ActiveValue::Set(join_participants(&order.participants)),
            created_by: ActiveValue::Set(order.created_by.to_string()),
            created_at: ActiveValue::Set(order.created_at),
        }
    }
}

impl TryFrom<Model> for Order {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let payer = ParticipantId::new(&model.payer)?;
        // Rows written before the creator column existed carry an empty string.
        let created_by = if model.created_by.trim().is_empty() {
            payer.clone()
        } else {
            ParticipantId::new(&model.created_by)?
        };
        Ok(Self {
            id: parse_uuid(&model.id, "order")?,
            chat_id: ChatId::new(model.chat_id),
            description: model.description,
            amount: Money::new(model.amount_minor),
            per_person: Money::new(model.per_person_minor),
            payer,
            participants: split_participants(&model.participants)?,
            created_by,
            created_at: model.created_at,
        })
    }
}
