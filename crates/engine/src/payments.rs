//! Payments: append-only audit records of debt reductions.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ChatId, EngineError, Money, ParticipantId, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub debtor: ParticipantId,
    pub creditor: ParticipantId,
    pub chat_id: ChatId,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub debtor: String,
    pub creditor: String,
    pub chat_id: i64,
    pub amount_minor: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Payment> for ActiveModel {
    fn from(payment: &Payment) -> Self {
        Self {
            id: ActiveValue::Set(payment.id.to_string()),
            debtor: ActiveValue::Set(payment.debtor.to_string()),
            creditor: ActiveValue::Set(payment.creditor.to_string()),
            chat_id: ActiveValue::Set(payment.chat_id.get()),
            amount_minor: ActiveValue::Set(payment.amount.minor()),
            created_at: ActiveValue::Set(payment.created_at),
        }
    }
}

impl TryFrom<Model> for Payment {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "payment")?,
            debtor: ParticipantId::new(&model.debtor)?,
            creditor: ParticipantId::new(&model.creditor)?,
            chat_id: ChatId::new(model.chat_id),
            amount: Money::new(model.amount_minor),
            created_at: model.created_at,
        })
    }
}
