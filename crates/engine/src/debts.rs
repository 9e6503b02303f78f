//! Debts: what one participant owes another inside one chat.
//!
//! A debt is identified by `(debtor, creditor, chat_id)`. The amount is always
//! positive in storage: a debt that reaches zero is deleted, never kept as a
//! zero row.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{ChatId, EngineError, Money, ParticipantId};

/// Separator between order labels accumulated on the same debt.
const LABEL_SEPARATOR: &str = ", ";

/// Stands in for the separator inside a single label.
const LABEL_SEPARATOR_ESCAPE: &str = "; ";

/// Identity of a debt row.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DebtKey {
    pub chat_id: ChatId,
    pub debtor: ParticipantId,
    pub creditor: ParticipantId,
}

impl DebtKey {
    #[must_use]
    pub fn new(debtor: ParticipantId, creditor: ParticipantId, chat_id: ChatId) -> Self {
        Self {
            chat_id,
            debtor,
            creditor,
        }
    }

    /// Same pair, opposite direction.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            chat_id: self.chat_id,
            debtor: self.creditor.clone(),
            creditor: self.debtor.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Debt {
    pub debtor: ParticipantId,
    pub creditor: ParticipantId,
    pub chat_id: ChatId,
    pub amount: Money,
    /// Comma-separated labels of the orders that built this debt.
    ///
    /// Labels are stored escaped: a `", "` inside an order description reads
    /// as `"; "` here, so this is not the original description text. Use
    /// [`Debt::labels`] to get the individual entries.
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Debt {
    #[must_use]
    pub fn key(&self) -> DebtKey {
        DebtKey::new(self.debtor.clone(), self.creditor.clone(), self.chat_id)
    }

    /// Individual order labels, in accumulation order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.description
            .as_deref()
            .unwrap_or_default()
            .split(LABEL_SEPARATOR)
            .filter(|s| !s.is_empty())
    }
}

/// A label as stored: the separator never appears inside it.
fn label_entry(label: &str) -> String {
    label.replace(LABEL_SEPARATOR, LABEL_SEPARATOR_ESCAPE)
}

/// Appends `label` to an accumulated description.
pub(crate) fn push_label(description: Option<&str>, label: &str) -> Option<String> {
    let label = label_entry(label);
    match description.filter(|d| !d.is_empty()) {
        Some(existing) if label.is_empty() => Some(existing.to_string()),
        Some(existing) => Some(format!("{existing}{LABEL_SEPARATOR}{label}")),
        None if label.is_empty() => None,
        None => Some(label.to_string()),
    }
}

/// Removes the first occurrence of `label` from an accumulated description.
pub(crate) fn remove_label(description: Option<&str>, label: &str) -> Option<String> {
    let description = description?;
    let label = label_entry(label);
    let mut labels: Vec<&str> = description
        .split(LABEL_SEPARATOR)
        .filter(|s| !s.is_empty())
        .collect();
    if let Some(pos) = labels.iter().position(|l| *l == label) {
        labels.remove(pos);
    }
    (!labels.is_empty()).then(|| labels.join(LABEL_SEPARATOR))
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "debts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub debtor: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub creditor: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub chat_id: i64,
    pub amount_minor: i64,
    pub description: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Debt> for ActiveModel {
    fn from(debt: &Debt) -> Self {
        Self {
            debtor: ActiveValue::Set(debt.debtor.to_string()),
            creditor: ActiveValue::Set(debt.creditor.to_string()),
            chat_id: ActiveValue::Set(debt.chat_id.get()),
            amount_minor: ActiveValue::Set(debt.amount.minor()),
            description: ActiveValue::Set(debt.description.clone()),
            created_at: ActiveValue::Set(debt.created_at),
            updated_at: ActiveValue::Set(debt.updated_at),
        }
    }
}

impl TryFrom<Model> for Debt {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            debtor: ParticipantId::new(&model.debtor)?,
            creditor: ParticipantId::new(&model.creditor)?,
            chat_id: ChatId::new(model.chat_id),
            amount: Money::new(model.amount_minor),
            description: model.description.filter(|d| !d.is_empty()),
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
