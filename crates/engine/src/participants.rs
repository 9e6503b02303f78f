//! Identity types shared by every ledger entity.
//!
//! A [`ParticipantId`] is an opaque handle (a chat username in practice). The
//! engine never interprets it beyond equality and ordering, but rejects values
//! that would break storage: empty strings, whitespace and the `,` separator
//! used to store order participant lists.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// Separator used to persist participant lists in a single column.
pub(crate) const PARTICIPANT_SEPARATOR: char = ',';

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Validates a raw handle. Surrounding whitespace is trimmed.
    pub fn new(raw: impl AsRef<str>) -> ResultEngine<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(EngineError::InvalidParticipant(
                "participant must not be empty".to_string(),
            ));
        }
        if trimmed
            .chars()
            .any(|c| c == PARTICIPANT_SEPARATOR || c.is_whitespace() || c.is_control())
        {
            return Err(EngineError::InvalidParticipant(format!(
                "participant \"{trimmed}\" contains a separator character"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ParticipantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ParticipantId {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ParticipantId {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ParticipantId> for String {
    fn from(value: ParticipantId) -> Self {
        value.0
    }
}

/// Tenant scope: one chat group. Rows written before chats existed live in
/// [`ChatId::LEGACY`].
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChatId(i64);

impl ChatId {
    pub const LEGACY: ChatId = ChatId(0);

    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ChatId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Serializes a participant list for the `orders.participants` column.
pub(crate) fn join_participants(participants: &[ParticipantId]) -> String {
    participants
        .iter()
        .map(ParticipantId::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// Inverse of [`join_participants`].
pub(crate) fn split_participants(raw: &str) -> ResultEngine<Vec<ParticipantId>> {
    raw.split(PARTICIPANT_SEPARATOR)
        .filter(|s| !s.trim().is_empty())
        .map(ParticipantId::new)
        .collect()
}
