//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API.

use chrono::{DateTime, SubsecRound, Utc};
use sea_orm::DbErr;
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| EngineError::Persistence(DbErr::Type(format!("invalid {label} id: {value}"))))
}

/// Current time at millisecond precision, so timestamps survive a store round-trip.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Trim free text and drop it when empty.
pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}
