//! Bank directory entries

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A lending institution known to the broker
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct Bank {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
}
