//! Journal user account.

use crate::domain::TimeMs;
use serde::{Deserialize, Serialize};

/// A registered user. The password hash lives only in the store and is
/// fetched separately for authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub is_superuser: bool,
    pub date_joined: TimeMs,
}
