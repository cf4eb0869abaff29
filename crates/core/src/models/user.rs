use serde::{Deserialize, Serialize};

use super::common::UserStatus;

/// A user record held by the remote directory service.
///
/// The `id` is assigned remotely on creation; the lower-cased email is the
/// only cross-system join key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DirectoryUser {
    pub id: i64,
    pub email: String,
    pub status: UserStatus,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub organization_id: i64,
    #[serde(rename = "type", default)]
    pub user_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl DirectoryUser {
    /// The case-insensitive identity key used for matching across systems.
    pub fn email_key(&self) -> String {
        self.email.to_lowercase()
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}
