//! Audit trail entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::id::{AccessLogId, SecretId, UserId};

/// Operation recorded by an access log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    Create,
    View,
    Delete,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::Create => "create",
            AccessType::View => "view",
            AccessType::Delete => "delete",
        }
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(AccessType::Create),
            "view" => Ok(AccessType::View),
            "delete" => Ok(AccessType::Delete),
            other => Err(format!("unknown access type '{}'", other)),
        }
    }
}

/// Client metadata attached to every audit entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOrigin {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Append payload
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccessLogEntry {
    pub password_id: Option<SecretId>,
    pub accessed_by: Option<UserId>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub access_type: AccessType,
    pub success: bool,
}

/// A stored entry joined with the actor's username and the secret's title
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AccessLogEntry {
    pub id: AccessLogId,
    pub password_id: Option<SecretId>,
    pub accessed_by: Option<UserId>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub access_type: AccessType,
    pub success: bool,
    pub created_at: DateTime<Utc>,
    pub username: Option<String>,
    pub password_title: Option<String>,
}

/// Admin query filters; every field narrows the result when set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccessLogFilter {
    pub password_id: Option<SecretId>,
    pub accessed_by: Option<UserId>,
    pub access_type: Option<AccessType>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Dashboard counters
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct AccessStatistics {
    pub total_users: i64,
    pub active_users: i64,
    pub total_passwords: i64,
    pub active_passwords: i64,
    pub total_accesses: i64,
    pub accesses_today: i64,
    pub accesses_this_week: i64,
    pub accesses_this_month: i64,
}
