//! Database row types for all tables.
//! These correspond 1:1 to the SQLite schema defined in migrations.rs.

use serde::Serialize;

/// User record in the users table. Rows are seeded by the identity layer;
/// this crate only reads them.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub role: Role,
    pub created_at: String,
}

/// Portal roles carried in JWT claims and the users table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Advisor,
    Admin,
}

impl Role {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "student" => Some(Self::Student),
            "advisor" => Some(Self::Advisor),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Advisor => "advisor",
            Self::Admin => "admin",
        }
    }

    /// Advisors and admins form the answering staff.
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Advisor | Self::Admin)
    }
}

/// Question approval lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// Question record
#[derive(Debug, Clone)]
pub struct Question {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub body: String,
    pub approval_status: ApprovalStatus,
    pub view_count: i64,
    pub created_at: String,
}

/// Answer record
#[derive(Debug, Clone)]
pub struct Answer {
    pub id: String,
    pub question_id: String,
    pub author_id: String,
    pub body: String,
    pub deleted: bool,
    pub created_at: String,
}

/// Chat message in a question's thread
#[derive(Debug, Clone)]
pub struct QuestionMessage {
    pub id: String,
    pub question_id: String,
    pub sender_id: String,
    pub body: String,
    pub created_at: String,
}

/// Notification row. Immutable after creation except is_read/read_at.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub deep_link: String,
    /// Typed per-kind refs, serialized as JSON (see notify::event::EventRefs).
    pub refs: serde_json::Value,
    pub is_read: bool,
    pub created_at: String,
    pub read_at: Option<String>,
}

/// Push token binding. One row per distinct device registration.
#[derive(Debug, Clone, Serialize)]
pub struct PushToken {
    pub token: String,
    pub user_id: String,
    pub user_agent: Option<String>,
    pub registered_at: String,
    pub revoked_at: Option<String>,
}
