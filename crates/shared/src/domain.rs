use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(StudentId);
id_newtype!(BookId);

fn default_can_borrow() -> bool {
    true
}

/// Identity carried by an authenticated session, as returned by the login
/// and profile endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub stu_id: StudentId,
    pub name: String,
    #[serde(default)]
    pub trust: f64,
    /// A profile without the flag is treated as eligible.
    #[serde(default = "default_can_borrow")]
    pub can_borrow: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub book_id: BookId,
    pub title: String,
    pub author: String,
    pub total_copies: u32,
    pub available_copies: u32,
    pub can_borrow: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl BookRecord {
    pub fn is_borrowable(&self) -> bool {
        self.can_borrow && self.available_copies > 0
    }
}

/// One active loan. `is_overdue` and `fine_amount` are computed by the
/// library service and displayed as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRecord {
    pub book_id: BookId,
    #[serde(default)]
    pub book_title: String,
    #[serde(default)]
    pub book_author: String,
    pub borrow_date: String,
    pub due_date: String,
    #[serde(default)]
    pub is_overdue: bool,
    #[serde(default)]
    pub fine_amount: f64,
}
