use serde::{Deserialize, Serialize};

use crate::domain::{BookId, StudentId};

/// `{ "data": ... }` wrapper used by every read endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

/// `{ "error": "..." }` body of a 4xx/5xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub stu_id: String,
    pub password: String,
}

/// Body of both `/borrow/borrow` and `/borrow/return`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanRequest {
    pub stu_id: StudentId,
    pub book_id: BookId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentQuery {
    pub stu_id: StudentId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub keyword: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BorrowReceipt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReturnReceipt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fine_amount: Option<f64>,
}

impl ReturnReceipt {
    pub fn fine(&self) -> f64 {
        self.fine_amount.unwrap_or(0.0)
    }
}
