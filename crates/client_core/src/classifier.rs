use std::{fs, path::Path};

use serde::Deserialize;
use shared::error::{Classified, ErrorKind};
use thiserror::Error;

use crate::transport::RequestError;

/// One row of the classification table: a case-insensitive substring of the
/// service's error text and the kind it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorPattern {
    pub needle: String,
    pub kind: ErrorKind,
}

impl ErrorPattern {
    pub fn new(needle: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            needle: needle.into().to_lowercase(),
            kind,
        }
    }
}

#[derive(Debug, Error)]
pub enum ClassifierTableError {
    #[error("failed to read error table: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid error table: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("error table pattern {index} has an empty needle")]
    EmptyNeedle { index: usize },
    #[error("error table pattern {index} maps to {kind:?}, which is not a service rejection")]
    NotARejection { index: usize, kind: ErrorKind },
}

#[derive(Debug, Deserialize)]
struct TableFile {
    patterns: Vec<ErrorPattern>,
}

/// Ordered, first-match-wins mapping from service error text to `ErrorKind`.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    patterns: Vec<ErrorPattern>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(default_patterns())
    }
}

impl ErrorClassifier {
    pub fn new(patterns: Vec<ErrorPattern>) -> Self {
        let patterns = patterns
            .into_iter()
            .map(|pattern| ErrorPattern::new(pattern.needle, pattern.kind))
            .collect();
        Self { patterns }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ClassifierTableError> {
        let table: TableFile = toml::from_str(raw)?;
        for (index, pattern) in table.patterns.iter().enumerate() {
            if pattern.needle.trim().is_empty() {
                return Err(ClassifierTableError::EmptyNeedle { index });
            }
            if matches!(
                pattern.kind,
                ErrorKind::Unauthenticated | ErrorKind::InputValidation | ErrorKind::NetworkFailure
            ) {
                return Err(ClassifierTableError::NotARejection {
                    index,
                    kind: pattern.kind,
                });
            }
        }
        Ok(Self::new(table.patterns))
    }

    pub fn from_file(path: &Path) -> Result<Self, ClassifierTableError> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    pub fn patterns(&self) -> &[ErrorPattern] {
        &self.patterns
    }

    /// Classifies a service rejection. Unauthenticated responses never reach
    /// this point; `SessionGate::intercept_response` consumes them first.
    pub fn classify(&self, _status: u16, raw_message: &str) -> Classified {
        let haystack = raw_message.to_lowercase();
        let kind = self
            .patterns
            .iter()
            .find(|pattern| haystack.contains(&pattern.needle))
            .map(|pattern| pattern.kind)
            .unwrap_or(ErrorKind::Unknown);
        Classified::from_kind(kind, raw_message)
    }

    /// Transport and parse failures bypass text matching.
    pub fn classify_request_error(&self, err: &RequestError) -> Classified {
        match err {
            RequestError::Rejected { status, message } => self.classify(*status, message),
            RequestError::Network(_) => Classified::from_kind(ErrorKind::NetworkFailure, ""),
            RequestError::Unparseable { .. } => Classified::unparseable(),
        }
    }
}

pub fn default_patterns() -> Vec<ErrorPattern> {
    vec![
        ErrorPattern::new("借阅权限已被禁用", ErrorKind::BorrowingDisabled),
        ErrorPattern::new("未支付的罚款", ErrorKind::BorrowingDisabled),
        ErrorPattern::new("borrowing disabled", ErrorKind::BorrowingDisabled),
        ErrorPattern::new("unpaid fine", ErrorKind::BorrowingDisabled),
        ErrorPattern::new("书籍不可借阅", ErrorKind::BookUnavailable),
        ErrorPattern::new("已全部借出", ErrorKind::BookUnavailable),
        ErrorPattern::new("not available", ErrorKind::BookUnavailable),
        ErrorPattern::new("借阅上限", ErrorKind::BorrowLimitReached),
        ErrorPattern::new("借阅数量已达", ErrorKind::BorrowLimitReached),
        ErrorPattern::new("borrow limit", ErrorKind::BorrowLimitReached),
        ErrorPattern::new("借阅记录不存在", ErrorKind::RecordNotFound),
        ErrorPattern::new("record not found", ErrorKind::RecordNotFound),
        ErrorPattern::new("书籍不存在", ErrorKind::BookNotFound),
        ErrorPattern::new("book not found", ErrorKind::BookNotFound),
    ]
}

#[cfg(test)]
#[path = "tests/classifier_tests.rs"]
mod tests;
