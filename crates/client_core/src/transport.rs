use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    Client, RequestBuilder,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::{BookId, BookRecord, LoanRecord, StudentId, StudentProfile},
    protocol::{
        BorrowReceipt, DataEnvelope, ErrorBody, LoanRequest, LoginRequest, ReturnReceipt,
        SearchQuery, StudentQuery,
    },
};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::config::validate_server_url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("library service rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("network failure: {0}")]
    Network(String),
    #[error("unparseable response ({status}): {detail}")]
    Unparseable { status: u16, detail: String },
}

impl RequestError {
    /// Status of the response, if one arrived at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } | Self::Unparseable { status, .. } => Some(*status),
            Self::Network(_) => None,
        }
    }
}

/// The library service's REST contract.
#[async_trait]
pub trait LibraryApi: Send + Sync {
    async fn login(&self, stu_id: &str, password: &str) -> Result<StudentProfile, RequestError>;
    async fn fetch_profile(&self, stu_id: &StudentId) -> Result<StudentProfile, RequestError>;
    async fn list_books(&self) -> Result<Vec<BookRecord>, RequestError>;
    async fn search_books(&self, keyword: &str) -> Result<Vec<BookRecord>, RequestError>;
    async fn book_detail(&self, book_id: &BookId) -> Result<BookRecord, RequestError>;
    async fn loan_records(&self, stu_id: &StudentId) -> Result<Vec<LoanRecord>, RequestError>;
    async fn borrow(
        &self,
        stu_id: &StudentId,
        book_id: &BookId,
    ) -> Result<BorrowReceipt, RequestError>;
    async fn return_book(
        &self,
        stu_id: &StudentId,
        book_id: &BookId,
    ) -> Result<ReturnReceipt, RequestError>;
}

pub struct HttpLibraryApi {
    http: Client,
    server_url: Url,
}

impl HttpLibraryApi {
    pub fn new(server_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let server_url = validate_server_url(server_url)?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self { http, server_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.server_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RequestError> {
        let response = request
            .send()
            .await
            .map_err(|err| {
                error!(%err, "http: request failed before a response arrived");
                RequestError::Network(err.to_string())
            })?;

        let status = response.status();
        let url = response.url().clone();
        let body = response
            .bytes()
            .await
            .map_err(|err| RequestError::Network(err.to_string()))?;
        debug!(%url, status = status.as_u16(), bytes = body.len(), "http: response");

        if status.is_success() {
            return serde_json::from_slice::<T>(&body).map_err(|err| RequestError::Unparseable {
                status: status.as_u16(),
                detail: err.to_string(),
            });
        }

        match serde_json::from_slice::<ErrorBody>(&body) {
            Ok(ErrorBody { error }) => Err(RequestError::Rejected {
                status: status.as_u16(),
                message: error,
            }),
            Err(err) => Err(RequestError::Unparseable {
                status: status.as_u16(),
                detail: err.to_string(),
            }),
        }
    }

    async fn data<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RequestError> {
        let envelope: DataEnvelope<T> = self.send(request).await?;
        Ok(envelope.data)
    }

    /// List endpoints send `"data": null` instead of an empty array.
    async fn list<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Vec<T>, RequestError> {
        let envelope: DataEnvelope<Option<Vec<T>>> = self.send(request).await?;
        Ok(envelope.data.unwrap_or_default())
    }
}

#[async_trait]
impl LibraryApi for HttpLibraryApi {
    async fn login(&self, stu_id: &str, password: &str) -> Result<StudentProfile, RequestError> {
        let request = self
            .http
            .post(self.endpoint(&["student", "login"]))
            .json(&LoginRequest {
                stu_id: stu_id.to_string(),
                password: password.to_string(),
            });
        self.data(request).await
    }

    async fn fetch_profile(&self, stu_id: &StudentId) -> Result<StudentProfile, RequestError> {
        let request = self
            .http
            .get(self.endpoint(&["student", "info"]))
            .query(&StudentQuery {
                stu_id: stu_id.clone(),
            });
        self.data(request).await
    }

    async fn list_books(&self) -> Result<Vec<BookRecord>, RequestError> {
        let request = self.http.get(self.endpoint(&["books", "list"]));
        self.list(request).await
    }

    async fn search_books(&self, keyword: &str) -> Result<Vec<BookRecord>, RequestError> {
        let request = self
            .http
            .get(self.endpoint(&["books", "search"]))
            .query(&SearchQuery {
                keyword: keyword.to_string(),
            });
        self.list(request).await
    }

    async fn book_detail(&self, book_id: &BookId) -> Result<BookRecord, RequestError> {
        let request = self.http.get(self.endpoint(&["books", book_id.as_str()]));
        self.data(request).await
    }

    async fn loan_records(&self, stu_id: &StudentId) -> Result<Vec<LoanRecord>, RequestError> {
        let request = self
            .http
            .get(self.endpoint(&["borrow", "records"]))
            .query(&StudentQuery {
                stu_id: stu_id.clone(),
            });
        self.list(request).await
    }

    async fn borrow(
        &self,
        stu_id: &StudentId,
        book_id: &BookId,
    ) -> Result<BorrowReceipt, RequestError> {
        let request = self
            .http
            .post(self.endpoint(&["borrow", "borrow"]))
            .json(&LoanRequest {
                stu_id: stu_id.clone(),
                book_id: book_id.clone(),
            });
        self.send(request).await
    }

    async fn return_book(
        &self,
        stu_id: &StudentId,
        book_id: &BookId,
    ) -> Result<ReturnReceipt, RequestError> {
        let request = self
            .http
            .post(self.endpoint(&["borrow", "return"]))
            .json(&LoanRequest {
                stu_id: stu_id.clone(),
                book_id: book_id.clone(),
            });
        self.send(request).await
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
