use std::{sync::Arc, time::Duration};

use shared::domain::BookRecord;
use tracing::{info, warn};

use crate::{
    classifier::ErrorClassifier,
    profile_sync::SyncOutcome,
    session::SessionGate,
    transport::{LibraryApi, RequestError},
    view::{Notice, PanelView, Severity, ViewModel},
};

const EMPTY_RESULT_MESSAGE: &str = "No matching books found.";
const MISSING_KEYWORD_MESSAGE: &str = "Please enter a search keyword.";

/// Book listing and keyword search. Results are rendered as served and never
/// cached between calls.
pub struct CatalogController {
    api: Arc<dyn LibraryApi>,
    gate: Arc<SessionGate>,
    classifier: Arc<ErrorClassifier>,
    view: Arc<dyn PanelView>,
    notice_ttl: Duration,
}

impl CatalogController {
    pub fn new(
        api: Arc<dyn LibraryApi>,
        gate: Arc<SessionGate>,
        classifier: Arc<ErrorClassifier>,
        view: Arc<dyn PanelView>,
        notice_ttl: Duration,
    ) -> Self {
        Self {
            api,
            gate,
            classifier,
            view,
            notice_ttl,
        }
    }

    pub async fn list_books(&self) -> SyncOutcome {
        if self.gate.require_identity().await.is_none() {
            return SyncOutcome::SignedOut;
        }
        self.view
            .render(ViewModel::Loading("Loading books...".to_string()));
        let result = self.api.list_books().await;
        self.show(result, "list").await
    }

    pub async fn search(&self, keyword: &str) -> SyncOutcome {
        if self.gate.require_identity().await.is_none() {
            return SyncOutcome::SignedOut;
        }
        let keyword = keyword.trim();
        if keyword.is_empty() {
            self.notify(Severity::Warning, MISSING_KEYWORD_MESSAGE.to_string());
            return SyncOutcome::Failed;
        }
        self.view
            .render(ViewModel::Loading(format!("Searching for \"{keyword}\"...")));
        let result = self.api.search_books(keyword).await;
        self.show(result, "search").await
    }

    async fn show(
        &self,
        result: Result<Vec<BookRecord>, RequestError>,
        operation: &'static str,
    ) -> SyncOutcome {
        match result {
            Ok(books) => {
                info!(operation, count = books.len(), "catalog: books loaded");
                let empty = books.is_empty();
                self.view.render(ViewModel::Books(books));
                if empty {
                    self.notify(Severity::Info, EMPTY_RESULT_MESSAGE.to_string());
                }
                SyncOutcome::Rendered
            }
            Err(err) => {
                if let Some(status) = err.status() {
                    if !self.gate.intercept_response(status).await {
                        return SyncOutcome::SignedOut;
                    }
                }
                warn!(operation, %err, "catalog: request failed");
                let classified = self.classifier.classify_request_error(&err);
                self.notify(Severity::Error, classified.message);
                SyncOutcome::Failed
            }
        }
    }

    fn notify(&self, severity: Severity, message: String) {
        self.view
            .render(ViewModel::Notice(Notice::new(severity, message, self.notice_ttl)));
    }
}

#[cfg(test)]
#[path = "tests/catalog_tests.rs"]
mod tests;
