use std::{collections::HashSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use shared::{
    domain::BookId,
    error::{Classified, ErrorKind},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use crate::{
    classifier::ErrorClassifier,
    profile_sync::ProfileSyncCoordinator,
    session::SessionGate,
    transport::{LibraryApi, RequestError},
    view::{Notice, PanelView, Severity, ViewModel},
};

pub(crate) const MISSING_BOOK_ID_MESSAGE: &str = "Please enter a book ID.";
const BORROWED_MESSAGE: &str = "Book borrowed successfully.";
const RETURNED_MESSAGE: &str = "Book returned successfully.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum LoanAction {
    Borrow,
    Return,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoanOutcome {
    Borrowed {
        book_id: BookId,
        message: String,
    },
    Returned {
        book_id: BookId,
        message: String,
        fine: f64,
    },
    Failed(Classified),
    /// The same action is already in flight; nothing was sent.
    Busy,
    /// The user declined the return confirmation; nothing was sent.
    Declined,
    SignedOut,
}

impl LoanOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Borrowed { .. } | Self::Returned { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoanEvent {
    Borrowed { book_id: BookId },
    Returned { book_id: BookId, fine: f64 },
}

/// Explicit user confirmation asked before any return request is issued.
#[async_trait]
pub trait ReturnConfirmation: Send + Sync {
    async fn confirm(&self, book_id: &BookId) -> bool;
}

/// Answers every confirmation the same way.
pub struct FixedConfirmation(pub bool);

#[async_trait]
impl ReturnConfirmation for FixedConfirmation {
    async fn confirm(&self, _book_id: &BookId) -> bool {
        self.0
    }
}

pub struct LoanWorkflowController {
    api: Arc<dyn LibraryApi>,
    gate: Arc<SessionGate>,
    classifier: Arc<ErrorClassifier>,
    sync: Arc<ProfileSyncCoordinator>,
    confirmation: Arc<dyn ReturnConfirmation>,
    borrow_view: Arc<dyn PanelView>,
    returns_view: Arc<dyn PanelView>,
    in_flight: Mutex<HashSet<LoanAction>>,
    events: broadcast::Sender<LoanEvent>,
    notice_ttl: Duration,
}

impl LoanWorkflowController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api: Arc<dyn LibraryApi>,
        gate: Arc<SessionGate>,
        classifier: Arc<ErrorClassifier>,
        sync: Arc<ProfileSyncCoordinator>,
        confirmation: Arc<dyn ReturnConfirmation>,
        borrow_view: Arc<dyn PanelView>,
        returns_view: Arc<dyn PanelView>,
        notice_ttl: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            api,
            gate,
            classifier,
            sync,
            confirmation,
            borrow_view,
            returns_view,
            in_flight: Mutex::new(HashSet::new()),
            events,
            notice_ttl,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<LoanEvent> {
        self.events.subscribe()
    }

    /// Borrow from the borrow panel.
    pub async fn borrow(&self, book_id: &str) -> LoanOutcome {
        let outcome = self.run_borrow(book_id, &self.borrow_view).await;
        if outcome.is_success() {
            self.borrow_view.render(ViewModel::ClearInput);
        }
        self.finish(outcome, &self.borrow_view).await
    }

    /// Return from the returns panel, after the user confirms.
    pub async fn return_book(&self, book_id: &str) -> LoanOutcome {
        let outcome = self.run_return(book_id).await;
        if outcome.is_success() {
            self.returns_view.render(ViewModel::ClearInput);
        }
        self.finish(outcome, &self.returns_view).await
    }

    /// Preconditions, serialization and the borrow request itself. Renders
    /// only the busy state of `trigger`; the caller reports the outcome
    /// through `finish` on whichever panel owns it.
    pub(crate) async fn run_borrow(
        &self,
        book_id: &str,
        trigger: &Arc<dyn PanelView>,
    ) -> LoanOutcome {
        let Some(identity) = self.gate.require_identity().await else {
            return LoanOutcome::SignedOut;
        };
        let Some(book_id) = parse_book_id(book_id) else {
            return missing_book_id();
        };
        if !self.begin(LoanAction::Borrow).await {
            return LoanOutcome::Busy;
        }

        trigger.render(ViewModel::Control { busy: true });
        let result = self.api.borrow(&identity.stu_id, &book_id).await;
        self.end(LoanAction::Borrow).await;
        trigger.render(ViewModel::Control { busy: false });

        match result {
            Ok(receipt) => {
                info!(stu_id = %identity.stu_id, book_id = %book_id, "loan: borrowed");
                LoanOutcome::Borrowed {
                    book_id,
                    message: receipt.message.unwrap_or_else(|| BORROWED_MESSAGE.to_string()),
                }
            }
            Err(err) => self.rejected(LoanAction::Borrow, &book_id, err).await,
        }
    }

    async fn run_return(&self, book_id: &str) -> LoanOutcome {
        let Some(identity) = self.gate.require_identity().await else {
            return LoanOutcome::SignedOut;
        };
        let Some(book_id) = parse_book_id(book_id) else {
            return missing_book_id();
        };
        if !self.begin(LoanAction::Return).await {
            return LoanOutcome::Busy;
        }

        self.returns_view.render(ViewModel::Control { busy: true });
        let result = if self.confirmation.confirm(&book_id).await {
            Some(self.api.return_book(&identity.stu_id, &book_id).await)
        } else {
            None
        };
        self.end(LoanAction::Return).await;
        self.returns_view.render(ViewModel::Control { busy: false });

        match result {
            None => {
                info!(book_id = %book_id, "loan: return not confirmed");
                LoanOutcome::Declined
            }
            Some(Ok(receipt)) => {
                let fine = receipt.fine();
                info!(stu_id = %identity.stu_id, book_id = %book_id, fine, "loan: returned");
                LoanOutcome::Returned {
                    book_id,
                    message: receipt.message.unwrap_or_else(|| RETURNED_MESSAGE.to_string()),
                    fine,
                }
            }
            Some(Err(err)) => self.rejected(LoanAction::Return, &book_id, err).await,
        }
    }

    /// Shows the outcome on `panel`. After a successful mutation the event is
    /// published and both dependent views are refreshed, in that order.
    pub(crate) async fn finish(&self, outcome: LoanOutcome, panel: &Arc<dyn PanelView>) -> LoanOutcome {
        match &outcome {
            LoanOutcome::Borrowed { book_id, message } => {
                self.notify(panel, Severity::Success, message.clone());
                let _ = self.events.send(LoanEvent::Borrowed {
                    book_id: book_id.clone(),
                });
                self.sync.refresh_after_mutation().await;
            }
            LoanOutcome::Returned {
                book_id,
                message,
                fine,
            } => {
                if *fine > 0.0 {
                    self.notify(
                        panel,
                        Severity::Warning,
                        format!("{message}, overdue fine ¥{fine:.2}"),
                    );
                } else {
                    self.notify(panel, Severity::Success, message.clone());
                }
                let _ = self.events.send(LoanEvent::Returned {
                    book_id: book_id.clone(),
                    fine: *fine,
                });
                self.sync.refresh_after_mutation().await;
            }
            LoanOutcome::Failed(classified) => {
                let severity = if classified.kind == ErrorKind::InputValidation {
                    Severity::Warning
                } else {
                    Severity::Error
                };
                self.notify(panel, severity, classified.message.clone());
            }
            LoanOutcome::Busy | LoanOutcome::Declined | LoanOutcome::SignedOut => {}
        }
        outcome
    }

    async fn rejected(&self, action: LoanAction, book_id: &BookId, err: RequestError) -> LoanOutcome {
        if let Some(status) = err.status() {
            if !self.gate.intercept_response(status).await {
                return LoanOutcome::SignedOut;
            }
        }
        let classified = self.classifier.classify_request_error(&err);
        warn!(?action, book_id = %book_id, kind = ?classified.kind, %err, "loan: request failed");
        LoanOutcome::Failed(classified)
    }

    async fn begin(&self, action: LoanAction) -> bool {
        let mut in_flight = self.in_flight.lock().await;
        if !in_flight.insert(action) {
            info!(?action, "loan: already in flight; skipping duplicate trigger");
            return false;
        }
        true
    }

    async fn end(&self, action: LoanAction) {
        self.in_flight.lock().await.remove(&action);
    }

    fn notify(&self, panel: &Arc<dyn PanelView>, severity: Severity, message: String) {
        panel.render(ViewModel::Notice(Notice::new(severity, message, self.notice_ttl)));
    }
}

fn parse_book_id(raw: &str) -> Option<BookId> {
    let raw = raw.trim();
    (!raw.is_empty()).then(|| BookId::new(raw))
}

fn missing_book_id() -> LoanOutcome {
    LoanOutcome::Failed(Classified::new(
        ErrorKind::InputValidation,
        MISSING_BOOK_ID_MESSAGE,
    ))
}

#[cfg(test)]
#[path = "tests/loans_tests.rs"]
mod tests;
