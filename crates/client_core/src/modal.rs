//! Single-book selection driving the detail/confirm/commit flow.
//!
//! `Closed -> Open(book) -> Committing(book) -> Closed`. A failed commit
//! closes the modal before the error is shown on the catalog panel, so the
//! message outlives the modal that triggered it.
//!
//! A borrow completed from the borrow panel clears an open selection. Loan
//! events are drained whenever the state is next taken, so the selection
//! and the closed modal are observed on the following interaction.

use std::{sync::Arc, time::Duration};

use shared::{
    domain::{BookId, BookRecord},
    error::{Classified, ErrorKind},
};
use tokio::sync::{
    broadcast::{self, error::TryRecvError},
    Mutex, MutexGuard,
};
use tracing::{debug, info, warn};

use crate::{
    classifier::ErrorClassifier,
    loans::{LoanEvent, LoanOutcome, LoanWorkflowController, MISSING_BOOK_ID_MESSAGE},
    session::SessionGate,
    transport::LibraryApi,
    view::{ModalView, Notice, PanelView, Severity, ViewModel},
};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ModalState {
    #[default]
    Closed,
    Open(BookRecord),
    Committing(BookRecord),
}

impl ModalState {
    pub fn selection(&self) -> Option<&BookId> {
        match self {
            Self::Closed => None,
            Self::Open(book) | Self::Committing(book) => Some(&book.book_id),
        }
    }

    fn view(&self) -> ModalView {
        match self {
            Self::Closed => ModalView::Closed,
            Self::Open(book) => ModalView::Open(book.clone()),
            Self::Committing(book) => ModalView::Committing(book.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// No book is open, or a commit is already running.
    NotOpen,
    /// The open book cannot be borrowed; no request was sent.
    Blocked,
    Completed(LoanOutcome),
}

pub struct ModalStateMachine {
    api: Arc<dyn LibraryApi>,
    gate: Arc<SessionGate>,
    classifier: Arc<ErrorClassifier>,
    loans: Arc<LoanWorkflowController>,
    modal_view: Arc<dyn PanelView>,
    catalog_view: Arc<dyn PanelView>,
    state: Mutex<ModalState>,
    loan_events: Mutex<broadcast::Receiver<LoanEvent>>,
    notice_ttl: Duration,
}

impl ModalStateMachine {
    pub fn new(
        api: Arc<dyn LibraryApi>,
        gate: Arc<SessionGate>,
        classifier: Arc<ErrorClassifier>,
        loans: Arc<LoanWorkflowController>,
        modal_view: Arc<dyn PanelView>,
        catalog_view: Arc<dyn PanelView>,
        notice_ttl: Duration,
    ) -> Self {
        let loan_events = Mutex::new(loans.subscribe_events());
        Self {
            api,
            gate,
            classifier,
            loans,
            modal_view,
            catalog_view,
            state: Mutex::new(ModalState::Closed),
            loan_events,
            notice_ttl,
        }
    }

    pub async fn state(&self) -> ModalState {
        self.lock_state().await.clone()
    }

    pub async fn selection(&self) -> Option<BookId> {
        self.lock_state().await.selection().cloned()
    }

    /// Takes the state after applying loan events published since the last
    /// call. A borrow while `Open` closes the modal.
    async fn lock_state(&self) -> MutexGuard<'_, ModalState> {
        let mut state = self.state.lock().await;
        let mut events = self.loan_events.lock().await;
        loop {
            match events.try_recv() {
                Ok(LoanEvent::Borrowed { book_id }) => {
                    if let ModalState::Open(book) = &*state {
                        info!(open = %book.book_id, borrowed = %book_id, "modal: closed after borrow elsewhere");
                        *state = ModalState::Closed;
                        self.modal_view.render(ViewModel::BookModal(ModalView::Closed));
                    }
                }
                Ok(LoanEvent::Returned { .. }) => {}
                Err(TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "modal: loan events lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        state
    }

    /// Fetches the book's detail and opens the modal on it. A failed fetch
    /// leaves the state as it was and reports on the catalog panel.
    pub async fn open(&self, book_id: &str) -> ModalState {
        if self.gate.require_identity().await.is_none() {
            return self.state().await;
        }
        if let ModalState::Committing(book) = &*self.lock_state().await {
            debug!(book_id = %book.book_id, "modal: open ignored while committing");
            return ModalState::Committing(book.clone());
        }
        let book_id = book_id.trim();
        if book_id.is_empty() {
            self.notify(Severity::Warning, MISSING_BOOK_ID_MESSAGE.to_string());
            return self.state().await;
        }

        match self.api.book_detail(&BookId::new(book_id)).await {
            Ok(book) => {
                let mut state = self.lock_state().await;
                if matches!(*state, ModalState::Committing(_)) {
                    return state.clone();
                }
                info!(book_id = %book.book_id, available = book.available_copies, "modal: opened");
                *state = ModalState::Open(book);
                self.modal_view.render(ViewModel::BookModal(state.view()));
                state.clone()
            }
            Err(err) => {
                if let Some(status) = err.status() {
                    if !self.gate.intercept_response(status).await {
                        return self.close_silently().await;
                    }
                }
                warn!(book_id, %err, "modal: detail fetch failed");
                let classified = self.classifier.classify_request_error(&err);
                self.notify(Severity::Error, classified.message);
                self.state().await
            }
        }
    }

    /// Borrows the open book. Valid only from `Open`.
    pub async fn commit(&self) -> CommitOutcome {
        let book = {
            let mut state = self.lock_state().await;
            let ModalState::Open(book) = &*state else {
                debug!("modal: commit ignored; no book open");
                return CommitOutcome::NotOpen;
            };
            let book = book.clone();
            if !book.is_borrowable() {
                drop(state);
                info!(book_id = %book.book_id, "modal: commit blocked; book not borrowable");
                let blocked = Classified::from_kind(ErrorKind::BookUnavailable, "");
                self.notify(Severity::Error, blocked.message);
                return CommitOutcome::Blocked;
            }
            *state = ModalState::Committing(book.clone());
            self.modal_view.render(ViewModel::BookModal(state.view()));
            book
        };

        let outcome = self
            .loans
            .run_borrow(book.book_id.as_str(), &self.modal_view)
            .await;

        match outcome {
            LoanOutcome::Busy => {
                let mut state = self.lock_state().await;
                *state = ModalState::Open(book);
                self.modal_view.render(ViewModel::BookModal(state.view()));
                CommitOutcome::Completed(LoanOutcome::Busy)
            }
            LoanOutcome::SignedOut => {
                self.close_silently().await;
                CommitOutcome::Completed(LoanOutcome::SignedOut)
            }
            outcome => {
                self.close().await;
                CommitOutcome::Completed(self.loans.finish(outcome, &self.catalog_view).await)
            }
        }
    }

    /// `Open -> Closed` with no request. Ignored while committing.
    pub async fn cancel(&self) -> ModalState {
        let mut state = self.lock_state().await;
        match &*state {
            ModalState::Open(book) => {
                debug!(book_id = %book.book_id, "modal: cancelled");
                *state = ModalState::Closed;
                self.modal_view.render(ViewModel::BookModal(ModalView::Closed));
            }
            ModalState::Committing(_) => debug!("modal: cancel ignored while committing"),
            ModalState::Closed => {}
        }
        state.clone()
    }

    async fn close(&self) {
        *self.lock_state().await = ModalState::Closed;
        self.modal_view.render(ViewModel::BookModal(ModalView::Closed));
    }

    async fn close_silently(&self) -> ModalState {
        let mut state = self.lock_state().await;
        *state = ModalState::Closed;
        state.clone()
    }

    fn notify(&self, severity: Severity, message: String) {
        self.catalog_view
            .render(ViewModel::Notice(Notice::new(severity, message, self.notice_ttl)));
    }
}

#[cfg(test)]
#[path = "tests/modal_tests.rs"]
mod tests;
