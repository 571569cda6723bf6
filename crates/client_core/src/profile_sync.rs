use std::{sync::Arc, time::Duration};

use tracing::{info, warn};

use crate::{
    classifier::ErrorClassifier,
    session::SessionGate,
    transport::{LibraryApi, RequestError},
    view::{Notice, PanelView, ProfileView, Severity, ViewModel},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Rendered,
    Failed,
    /// No valid session, or the service ended it; nothing was rendered.
    SignedOut,
}

/// Keeps the profile panel and the loan-record panel as one joined view.
pub struct ProfileSyncCoordinator {
    api: Arc<dyn LibraryApi>,
    gate: Arc<SessionGate>,
    classifier: Arc<ErrorClassifier>,
    profile_view: Arc<dyn PanelView>,
    records_view: Arc<dyn PanelView>,
    notice_ttl: Duration,
}

impl ProfileSyncCoordinator {
    pub fn new(
        api: Arc<dyn LibraryApi>,
        gate: Arc<SessionGate>,
        classifier: Arc<ErrorClassifier>,
        profile_view: Arc<dyn PanelView>,
        records_view: Arc<dyn PanelView>,
        notice_ttl: Duration,
    ) -> Self {
        Self {
            api,
            gate,
            classifier,
            profile_view,
            records_view,
            notice_ttl,
        }
    }

    /// Fetches the profile and, on success, always refreshes loan records.
    pub async fn refresh_profile(&self) -> SyncOutcome {
        let Some(identity) = self.gate.require_identity().await else {
            return SyncOutcome::SignedOut;
        };

        match self.api.fetch_profile(&identity.stu_id).await {
            Ok(profile) => {
                info!(stu_id = %profile.stu_id, trust = profile.trust, can_borrow = profile.can_borrow, "sync: profile loaded");
                self.profile_view
                    .render(ViewModel::Profile(ProfileView::from(&profile)));
                self.refresh_records().await;
                SyncOutcome::Rendered
            }
            Err(err) => self.fail(&self.profile_view, "profile", err).await,
        }
    }

    /// Loan records exactly as the service reports them.
    pub async fn refresh_records(&self) -> SyncOutcome {
        let Some(identity) = self.gate.require_identity().await else {
            return SyncOutcome::SignedOut;
        };

        self.records_view
            .render(ViewModel::Loading("Loading loan records...".to_string()));
        match self.api.loan_records(&identity.stu_id).await {
            Ok(records) => {
                info!(stu_id = %identity.stu_id, count = records.len(), "sync: loan records loaded");
                self.records_view.render(ViewModel::LoanRecords(records));
                SyncOutcome::Rendered
            }
            Err(err) => self.fail(&self.records_view, "loan records", err).await,
        }
    }

    /// Refresh after a borrow or return: both panels are refreshed even when
    /// the profile fetch fails, since a return can change eligibility.
    pub async fn refresh_after_mutation(&self) -> SyncOutcome {
        match self.refresh_profile().await {
            SyncOutcome::Failed => self.refresh_records().await,
            outcome => outcome,
        }
    }

    async fn fail(&self, view: &Arc<dyn PanelView>, what: &str, err: RequestError) -> SyncOutcome {
        if let Some(status) = err.status() {
            if !self.gate.intercept_response(status).await {
                return SyncOutcome::SignedOut;
            }
        }
        warn!(%err, what, "sync: refresh failed");
        let classified = self.classifier.classify_request_error(&err);
        view.render(ViewModel::Notice(Notice::new(
            Severity::Error,
            format!("Failed to load {what}. {}", classified.message),
            self.notice_ttl,
        )));
        SyncOutcome::Failed
    }
}

#[cfg(test)]
#[path = "tests/profile_sync_tests.rs"]
mod tests;
