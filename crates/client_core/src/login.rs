use std::{sync::Arc, time::Duration};

use shared::{
    domain::StudentProfile,
    error::{Classified, ErrorKind},
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    session::{
        Credentials, NavigationMode, NavigationTarget, SessionGate, UNAUTHENTICATED_STATUS,
    },
    transport::{LibraryApi, RequestError},
    view::{Notice, PanelView, Severity, ViewModel},
};

const MISSING_CREDENTIALS_MESSAGE: &str = "Student ID and password are required.";

#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    SignedIn(StudentProfile),
    Failed(Classified),
    /// Another login attempt is still pending.
    Busy,
}

pub struct LoginController {
    api: Arc<dyn LibraryApi>,
    gate: Arc<SessionGate>,
    view: Arc<dyn PanelView>,
    in_flight: Mutex<bool>,
    notice_ttl: Duration,
}

impl LoginController {
    pub fn new(
        api: Arc<dyn LibraryApi>,
        gate: Arc<SessionGate>,
        view: Arc<dyn PanelView>,
        notice_ttl: Duration,
    ) -> Self {
        Self {
            api,
            gate,
            view,
            in_flight: Mutex::new(false),
            notice_ttl,
        }
    }

    /// Entry-page setup: prefill remembered credentials, and skip straight to
    /// the main page when this client already holds a valid session.
    pub async fn restore(&self) -> bool {
        if let Some(Credentials { stu_id, password }) = self.gate.remembered_credentials() {
            self.view.render(ViewModel::Prefill { stu_id, password });
        }
        if self.gate.snapshot().await.is_valid() {
            self.gate
                .navigator()
                .navigate(NavigationTarget::Main, NavigationMode::Assign);
            return true;
        }
        false
    }

    pub async fn login(&self, stu_id: &str, password: &str, remember: bool) -> LoginOutcome {
        let stu_id = stu_id.trim();
        let password = password.trim();
        if stu_id.is_empty() || password.is_empty() {
            let classified = Classified::new(ErrorKind::InputValidation, MISSING_CREDENTIALS_MESSAGE);
            self.notify(Severity::Error, &classified.message);
            return LoginOutcome::Failed(classified);
        }

        {
            let mut in_flight = self.in_flight.lock().await;
            if *in_flight {
                return LoginOutcome::Busy;
            }
            *in_flight = true;
        }
        self.view.render(ViewModel::Control { busy: true });

        let result = self.api.login(stu_id, password).await;

        *self.in_flight.lock().await = false;
        self.view.render(ViewModel::Control { busy: false });

        match result {
            Ok(profile) => {
                if remember {
                    self.gate.remember(&Credentials {
                        stu_id: stu_id.to_string(),
                        password: password.to_string(),
                    });
                } else {
                    self.gate.forget_credentials();
                }
                self.gate.establish(profile.clone()).await;
                info!(stu_id = %profile.stu_id, remember, "session: login succeeded");
                self.gate
                    .navigator()
                    .navigate(NavigationTarget::Main, NavigationMode::Assign);
                LoginOutcome::SignedIn(profile)
            }
            Err(err) => {
                warn!(%err, stu_id, "session: login failed");
                let classified = match err {
                    RequestError::Rejected { status, message }
                        if status == UNAUTHENTICATED_STATUS =>
                    {
                        Classified::new(ErrorKind::Unauthenticated, message)
                    }
                    RequestError::Rejected { message, .. } => {
                        Classified::new(ErrorKind::Unknown, message)
                    }
                    RequestError::Network(_) => Classified::from_kind(ErrorKind::NetworkFailure, ""),
                    RequestError::Unparseable { .. } => Classified::unparseable(),
                };
                self.notify(Severity::Error, &classified.message);
                LoginOutcome::Failed(classified)
            }
        }
    }

    fn notify(&self, severity: Severity, message: &str) {
        self.view
            .render(ViewModel::Notice(Notice::new(severity, message, self.notice_ttl)));
    }
}

#[cfg(test)]
#[path = "tests/login_tests.rs"]
mod tests;
