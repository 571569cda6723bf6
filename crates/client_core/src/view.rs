//! View bindings: every panel is driven through `PanelView::render`, so the
//! workflow code never touches presentation directly.

use std::{sync::Arc, time::Duration};

use shared::domain::{BookRecord, LoanRecord, StudentProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Ephemeral, auto-dismissing message scoped to one panel.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
    pub ttl: Duration,
}

impl Notice {
    pub fn new(severity: Severity, message: impl Into<String>, ttl: Duration) -> Self {
        Self {
            severity,
            message: message.into(),
            ttl,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileView {
    pub stu_id: String,
    pub name: String,
    pub trust: String,
    pub can_borrow: bool,
}

impl ProfileView {
    pub fn eligibility_label(&self) -> &'static str {
        if self.can_borrow {
            "can borrow"
        } else {
            "cannot borrow"
        }
    }
}

impl From<&StudentProfile> for ProfileView {
    fn from(profile: &StudentProfile) -> Self {
        Self {
            stu_id: profile.stu_id.to_string(),
            name: profile.name.clone(),
            trust: format_trust(profile.trust),
            can_borrow: profile.can_borrow,
        }
    }
}

/// `80.0` renders as `80`; fractional scores render as received.
pub fn format_trust(trust: f64) -> String {
    if trust.fract() == 0.0 && trust.is_finite() {
        format!("{}", trust as i64)
    } else {
        trust.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModalView {
    Closed,
    Open(BookRecord),
    Committing(BookRecord),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewModel {
    Notice(Notice),
    Loading(String),
    /// Busy state of the panel's triggering control.
    Control { busy: bool },
    ClearInput,
    Prefill { stu_id: String, password: String },
    Profile(ProfileView),
    LoanRecords(Vec<LoanRecord>),
    Books(Vec<BookRecord>),
    BookModal(ModalView),
}

pub trait PanelView: Send + Sync {
    fn render(&self, model: ViewModel);
}

/// Renders nothing; for surfaces a host does not display.
pub struct DetachedView;

impl PanelView for DetachedView {
    fn render(&self, _model: ViewModel) {}
}

#[derive(Clone)]
pub struct PortalViews {
    pub login: Arc<dyn PanelView>,
    pub profile: Arc<dyn PanelView>,
    pub records: Arc<dyn PanelView>,
    pub catalog: Arc<dyn PanelView>,
    pub borrow: Arc<dyn PanelView>,
    pub returns: Arc<dyn PanelView>,
    pub modal: Arc<dyn PanelView>,
}

impl PortalViews {
    pub fn detached() -> Self {
        Self::uniform(Arc::new(DetachedView))
    }

    pub fn uniform(view: Arc<dyn PanelView>) -> Self {
        Self {
            login: Arc::clone(&view),
            profile: Arc::clone(&view),
            records: Arc::clone(&view),
            catalog: Arc::clone(&view),
            borrow: Arc::clone(&view),
            returns: Arc::clone(&view),
            modal: view,
        }
    }
}
