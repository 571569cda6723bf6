use std::sync::Arc;

use anyhow::{Context, Result};
use storage::{JsonFileStore, KeyValueStore, MemoryStore};
use tracing::info;

pub mod catalog;
pub mod classifier;
pub mod config;
pub mod loans;
pub mod login;
pub mod modal;
pub mod profile_sync;
pub mod session;
pub mod transport;
pub mod view;

pub use catalog::CatalogController;
pub use classifier::{ErrorClassifier, ErrorPattern};
pub use config::{load_settings, LogoutTiming, PortalSettings};
pub use loans::{FixedConfirmation, LoanEvent, LoanOutcome, LoanWorkflowController, ReturnConfirmation};
pub use login::{LoginController, LoginOutcome};
pub use modal::{CommitOutcome, ModalState, ModalStateMachine};
pub use profile_sync::{ProfileSyncCoordinator, SyncOutcome};
pub use session::{NavigationMode, NavigationTarget, Navigator, Session, SessionGate};
pub use transport::{HttpLibraryApi, LibraryApi, RequestError};
pub use view::{ModalView, Notice, PanelView, PortalViews, ProfileView, Severity, ViewModel};

/// What the hosting surface provides: panels to render into, page
/// navigation, and the return confirmation prompt.
#[derive(Clone)]
pub struct PortalHost {
    pub views: PortalViews,
    pub navigator: Arc<dyn Navigator>,
    pub confirmation: Arc<dyn ReturnConfirmation>,
}

/// The loan workflow components wired to one shared session.
pub struct LibraryPortal {
    settings: PortalSettings,
    gate: Arc<SessionGate>,
    login: LoginController,
    catalog: CatalogController,
    sync: Arc<ProfileSyncCoordinator>,
    loans: Arc<LoanWorkflowController>,
    modal: ModalStateMachine,
}

impl LibraryPortal {
    /// Production wiring: HTTP collaborator, in-memory tab store, JSON file
    /// for remembered credentials, and the configured error table.
    pub fn connect(settings: PortalSettings, host: PortalHost) -> Result<Self> {
        let api = HttpLibraryApi::new(&settings.server_url, settings.request_timeout())
            .context("failed to build library service client")?;
        let durable = JsonFileStore::open(&settings.remember_store_path).with_context(|| {
            format!(
                "failed to open remembered-credentials store '{}'",
                settings.remember_store_path.display()
            )
        })?;
        let classifier = load_classifier(&settings)?;
        info!(server_url = %settings.server_url, patterns = classifier.patterns().len(), "portal: connected");

        Ok(Self::assemble(
            settings,
            Arc::new(api),
            classifier,
            Arc::new(MemoryStore::new()),
            Arc::new(durable),
            host,
        ))
    }

    pub fn assemble(
        settings: PortalSettings,
        api: Arc<dyn LibraryApi>,
        classifier: ErrorClassifier,
        tab_store: Arc<dyn KeyValueStore>,
        durable_store: Arc<dyn KeyValueStore>,
        host: PortalHost,
    ) -> Self {
        let ttl = settings.notice_ttl();
        let classifier = Arc::new(classifier);
        let PortalHost {
            views,
            navigator,
            confirmation,
        } = host;

        let gate = Arc::new(SessionGate::restore(
            tab_store,
            durable_store,
            navigator,
            settings.logout_timing(),
        ));
        let login = LoginController::new(api.clone(), gate.clone(), views.login.clone(), ttl);
        let catalog = CatalogController::new(
            api.clone(),
            gate.clone(),
            classifier.clone(),
            views.catalog.clone(),
            ttl,
        );
        let sync = Arc::new(ProfileSyncCoordinator::new(
            api.clone(),
            gate.clone(),
            classifier.clone(),
            views.profile.clone(),
            views.records.clone(),
            ttl,
        ));
        let loans = Arc::new(LoanWorkflowController::new(
            api.clone(),
            gate.clone(),
            classifier.clone(),
            sync.clone(),
            confirmation,
            views.borrow.clone(),
            views.returns.clone(),
            ttl,
        ));
        let modal = ModalStateMachine::new(
            api,
            gate.clone(),
            classifier,
            loans.clone(),
            views.modal.clone(),
            views.catalog.clone(),
            ttl,
        );

        Self {
            settings,
            gate,
            login,
            catalog,
            sync,
            loans,
            modal,
        }
    }

    pub fn settings(&self) -> &PortalSettings {
        &self.settings
    }

    pub fn gate(&self) -> &Arc<SessionGate> {
        &self.gate
    }

    pub fn login(&self) -> &LoginController {
        &self.login
    }

    pub fn catalog(&self) -> &CatalogController {
        &self.catalog
    }

    pub fn sync(&self) -> &Arc<ProfileSyncCoordinator> {
        &self.sync
    }

    pub fn loans(&self) -> &Arc<LoanWorkflowController> {
        &self.loans
    }

    pub fn modal(&self) -> &ModalStateMachine {
        &self.modal
    }
}

fn load_classifier(settings: &PortalSettings) -> Result<ErrorClassifier> {
    match &settings.error_table_path {
        Some(path) => ErrorClassifier::from_file(path)
            .with_context(|| format!("failed to load error table '{}'", path.display())),
        None => Ok(ErrorClassifier::default()),
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
