use super::*;
use crate::test_support::{
    gate_with, rejected, RecordingNavigator, RecordingView, ScriptedApi,
};

use crate::session::Navigator;
use shared::error::ErrorKind;

fn controller(
    api: Arc<ScriptedApi>,
    navigator: Arc<RecordingNavigator>,
) -> (LoginController, Arc<SessionGate>, Arc<RecordingView>) {
    let gate = gate_with(navigator);
    let view = Arc::new(RecordingView::default());
    let controller = LoginController::new(
        api,
        gate.clone(),
        view.clone(),
        Duration::from_millis(3000),
    );
    (controller, gate, view)
}

#[tokio::test]
async fn empty_credentials_never_reach_the_service() {
    let api = Arc::new(ScriptedApi::new());
    let navigator = Arc::new(RecordingNavigator::on(NavigationTarget::Entry));
    let (controller, _gate, view) = controller(api.clone(), navigator);

    let outcome = controller.login("  ", "pass", false).await;

    assert!(matches!(
        outcome,
        LoginOutcome::Failed(Classified { kind: ErrorKind::InputValidation, .. })
    ));
    assert_eq!(api.calls.login.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert_eq!(
        view.last_notice().expect("notice").message,
        "Student ID and password are required."
    );
}

#[tokio::test]
async fn successful_login_establishes_session_and_navigates() {
    let api = Arc::new(ScriptedApi::new());
    let navigator = Arc::new(RecordingNavigator::on(NavigationTarget::Entry));
    let (controller, gate, _view) = controller(api, navigator.clone());

    let outcome = controller.login("2021001", "pass", true).await;

    assert!(matches!(outcome, LoginOutcome::SignedIn(_)));
    assert!(gate.snapshot().await.is_valid());
    assert_eq!(navigator.current(), NavigationTarget::Main);
    assert_eq!(
        gate.remembered_credentials(),
        Some(Credentials {
            stu_id: "2021001".to_string(),
            password: "pass".to_string(),
        })
    );
}

#[tokio::test]
async fn login_without_remember_clears_stored_credentials() {
    let api = Arc::new(ScriptedApi::new());
    let navigator = Arc::new(RecordingNavigator::on(NavigationTarget::Entry));
    let (controller, gate, _view) = controller(api, navigator);

    controller.login("2021001", "pass", true).await;
    controller.login("2021001", "pass", false).await;

    assert!(gate.remembered_credentials().is_none());
}

#[tokio::test]
async fn rejected_login_shows_service_text_and_keeps_session_empty() {
    let api = Arc::new(ScriptedApi::new());
    ScriptedApi::set(&api.login, Err(rejected(401, "学号或密码错误")));
    let navigator = Arc::new(RecordingNavigator::on(NavigationTarget::Entry));
    let (controller, gate, view) = controller(api, navigator.clone());

    let outcome = controller.login("2021001", "wrong", false).await;

    assert!(matches!(outcome, LoginOutcome::Failed(_)));
    assert!(!gate.snapshot().await.is_valid());
    assert_eq!(view.last_notice().expect("notice").message, "学号或密码错误");
    assert_eq!(navigator.current(), NavigationTarget::Entry);
}

#[tokio::test]
async fn restore_prefills_and_skips_login_for_active_session() {
    let api = Arc::new(ScriptedApi::new());
    let navigator = Arc::new(RecordingNavigator::on(NavigationTarget::Entry));
    let (controller, _gate, view) = controller(api, navigator.clone());

    assert!(!controller.restore().await);

    controller.login("2021001", "pass", true).await;
    view.clear();
    assert!(controller.restore().await);
    assert_eq!(
        view.renders().first(),
        Some(&ViewModel::Prefill {
            stu_id: "2021001".to_string(),
            password: "pass".to_string(),
        })
    );
}
