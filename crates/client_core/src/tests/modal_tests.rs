use super::*;
use crate::{
    loans::FixedConfirmation,
    profile_sync::ProfileSyncCoordinator,
    session::NavigationTarget,
    test_support::{book, rejected, signed_in_gate, CallCounts, RecordingNavigator, RecordingView, ScriptedApi},
};

struct Harness {
    api: Arc<ScriptedApi>,
    loans: Arc<LoanWorkflowController>,
    modal: ModalStateMachine,
    modal_view: Arc<RecordingView>,
    catalog_view: Arc<RecordingView>,
}

async fn harness_with_views(
    api: ScriptedApi,
    modal_view: Arc<RecordingView>,
    catalog_view: Arc<RecordingView>,
) -> Harness {
    let api = Arc::new(api);
    let navigator = Arc::new(RecordingNavigator::on(NavigationTarget::Main));
    let gate = signed_in_gate(navigator).await;
    let classifier = Arc::new(ErrorClassifier::default());
    let ttl = Duration::from_millis(3000);
    let elsewhere = Arc::new(RecordingView::default());
    let sync = Arc::new(ProfileSyncCoordinator::new(
        api.clone(),
        gate.clone(),
        classifier.clone(),
        elsewhere.clone(),
        elsewhere.clone(),
        ttl,
    ));
    let loans = Arc::new(LoanWorkflowController::new(
        api.clone(),
        gate.clone(),
        classifier.clone(),
        sync,
        Arc::new(FixedConfirmation(true)),
        elsewhere.clone(),
        elsewhere,
        ttl,
    ));
    let modal = ModalStateMachine::new(
        api.clone(),
        gate,
        classifier,
        loans.clone(),
        modal_view.clone(),
        catalog_view.clone(),
        ttl,
    );
    Harness {
        api,
        loans,
        modal,
        modal_view,
        catalog_view,
    }
}

async fn harness(api: ScriptedApi) -> Harness {
    harness_with_views(api, Arc::default(), Arc::default()).await
}

#[tokio::test]
async fn open_then_commit_borrows_and_closes() {
    let h = harness(ScriptedApi::new().with_detail(Ok(book("B001", 2, true)), "B001")).await;

    assert_eq!(h.modal.open("B001").await, ModalState::Open(book("B001", 2, true)));
    assert_eq!(h.modal.selection().await, Some(BookId::new("B001")));

    let outcome = h.modal.commit().await;

    assert!(matches!(
        outcome,
        CommitOutcome::Completed(LoanOutcome::Borrowed { .. })
    ));
    assert_eq!(h.modal.state().await, ModalState::Closed);
    assert!(h.modal.selection().await.is_none());
    assert_eq!(
        h.catalog_view.last_notice().expect("notice").severity,
        Severity::Success
    );
    assert_eq!(
        h.modal_view.renders().last(),
        Some(&ViewModel::BookModal(ModalView::Closed))
    );
}

#[tokio::test]
async fn failed_detail_fetch_stays_closed_and_reports_on_catalog() {
    let h = harness(ScriptedApi::new()).await;

    assert_eq!(h.modal.open("B404").await, ModalState::Closed);

    assert!(h.modal_view.renders().is_empty());
    assert_eq!(
        Some(h.catalog_view.last_notice().expect("notice").message.as_str()),
        ErrorKind::BookNotFound.template()
    );
}

#[tokio::test]
async fn unborrowable_book_never_reaches_committing() {
    for unavailable in [book("B002", 0, true), book("B003", 3, false)] {
        let id = unavailable.book_id.to_string();
        let h = harness(ScriptedApi::new().with_detail(Ok(unavailable.clone()), &id)).await;
        h.modal.open(&id).await;

        assert_eq!(h.modal.commit().await, CommitOutcome::Blocked);

        assert_eq!(CallCounts::get(&h.api.calls.borrow), 0);
        assert_eq!(h.modal.state().await, ModalState::Open(unavailable));
        assert!(!h
            .modal_view
            .renders()
            .iter()
            .any(|model| matches!(model, ViewModel::BookModal(ModalView::Committing(_)))));
        assert_eq!(
            Some(h.catalog_view.last_notice().expect("notice").message.as_str()),
            ErrorKind::BookUnavailable.template()
        );
    }
}

#[tokio::test]
async fn forced_backend_unavailability_closes_modal_before_showing_template() {
    let api = ScriptedApi::new().with_detail(Ok(book("B001", 1, true)), "B001");
    ScriptedApi::set(&api.borrow, Err(rejected(400, "书籍不可借阅")));
    let shared_view = Arc::new(RecordingView::default());
    let h = harness_with_views(api, shared_view.clone(), shared_view.clone()).await;
    h.modal.open("B001").await;

    let outcome = h.modal.commit().await;

    let CommitOutcome::Completed(LoanOutcome::Failed(classified)) = outcome else {
        panic!("expected failed commit");
    };
    assert_eq!(classified.kind, ErrorKind::BookUnavailable);
    assert_eq!(h.modal.state().await, ModalState::Closed);

    let renders = shared_view.renders();
    let closed = renders
        .iter()
        .position(|model| model == &ViewModel::BookModal(ModalView::Closed))
        .expect("modal closed");
    let notice = renders
        .iter()
        .position(|model| matches!(model, ViewModel::Notice(_)))
        .expect("notice");
    assert!(closed < notice);
    let ViewModel::Notice(notice) = &renders[notice] else {
        unreachable!();
    };
    assert_eq!(Some(notice.message.as_str()), ErrorKind::BookUnavailable.template());
    assert!(!notice.message.contains("书籍不可借阅"));
}

#[tokio::test]
async fn cancel_closes_without_request() {
    let h = harness(ScriptedApi::new().with_detail(Ok(book("B001", 2, true)), "B001")).await;
    h.modal.open("B001").await;

    assert_eq!(h.modal.cancel().await, ModalState::Closed);

    assert_eq!(CallCounts::get(&h.api.calls.borrow), 0);
    assert!(h.modal.selection().await.is_none());
    assert_eq!(h.modal.commit().await, CommitOutcome::NotOpen);
}

#[tokio::test]
async fn opening_another_book_replaces_selection() {
    let api = ScriptedApi::new()
        .with_detail(Ok(book("B001", 2, true)), "B001")
        .with_detail(Ok(book("B002", 1, true)), "B002");
    let h = harness(api).await;

    h.modal.open("B001").await;
    h.modal.open("B002").await;

    assert_eq!(h.modal.selection().await, Some(BookId::new("B002")));
}

#[tokio::test]
async fn commit_from_closed_is_ignored() {
    let h = harness(ScriptedApi::new()).await;

    assert_eq!(h.modal.commit().await, CommitOutcome::NotOpen);
    assert_eq!(CallCounts::get(&h.api.calls.borrow), 0);
}

#[tokio::test]
async fn borrow_from_panel_clears_open_selection() {
    let h = harness(ScriptedApi::new().with_detail(Ok(book("B001", 2, true)), "B001")).await;
    h.modal.open("B001").await;

    let outcome = h.loans.borrow("B002").await;

    assert!(outcome.is_success());
    assert!(h.modal.selection().await.is_none());
    assert_eq!(h.modal.state().await, ModalState::Closed);
    assert_eq!(
        h.modal_view.renders().last(),
        Some(&ViewModel::BookModal(ModalView::Closed))
    );
    assert_eq!(CallCounts::get(&h.api.calls.borrow), 1);
}

#[tokio::test]
async fn own_commit_event_does_not_close_next_selection() {
    let h = harness(
        ScriptedApi::new()
            .with_detail(Ok(book("B001", 2, true)), "B001")
            .with_detail(Ok(book("B003", 1, true)), "B003"),
    )
    .await;
    h.modal.open("B001").await;
    h.modal.commit().await;

    h.modal.open("B003").await;

    assert_eq!(h.modal.selection().await, Some(BookId::new("B003")));
}

#[tokio::test]
async fn empty_book_id_warns_without_fetching() {
    let h = harness(ScriptedApi::new()).await;

    assert_eq!(h.modal.open("  ").await, ModalState::Closed);

    let notice = h.catalog_view.last_notice().expect("notice");
    assert_eq!(notice.severity, Severity::Warning);
    assert_eq!(notice.message, "Please enter a book ID.");
    assert_eq!(CallCounts::get(&h.api.calls.detail), 0);
}
