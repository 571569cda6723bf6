//! Test doubles shared by the workflow tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use shared::{
    domain::{BookId, BookRecord, LoanRecord, StudentId, StudentProfile},
    protocol::{BorrowReceipt, ReturnReceipt},
};
use storage::MemoryStore;
use tokio::sync::Notify;

use crate::{
    config::LogoutTiming,
    session::{NavigationMode, NavigationTarget, Navigator, SessionGate},
    transport::{LibraryApi, RequestError},
    view::{Notice, PanelView, PortalViews, ViewModel},
};

#[derive(Default)]
pub struct RecordingView {
    renders: Mutex<Vec<ViewModel>>,
}

impl RecordingView {
    pub fn renders(&self) -> Vec<ViewModel> {
        self.renders.lock().expect("renders").clone()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.renders()
            .into_iter()
            .filter_map(|model| match model {
                ViewModel::Notice(notice) => Some(notice),
                _ => None,
            })
            .collect()
    }

    pub fn last_notice(&self) -> Option<Notice> {
        self.notices().pop()
    }

    pub fn clear(&self) {
        self.renders.lock().expect("renders").clear();
    }
}

impl PanelView for RecordingView {
    fn render(&self, model: ViewModel) {
        self.renders.lock().expect("renders").push(model);
    }
}

pub struct RecordingViews {
    pub login: Arc<RecordingView>,
    pub profile: Arc<RecordingView>,
    pub records: Arc<RecordingView>,
    pub catalog: Arc<RecordingView>,
    pub borrow: Arc<RecordingView>,
    pub returns: Arc<RecordingView>,
    pub modal: Arc<RecordingView>,
}

impl RecordingViews {
    pub fn new() -> Self {
        Self {
            login: Arc::default(),
            profile: Arc::default(),
            records: Arc::default(),
            catalog: Arc::default(),
            borrow: Arc::default(),
            returns: Arc::default(),
            modal: Arc::default(),
        }
    }

    pub fn bindings(&self) -> PortalViews {
        PortalViews {
            login: self.login.clone(),
            profile: self.profile.clone(),
            records: self.records.clone(),
            catalog: self.catalog.clone(),
            borrow: self.borrow.clone(),
            returns: self.returns.clone(),
            modal: self.modal.clone(),
        }
    }
}

pub struct RecordingNavigator {
    current: Mutex<NavigationTarget>,
    history: Mutex<Vec<(NavigationTarget, NavigationMode)>>,
    /// Assign-navigations are recorded but do not change the page.
    ignore_assign: bool,
}

impl RecordingNavigator {
    pub fn on(page: NavigationTarget) -> Self {
        Self {
            current: Mutex::new(page),
            history: Mutex::new(Vec::new()),
            ignore_assign: false,
        }
    }

    pub fn stuck_on_main() -> Self {
        Self {
            ignore_assign: true,
            ..Self::on(NavigationTarget::Main)
        }
    }

    pub fn history(&self) -> Vec<(NavigationTarget, NavigationMode)> {
        self.history.lock().expect("history").clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, target: NavigationTarget, mode: NavigationMode) {
        self.history.lock().expect("history").push((target, mode));
        if !(self.ignore_assign && mode == NavigationMode::Assign) {
            *self.current.lock().expect("current") = target;
        }
    }

    fn current(&self) -> NavigationTarget {
        *self.current.lock().expect("current")
    }
}

pub fn student(name: &str, trust: f64, can_borrow: bool) -> StudentProfile {
    StudentProfile {
        stu_id: StudentId::new("2021001"),
        name: name.to_string(),
        trust,
        can_borrow,
    }
}

pub fn book(id: &str, available: u32, can_borrow: bool) -> BookRecord {
    BookRecord {
        book_id: BookId::new(id),
        title: format!("Title {id}"),
        author: "Author".to_string(),
        total_copies: available.max(1),
        available_copies: available,
        can_borrow,
        description: String::new(),
        created_at: None,
    }
}

pub fn loan(id: &str, is_overdue: bool, fine_amount: f64) -> LoanRecord {
    LoanRecord {
        book_id: BookId::new(id),
        book_title: format!("Title {id}"),
        book_author: "Author".to_string(),
        borrow_date: "2024-01-15".to_string(),
        due_date: "2024-03-15".to_string(),
        is_overdue,
        fine_amount,
    }
}

pub fn rejected(status: u16, message: &str) -> RequestError {
    RequestError::Rejected {
        status,
        message: message.to_string(),
    }
}

pub fn gate_with(navigator: Arc<RecordingNavigator>) -> Arc<SessionGate> {
    Arc::new(SessionGate::restore(
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryStore::new()),
        navigator,
        LogoutTiming::immediate(),
    ))
}

pub async fn signed_in_gate(navigator: Arc<RecordingNavigator>) -> Arc<SessionGate> {
    let gate = gate_with(navigator);
    gate.establish(student("Li Wei", 80.0, true)).await;
    gate
}

#[derive(Default)]
pub struct CallCounts {
    pub login: AtomicUsize,
    pub profile: AtomicUsize,
    pub list: AtomicUsize,
    pub search: AtomicUsize,
    pub detail: AtomicUsize,
    pub records: AtomicUsize,
    pub borrow: AtomicUsize,
    pub returns: AtomicUsize,
}

impl CallCounts {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// `LibraryApi` double answering from scripted results.
pub struct ScriptedApi {
    pub calls: CallCounts,
    pub login: Mutex<Result<StudentProfile, RequestError>>,
    pub profile: Mutex<Result<StudentProfile, RequestError>>,
    pub books: Mutex<Result<Vec<BookRecord>, RequestError>>,
    pub details: Mutex<HashMap<String, Result<BookRecord, RequestError>>>,
    pub records: Mutex<Result<Vec<LoanRecord>, RequestError>>,
    pub borrow: Mutex<Result<BorrowReceipt, RequestError>>,
    pub returns: Mutex<Result<ReturnReceipt, RequestError>>,
    /// When set, borrow and return wait for a permit before answering.
    pub hold: Option<Arc<Notify>>,
    /// Runs at the start of every profile fetch.
    pub on_profile_fetch: Mutex<Option<Box<dyn Fn() + Send>>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self {
            calls: CallCounts::default(),
            login: Mutex::new(Ok(student("Li Wei", 80.0, true))),
            profile: Mutex::new(Ok(student("Li Wei", 80.0, true))),
            books: Mutex::new(Ok(vec![book("B001", 2, true)])),
            details: Mutex::new(HashMap::new()),
            records: Mutex::new(Ok(Vec::new())),
            borrow: Mutex::new(Ok(BorrowReceipt {
                message: Some("借书成功".to_string()),
            })),
            returns: Mutex::new(Ok(ReturnReceipt {
                message: Some("还书成功".to_string()),
                fine_amount: None,
            })),
            hold: None,
            on_profile_fetch: Mutex::new(None),
        }
    }

    pub fn held(hold: Arc<Notify>) -> Self {
        Self {
            hold: Some(hold),
            ..Self::new()
        }
    }

    pub fn with_detail(self, detail: Result<BookRecord, RequestError>, id: &str) -> Self {
        self.details
            .lock()
            .expect("details")
            .insert(id.to_string(), detail);
        self
    }

    pub fn set<T: Clone>(slot: &Mutex<T>, value: T) {
        *slot.lock().expect("slot") = value;
    }

    async fn wait_for_release(&self) {
        if let Some(hold) = &self.hold {
            hold.notified().await;
        }
    }
}

fn answer<T: Clone>(slot: &Mutex<T>) -> T {
    slot.lock().expect("slot").clone()
}

#[async_trait]
impl LibraryApi for ScriptedApi {
    async fn login(&self, _stu_id: &str, _password: &str) -> Result<StudentProfile, RequestError> {
        self.calls.login.fetch_add(1, Ordering::SeqCst);
        answer(&self.login)
    }

    async fn fetch_profile(&self, _stu_id: &StudentId) -> Result<StudentProfile, RequestError> {
        self.calls.profile.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = self.on_profile_fetch.lock().expect("hook").as_ref() {
            hook();
        }
        answer(&self.profile)
    }

    async fn list_books(&self) -> Result<Vec<BookRecord>, RequestError> {
        self.calls.list.fetch_add(1, Ordering::SeqCst);
        answer(&self.books)
    }

    async fn search_books(&self, _keyword: &str) -> Result<Vec<BookRecord>, RequestError> {
        self.calls.search.fetch_add(1, Ordering::SeqCst);
        answer(&self.books)
    }

    async fn book_detail(&self, book_id: &BookId) -> Result<BookRecord, RequestError> {
        self.calls.detail.fetch_add(1, Ordering::SeqCst);
        self.details
            .lock()
            .expect("details")
            .get(book_id.as_str())
            .cloned()
            .unwrap_or_else(|| Err(rejected(500, "书籍不存在")))
    }

    async fn loan_records(&self, _stu_id: &StudentId) -> Result<Vec<LoanRecord>, RequestError> {
        self.calls.records.fetch_add(1, Ordering::SeqCst);
        answer(&self.records)
    }

    async fn borrow(
        &self,
        _stu_id: &StudentId,
        _book_id: &BookId,
    ) -> Result<BorrowReceipt, RequestError> {
        self.calls.borrow.fetch_add(1, Ordering::SeqCst);
        self.wait_for_release().await;
        answer(&self.borrow)
    }

    async fn return_book(
        &self,
        _stu_id: &StudentId,
        _book_id: &BookId,
    ) -> Result<ReturnReceipt, RequestError> {
        self.calls.returns.fetch_add(1, Ordering::SeqCst);
        self.wait_for_release().await;
        answer(&self.returns)
    }
}
