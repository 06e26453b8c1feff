use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{oneshot, Notify};

use crate::api::{
    ApiError, Credentials, ListQuery, MailRequest, MessageRequest, NewToken, PageResult,
    SortOrder, Token, TokenApi, TokenId, TokenRows, TokenUpdate,
};
use crate::session::{ActionError, FetchOutcome, PageState, Phase, SessionOptions, TokenListController};
use crate::shell::Shell;
use crate::view::{ListDisplay, Notice, NoticeLevel, Pagination, SearchDisplay, View, NO_TOKENS};

#[derive(Clone, Debug, PartialEq)]
enum Call {
    List(ListQuery),
    Create(NewToken),
    Update(TokenUpdate),
    Delete(TokenId),
    Search(TokenId),
    Login(String),
    Mail(String),
    Message(String),
}

type ListReply = Result<PageResult, ApiError>;

/// In-memory token service with paging, sorting and amount filters.
#[derive(Default)]
struct FakeApi {
    tokens: Mutex<Vec<Token>>,
    calls: Mutex<Vec<Call>>,
    scripted_list: Mutex<Option<Result<PageResult, ApiError>>>,
    scripted_mutation: Mutex<Option<ApiError>>,
    held_list: Mutex<Option<oneshot::Receiver<Option<ListReply>>>>,
    list_entered: Notify,
}

impl FakeApi {
    fn with_amounts(amounts: &[i64]) -> Arc<Self> {
        let tokens = amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| Token {
                id: TokenId::Number(i as i64 + 1),
                name: format!("t{}", i + 1),
                amount: *amount,
            })
            .collect();
        Arc::new(Self {
            tokens: Mutex::new(tokens),
            ..Self::default()
        })
    }

    fn seven() -> Arc<Self> {
        Self::with_amounts(&[40, 10, 70, 20, 60, 30, 50])
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn list_calls(&self) -> Vec<ListQuery> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::List(q) => Some(q),
                _ => None,
            })
            .collect()
    }

    fn script_list(&self, result: Result<PageResult, ApiError>) {
        *self.scripted_list.lock().unwrap() = Some(result);
    }

    fn script_mutation_error(&self, err: ApiError) {
        *self.scripted_mutation.lock().unwrap() = Some(err);
    }

    /// The next listing waits for the returned sender. Sending `Some` replaces
    /// its answer.
    fn hold_next_list(&self) -> oneshot::Sender<Option<ListReply>> {
        let (tx, rx) = oneshot::channel();
        *self.held_list.lock().unwrap() = Some(rx);
        tx
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn mutation_error(&self) -> Option<ApiError> {
        self.scripted_mutation.lock().unwrap().take()
    }

    fn page(&self, query: &ListQuery) -> PageResult {
        let mut rows: Vec<Token> = self
            .tokens
            .lock()
            .unwrap()
            .iter()
            .filter(|t| query.min_amount.map_or(true, |min| t.amount >= min))
            .filter(|t| query.max_amount.map_or(true, |max| t.amount <= max))
            .cloned()
            .collect();
        match query.sort_order {
            SortOrder::Asc => rows.sort_by_key(|t| t.amount),
            SortOrder::Desc => rows.sort_by_key(|t| std::cmp::Reverse(t.amount)),
            SortOrder::Unsorted => {}
        }
        let limit = query.limit.get() as usize;
        let total_pages = rows.len().div_ceil(limit) as i64;
        let current_page = (query.page.get() as i64).min(total_pages.max(1));
        let start = (current_page as usize - 1) * limit;
        let tokens = rows.into_iter().skip(start).take(limit).collect();
        PageResult {
            tokens: TokenRows::Rows(tokens),
            current_page,
            total_pages,
        }
    }
}

fn same_id(a: &TokenId, b: &TokenId) -> bool {
    a.to_string() == b.to_string()
}

#[async_trait]
impl TokenApi for FakeApi {
    async fn list(&self, query: &ListQuery) -> Result<PageResult, ApiError> {
        self.record(Call::List(query.clone()));
        let held = self.held_list.lock().unwrap().take();
        if let Some(release) = held {
            self.list_entered.notify_one();
            if let Ok(Some(reply)) = release.await {
                return reply;
            }
        }
        let scripted = self.scripted_list.lock().unwrap().take();
        match scripted {
            Some(result) => result,
            None => Ok(self.page(query)),
        }
    }

    async fn create(&self, token: NewToken) -> Result<String, ApiError> {
        self.record(Call::Create(token.clone()));
        if let Some(err) = self.mutation_error() {
            return Err(err);
        }
        let amount = token
            .amount
            .ok_or_else(|| ApiError::rejected(Some("Invalid amount".to_string())))?;
        let mut tokens = self.tokens.lock().unwrap();
        let id = tokens.len() as i64 + 1;
        tokens.push(Token {
            id: TokenId::Number(id),
            name: token.name,
            amount,
        });
        Ok("Token created".to_string())
    }

    async fn update(&self, update: TokenUpdate) -> Result<String, ApiError> {
        self.record(Call::Update(update.clone()));
        if let Some(err) = self.mutation_error() {
            return Err(err);
        }
        let amount = update
            .amount
            .ok_or_else(|| ApiError::rejected(Some("Invalid amount".to_string())))?;
        let mut tokens = self.tokens.lock().unwrap();
        let token = tokens
            .iter_mut()
            .find(|t| same_id(&t.id, &update.id))
            .ok_or_else(|| ApiError::rejected(Some("Token not found".to_string())))?;
        token.name = update.name;
        token.amount = amount;
        Ok("Token updated".to_string())
    }

    async fn delete(&self, id: &TokenId) -> Result<String, ApiError> {
        self.record(Call::Delete(id.clone()));
        if let Some(err) = self.mutation_error() {
            return Err(err);
        }
        let mut tokens = self.tokens.lock().unwrap();
        let before = tokens.len();
        tokens.retain(|t| !same_id(&t.id, id));
        if tokens.len() == before {
            return Err(ApiError::rejected(Some("Token not found".to_string())));
        }
        Ok("Token deleted".to_string())
    }

    async fn search(&self, id: &TokenId) -> Result<Option<Token>, ApiError> {
        self.record(Call::Search(id.clone()));
        let tokens = self.tokens.lock().unwrap();
        Ok(tokens.iter().find(|t| same_id(&t.id, id)).cloned())
    }

    async fn login(&self, credentials: Credentials) -> Result<String, ApiError> {
        self.record(Call::Login(credentials.username.clone()));
        if credentials.password == "secret" {
            Ok("Welcome".to_string())
        } else {
            Err(ApiError::rejected(Some("bad password".to_string())))
        }
    }

    async fn send_mail(&self, mail: MailRequest) -> Result<(), ApiError> {
        self.record(Call::Mail(mail.to.clone()));
        if mail.to.contains('@') {
            Ok(())
        } else {
            Err(ApiError::Status {
                status: 500,
                message: "Failed to send email".to_string(),
            })
        }
    }

    async fn send_message(&self, message: MessageRequest) -> Result<String, ApiError> {
        self.record(Call::Message(message.message.clone()));
        Ok(format!("Received: {}", message.message))
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Event {
    Tokens(ListDisplay),
    Pagination(Pagination),
    Search(SearchDisplay),
    Notice(Notice),
}

#[derive(Default)]
struct RecordingView {
    events: Mutex<Vec<Event>>,
}

impl RecordingView {
    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    fn notices(&self) -> Vec<Notice> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Notice(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    fn last_tokens(&self) -> Option<ListDisplay> {
        self.events().into_iter().rev().find_map(|e| match e {
            Event::Tokens(list) => Some(list),
            _ => None,
        })
    }

    fn last_pagination(&self) -> Option<Pagination> {
        self.events().into_iter().rev().find_map(|e| match e {
            Event::Pagination(p) => Some(p),
            _ => None,
        })
    }
}

impl View for RecordingView {
    fn render_tokens(&self, list: ListDisplay) {
        self.events.lock().unwrap().push(Event::Tokens(list));
    }

    fn render_pagination(&self, pagination: Pagination) {
        self.events.lock().unwrap().push(Event::Pagination(pagination));
    }

    fn render_search(&self, result: SearchDisplay) {
        self.events.lock().unwrap().push(Event::Search(result));
    }

    fn notify(&self, notice: Notice) {
        self.events.lock().unwrap().push(Event::Notice(notice));
    }
}

fn controller_with(
    api: &Arc<FakeApi>,
    options: SessionOptions,
) -> (Arc<TokenListController>, Arc<RecordingView>) {
    let view = Arc::new(RecordingView::default());
    let controller = Arc::new(TokenListController::new(
        api.clone(),
        view.clone(),
        options,
    ));
    (controller, view)
}

fn controller(api: &Arc<FakeApi>) -> (Arc<TokenListController>, Arc<RecordingView>) {
    controller_with(api, SessionOptions::default())
}

fn page(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n).unwrap()
}

fn row_amounts(list: &ListDisplay) -> Vec<i64> {
    match list {
        ListDisplay::Rows(rows) => rows.iter().map(|r| r.amount).collect(),
        ListDisplay::Notice(text) => panic!("expected rows, got notice {text}"),
    }
}

#[tokio::test]
async fn seven_tokens_ascending_fill_first_of_two_pages() {
    let api = FakeApi::seven();
    let (controller, view) = controller(&api);

    let outcome = controller.set_sort(SortOrder::Asc).await.unwrap();
    let FetchOutcome::Applied(result) = outcome else {
        panic!("listing was not applied");
    };
    assert_eq!(result.tokens.len(), 5);
    assert_eq!(result.current_page, 1);
    assert_eq!(result.total_pages, 2);

    assert_eq!(
        api.list_calls(),
        vec![ListQuery {
            page: page(1),
            limit: page(5),
            sort_order: SortOrder::Asc,
            min_amount: None,
            max_amount: None,
        }]
    );
    assert_eq!(
        row_amounts(&view.last_tokens().unwrap()),
        vec![10, 20, 30, 40, 50]
    );
    let pagination = view.last_pagination().unwrap();
    assert_eq!(pagination.label().as_deref(), Some("Page 1 of 2"));
    assert!(!pagination.prev_enabled);
    assert!(pagination.next_enabled);
    assert_eq!(controller.phase(), Phase::Rendered);
}

#[tokio::test]
async fn paging_moves_only_through_enabled_controls() {
    let api = FakeApi::seven();
    let (controller, view) = controller(&api);
    controller.refresh().await.unwrap();

    assert_eq!(controller.prev_page().await.unwrap(), None);
    assert!(controller.next_page().await.unwrap().is_some());
    assert_eq!(
        controller.page_state(),
        PageState {
            current_page: 2,
            total_pages: 2
        }
    );
    let pagination = view.last_pagination().unwrap();
    assert!(pagination.prev_enabled && !pagination.next_enabled);

    assert_eq!(controller.next_page().await.unwrap(), None);
    assert_eq!(api.list_calls().len(), 2);
}

#[tokio::test]
async fn failed_listing_keeps_page_state() {
    let api = FakeApi::seven();
    let (controller, view) = controller(&api);
    controller.go_to_page(page(2)).await.unwrap();
    let before = controller.page_state();

    api.script_list(Err(ApiError::Status {
        status: 500,
        message: "database unavailable".to_string(),
    }));
    let err = controller.go_to_page(page(1)).await.unwrap_err();
    assert!(matches!(err, ActionError::Api(ApiError::Status { status: 500, .. })));
    assert_eq!(controller.page_state(), before);
    assert_eq!(controller.phase(), Phase::Errored);
    assert_eq!(
        view.notices().last(),
        Some(&Notice::error("database unavailable"))
    );

    api.script_list(Err(ApiError::rejected(Some("nope".to_string()))));
    assert!(controller.refresh().await.is_err());
    assert_eq!(controller.page_state(), before);
}

#[tokio::test]
async fn failed_listing_still_remembers_requested_filters() {
    let api = FakeApi::seven();
    let (controller, _view) = controller(&api);
    api.script_list(Err(ApiError::transport("connection refused")));
    assert!(controller.set_filter(Some(15), None).await.is_err());
    assert_eq!(controller.query().min_amount, Some(15));
    assert_eq!(controller.page_state(), PageState::default());
}

#[tokio::test]
async fn malformed_rows_render_notice() {
    let api = FakeApi::seven();
    let (controller, view) = controller(&api);
    api.script_list(Ok(PageResult {
        tokens: TokenRows::Malformed,
        current_page: 1,
        total_pages: 1,
    }));
    controller.refresh().await.unwrap();
    assert_eq!(
        view.last_tokens(),
        Some(ListDisplay::Notice(NO_TOKENS.to_string()))
    );
}

#[tokio::test]
async fn empty_listing_renders_empty_list_without_pages() {
    let api = FakeApi::seven();
    let (controller, view) = controller(&api);
    controller.set_filter(Some(1000), None).await.unwrap();

    assert_eq!(view.last_tokens(), Some(ListDisplay::Rows(vec![])));
    let pagination = view.last_pagination().unwrap();
    assert_eq!(pagination.label(), None);
    assert!(!pagination.prev_enabled && !pagination.next_enabled);
    assert!(view.notices().is_empty());
}

#[tokio::test]
async fn filter_bounds_are_checked_before_any_request() {
    let api = FakeApi::seven();
    let (controller, view) = controller(&api);
    let err = controller.set_filter(Some(50), Some(10)).await.unwrap_err();
    assert!(matches!(err, ActionError::Invalid(_)));
    assert!(api.calls().is_empty());
    assert_eq!(view.notices()[0].level, NoticeLevel::Error);
}

#[tokio::test]
async fn sort_and_filter_reset_to_first_page() {
    let api = FakeApi::seven();
    let (controller, _view) = controller(&api);
    controller.go_to_page(page(2)).await.unwrap();
    controller.set_filter(Some(20), Some(60)).await.unwrap();
    let query = api.list_calls().pop().unwrap();
    assert_eq!(query.page, page(1));
    assert_eq!((query.min_amount, query.max_amount), (Some(20), Some(60)));

    controller.clear_filter().await.unwrap();
    let query = api.list_calls().pop().unwrap();
    assert_eq!((query.min_amount, query.max_amount), (None, None));
}

#[tokio::test]
async fn create_refetches_once_with_previous_query() {
    let api = FakeApi::seven();
    let (controller, view) = controller(&api);
    controller.set_sort(SortOrder::Desc).await.unwrap();
    controller.go_to_page(page(2)).await.unwrap();
    let held = controller.query();
    api.clear_calls();
    view.clear();

    controller.create_token("gold", "80").await.unwrap();

    assert_eq!(
        api.calls(),
        vec![
            Call::Create(NewToken {
                name: "gold".to_string(),
                amount: Some(80),
            }),
            Call::List(held),
        ]
    );
    assert_eq!(
        view.notices(),
        vec![Notice::success("Token created successfully!")]
    );
}

#[tokio::test]
async fn failed_create_does_not_refetch() {
    let api = FakeApi::seven();
    let (controller, view) = controller(&api);
    api.script_mutation_error(ApiError::rejected(Some("Name is required".to_string())));

    assert!(controller.create_token("", "5").await.is_err());
    assert_eq!(api.list_calls().len(), 0);
    assert_eq!(view.notices(), vec![Notice::error("Name is required")]);
}

#[tokio::test]
async fn lenient_amount_forwards_prefix_or_null() {
    let api = FakeApi::seven();
    let (controller, view) = controller(&api);

    controller.create_token("prefix", "12abc").await.unwrap();
    assert!(controller.create_token("junk", "abc").await.is_err());

    let amounts: Vec<_> = api
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Create(t) => Some(t.amount),
            _ => None,
        })
        .collect();
    assert_eq!(amounts, vec![Some(12), None]);
    assert_eq!(view.notices().last(), Some(&Notice::error("Invalid amount")));
}

#[tokio::test]
async fn strict_amount_rejects_before_request() {
    let api = FakeApi::seven();
    let (controller, view) = controller_with(
        &api,
        SessionOptions {
            strict_amount: true,
            ..SessionOptions::default()
        },
    );
    let err = controller.create_token("junk", "12abc").await.unwrap_err();
    assert!(matches!(err, ActionError::Invalid(_)));
    assert!(api.calls().is_empty());
    assert_eq!(view.notices()[0].level, NoticeLevel::Error);
}

#[tokio::test]
async fn update_reports_server_message_for_unknown_id() {
    let api = FakeApi::seven();
    let (controller, view) = controller(&api);

    controller
        .update_token(TokenId::from_input("2"), "renamed", "11")
        .await
        .unwrap();
    assert_eq!(
        view.notices()[0],
        Notice::success("Token updated successfully!")
    );
    assert_eq!(api.list_calls().len(), 1);

    assert!(controller
        .update_token(TokenId::from_input("42"), "ghost", "1")
        .await
        .is_err());
    assert_eq!(view.notices().last(), Some(&Notice::error("Token not found")));
    assert_eq!(api.list_calls().len(), 1);
}

#[tokio::test]
async fn delete_refetches_only_on_success() {
    let api = FakeApi::seven();
    let (controller, view) = controller(&api);
    controller.set_sort(SortOrder::Asc).await.unwrap();
    api.clear_calls();

    controller.delete_token(&TokenId::from_input("3")).await.unwrap();
    let calls = api.calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(&calls[1], Call::List(q) if q.sort_order == SortOrder::Asc));
    assert!(view
        .notices()
        .contains(&Notice::success("Token deleted successfully!")));

    api.clear_calls();
    assert!(controller
        .delete_token(&TokenId::from_input("3"))
        .await
        .is_err());
    assert_eq!(api.calls(), vec![Call::Delete(TokenId::from_input("3"))]);
    assert_eq!(view.notices().last(), Some(&Notice::error("Token not found")));
}

#[tokio::test]
async fn search_miss_leaves_listing_untouched() {
    let api = FakeApi::seven();
    let (controller, view) = controller(&api);
    controller.go_to_page(page(2)).await.unwrap();
    let query = controller.query();
    let state = controller.page_state();
    view.clear();

    let found = controller
        .search_token(&TokenId::from_input("99"))
        .await
        .unwrap();
    assert_eq!(found, None);
    assert_eq!(view.events(), vec![Event::Search(SearchDisplay::NotFound)]);
    assert_eq!(controller.query(), query);
    assert_eq!(controller.page_state(), state);
    assert_eq!(api.list_calls().len(), 1);
}

#[tokio::test]
async fn search_hit_renders_single_token() {
    let api = FakeApi::seven();
    let (controller, view) = controller(&api);
    let found = controller
        .search_token(&TokenId::from_input("3"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.amount, 70);
    let Some(Event::Search(result)) = view.events().pop() else {
        panic!("expected a search result");
    };
    assert_eq!(result.text(), "ID: 3, Name: t3, Amount: 70");
}

#[tokio::test]
async fn stale_listing_is_discarded() {
    let api = FakeApi::seven();
    let (controller, view) = controller(&api);

    let release = api.hold_next_list();
    let slow = tokio::spawn({
        let controller = controller.clone();
        async move { controller.go_to_page(page(1)).await }
    });
    api.list_entered.notified().await;
    assert_eq!(controller.phase(), Phase::Fetching);

    let fast = controller.go_to_page(page(2)).await.unwrap();
    assert!(matches!(fast, FetchOutcome::Applied(_)));
    view.clear();

    release.send(None).unwrap();
    let slow = slow.await.unwrap().unwrap();
    assert_eq!(slow, FetchOutcome::Superseded);
    assert_eq!(controller.page_state().current_page, 2);
    assert!(view.events().is_empty());
    assert_eq!(controller.phase(), Phase::Rendered);
}

#[tokio::test]
async fn late_failure_of_older_listing_is_ignored() {
    let api = FakeApi::seven();
    let (controller, view) = controller(&api);

    let release = api.hold_next_list();
    let (older, newer) = futures::join!(controller.go_to_page(page(1)), async {
        api.list_entered.notified().await;
        let newer = controller.go_to_page(page(2)).await;
        release
            .send(Some(Err(ApiError::transport("connection reset"))))
            .unwrap();
        newer
    });

    assert!(matches!(newer.unwrap(), FetchOutcome::Applied(_)));
    assert_eq!(older.unwrap(), FetchOutcome::Superseded);
    assert_eq!(controller.phase(), Phase::Rendered);
    assert_eq!(controller.page_state().current_page, 2);
    assert!(view.notices().is_empty());
}

#[tokio::test]
async fn delete_of_last_row_on_last_page_reloads_previous_page() {
    let api = FakeApi::with_amounts(&[10, 20, 30, 40, 50, 60]);
    let (controller, view) = controller(&api);
    controller.go_to_page(page(2)).await.unwrap();
    api.clear_calls();

    // a backend that echoes the requested page past the end
    api.script_list(Ok(PageResult {
        tokens: TokenRows::Rows(vec![]),
        current_page: 2,
        total_pages: 1,
    }));
    controller.delete_token(&TokenId::from_input("6")).await.unwrap();

    let pages: Vec<u32> = api.list_calls().iter().map(|q| q.page.get()).collect();
    assert_eq!(pages, vec![2, 1]);
    assert_eq!(
        controller.page_state(),
        PageState {
            current_page: 1,
            total_pages: 1
        }
    );
    assert_eq!(controller.query().page, page(1));
    assert_eq!(
        row_amounts(&view.last_tokens().unwrap()),
        vec![10, 20, 30, 40, 50]
    );
    assert!(view
        .notices()
        .iter()
        .all(|n| n.level != NoticeLevel::Error));
}

#[tokio::test]
async fn login_outcomes() {
    let api = FakeApi::seven();
    let (controller, view) = controller(&api);
    controller.login("ann", "secret").await.unwrap();
    assert!(controller.login("ann", "guess").await.is_err());
    assert_eq!(
        view.notices(),
        vec![
            Notice::success("Login successful!"),
            Notice::error("Login failed: bad password"),
        ]
    );
}

#[tokio::test]
async fn mail_and_message_notices() {
    let api = FakeApi::seven();
    let (controller, view) = controller(&api);
    controller
        .send_mail(MailRequest {
            to: "ann@example.com".to_string(),
            subject: "hi".to_string(),
            body: "hello".to_string(),
        })
        .await
        .unwrap();
    assert!(controller
        .send_mail(MailRequest {
            to: "nobody".to_string(),
            subject: "hi".to_string(),
            body: "hello".to_string(),
        })
        .await
        .is_err());
    assert_eq!(
        controller.send_message("ping").await.unwrap(),
        "Received: ping"
    );
    assert_eq!(
        view.notices(),
        vec![
            Notice::success("Email sent successfully!"),
            Notice::error("Failed to send email: Failed to send email"),
            Notice::info("Received: ping"),
        ]
    );
}

#[tokio::test]
async fn shell_loads_first_page_then_runs_commands() {
    let api = FakeApi::seven();
    let (controller, view) = controller(&api);
    let shell = Shell::new(controller.clone(), view.clone());

    let input: &[u8] = b"sort asc\nnext\nbogus\nsearch 99\nquit\nlist\n";
    shell.run(input).await.unwrap();

    let queries = api.list_calls();
    assert_eq!(queries.len(), 3);
    assert_eq!(queries[0].page, page(1));
    assert_eq!(queries[2].page, page(2));
    assert_eq!(queries[2].sort_order, SortOrder::Asc);
    assert_eq!(controller.page_state().current_page, 2);
    assert_eq!(row_amounts(&view.last_tokens().unwrap()), vec![60, 70]);
    assert!(view
        .notices()
        .iter()
        .any(|n| n.level == NoticeLevel::Error && n.text.contains("unknown command")));
    assert!(view
        .events()
        .contains(&Event::Search(SearchDisplay::NotFound)));
}
