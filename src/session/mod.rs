//! The listing controller: owns the query and page state that the token list
//! is rendered from, and re-synchronizes it after every mutation.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, warn};
use thiserror::Error;

use crate::api::{
    ApiError, Credentials, ListQuery, MailRequest, MessageRequest, NewToken, PageResult,
    QueryOverrides, SortOrder, Token, TokenApi, TokenId, TokenUpdate, DEFAULT_PAGE_LIMIT,
};
use crate::utils;
use crate::view::{ListDisplay, Notice, Pagination, SearchDisplay, TokenRow, View};

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Clone, Copy, Debug)]
pub struct SessionOptions {
    pub limit: NonZeroU32,
    /// Refuse amounts that are not whole integers instead of forwarding `null`.
    pub strict_amount: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            strict_amount: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Fetching,
    Rendered,
    Errored,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageState {
    pub current_page: i64,
    pub total_pages: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied(PageResult),
    /// A newer listing had already been applied when this one arrived.
    Superseded,
}

enum Listing {
    Settled(FetchOutcome),
    /// Reported page lies beyond the last one, which is carried.
    PastEnd(NonZeroU32),
}

#[derive(Debug)]
struct SessionState {
    query: ListQuery,
    page: PageState,
    applied_ticket: u64,
    in_flight: usize,
    settled: Phase,
}

pub struct TokenListController {
    api: Arc<dyn TokenApi>,
    view: Arc<dyn View>,
    strict_amount: bool,
    tickets: AtomicU64,
    state: Mutex<SessionState>,
}

impl TokenListController {
    pub fn new(api: Arc<dyn TokenApi>, view: Arc<dyn View>, options: SessionOptions) -> Self {
        Self {
            api,
            view,
            strict_amount: options.strict_amount,
            tickets: AtomicU64::new(0),
            state: Mutex::new(SessionState {
                query: ListQuery {
                    limit: options.limit,
                    ..ListQuery::default()
                },
                page: PageState::default(),
                applied_ticket: 0,
                in_flight: 0,
                settled: Phase::Idle,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The query the next listing will be issued with.
    pub fn query(&self) -> ListQuery {
        self.state().query.clone()
    }

    pub fn page_state(&self) -> PageState {
        self.state().page
    }

    pub fn pagination(&self) -> Pagination {
        let page = self.page_state();
        Pagination::new(page.current_page, page.total_pages)
    }

    pub fn phase(&self) -> Phase {
        let state = self.state();
        if state.in_flight > 0 {
            Phase::Fetching
        } else {
            state.settled
        }
    }

    /// Fetches a page, filling unspecified fields from the last-used query.
    /// Page state only moves when the server reports success.
    pub async fn fetch_tokens(
        &self,
        overrides: &QueryOverrides,
    ) -> Result<FetchOutcome, ActionError> {
        let query = {
            let mut state = self.state();
            let query = overrides.apply_to(&state.query);
            state.query = ListQuery {
                page: state.query.page,
                ..query.clone()
            };
            query
        };

        match self.list_once(&query, true).await? {
            Listing::Settled(outcome) => Ok(outcome),
            Listing::PastEnd(last) => {
                // the list shrank under the requested page
                debug!("page {} is past the end, reloading page {last}", query.page);
                let query = ListQuery {
                    page: last,
                    ..query
                };
                match self.list_once(&query, false).await? {
                    Listing::Settled(outcome) => Ok(outcome),
                    Listing::PastEnd(_) => Ok(FetchOutcome::Superseded),
                }
            }
        }
    }

    async fn list_once(
        &self,
        query: &ListQuery,
        reload_past_end: bool,
    ) -> Result<Listing, ActionError> {
        let ticket = {
            let mut state = self.state();
            state.in_flight += 1;
            self.tickets.fetch_add(1, Ordering::SeqCst) + 1
        };
        debug!("listing #{ticket}: {:?}", query);

        self.view.request_started("Loading tokens");
        let result = self.api.list(query).await;
        self.view.request_finished();

        let mut state = self.state();
        state.in_flight -= 1;
        if ticket <= state.applied_ticket {
            match &result {
                Ok(_) => debug!(
                    "discarding listing #{ticket}, #{} already applied",
                    state.applied_ticket
                ),
                Err(err) => debug!(
                    "ignoring failed listing #{ticket}, #{} already applied: {err}",
                    state.applied_ticket
                ),
            }
            return Ok(Listing::Settled(FetchOutcome::Superseded));
        }
        match result {
            Ok(page) => {
                if let Some(last) = page.past_end() {
                    if reload_past_end {
                        return Ok(Listing::PastEnd(last));
                    }
                }
                state.applied_ticket = ticket;
                state.settled = Phase::Rendered;
                let current_page = page.current_page.min(page.total_pages.max(1));
                state.page = PageState {
                    current_page,
                    total_pages: page.total_pages,
                };
                if let Some(current) = u32::try_from(current_page)
                    .ok()
                    .and_then(NonZeroU32::new)
                {
                    state.query.page = current;
                }
                // rendered under the lock so a newer listing cannot be drawn over
                self.view.render_tokens(ListDisplay::from_rows(&page.tokens));
                self.view
                    .render_pagination(Pagination::new(current_page, page.total_pages));
                Ok(Listing::Settled(FetchOutcome::Applied(page)))
            }
            Err(err) => {
                state.settled = Phase::Errored;
                drop(state);
                warn!("listing #{ticket} failed: {err}");
                self.view.notify(Notice::error(err.to_string()));
                Err(err.into())
            }
        }
    }

    /// Re-issues the last-used query.
    pub async fn refresh(&self) -> Result<FetchOutcome, ActionError> {
        self.fetch_tokens(&QueryOverrides::default()).await
    }

    pub async fn go_to_page(&self, page: NonZeroU32) -> Result<FetchOutcome, ActionError> {
        self.fetch_tokens(&QueryOverrides::page(page)).await
    }

    /// `Ok(None)` when already on the last page.
    pub async fn next_page(&self) -> Result<Option<FetchOutcome>, ActionError> {
        let pagination = self.pagination();
        if !pagination.next_enabled {
            return Ok(None);
        }
        let next = step_page(pagination.current_page, 1);
        self.go_to_page(next).await.map(Some)
    }

    /// `Ok(None)` when already on the first page.
    pub async fn prev_page(&self) -> Result<Option<FetchOutcome>, ActionError> {
        let pagination = self.pagination();
        if !pagination.prev_enabled {
            return Ok(None);
        }
        let prev = step_page(pagination.current_page, -1);
        self.go_to_page(prev).await.map(Some)
    }

    pub async fn set_sort(&self, order: SortOrder) -> Result<FetchOutcome, ActionError> {
        self.fetch_tokens(&QueryOverrides {
            page: Some(NonZeroU32::MIN),
            sort_order: Some(order),
            ..QueryOverrides::default()
        })
        .await
    }

    pub async fn set_filter(
        &self,
        min_amount: Option<i64>,
        max_amount: Option<i64>,
    ) -> Result<FetchOutcome, ActionError> {
        if let Err(message) = utils::check_bounds(min_amount, max_amount) {
            self.view.notify(Notice::error(message.clone()));
            return Err(ActionError::Invalid(message));
        }
        self.fetch_tokens(&QueryOverrides {
            page: Some(NonZeroU32::MIN),
            min_amount: Some(min_amount),
            max_amount: Some(max_amount),
            ..QueryOverrides::default()
        })
        .await
    }

    pub async fn clear_filter(&self) -> Result<FetchOutcome, ActionError> {
        self.set_filter(None, None).await
    }

    fn amount(&self, raw: &str) -> Result<Option<i64>, ActionError> {
        if self.strict_amount {
            return utils::parse_amount_strict(raw).map(Some).map_err(|message| {
                self.view.notify(Notice::error(message.clone()));
                ActionError::Invalid(message)
            });
        }
        let amount = utils::parse_amount(raw);
        if amount.is_none() {
            debug!("amount '{raw}' is not a number, sending null");
        }
        Ok(amount)
    }

    pub async fn create_token(&self, name: &str, amount: &str) -> Result<(), ActionError> {
        let token = NewToken {
            name: name.to_string(),
            amount: self.amount(amount)?,
        };
        self.view.request_started("Creating token");
        let result = self.api.create(token).await;
        self.view.request_finished();
        self.after_mutation(result, "Token created successfully!")
            .await
    }

    pub async fn update_token(
        &self,
        id: TokenId,
        name: &str,
        amount: &str,
    ) -> Result<(), ActionError> {
        let update = TokenUpdate {
            id,
            name: name.to_string(),
            amount: self.amount(amount)?,
        };
        self.view.request_started("Updating token");
        let result = self.api.update(update).await;
        self.view.request_finished();
        self.after_mutation(result, "Token updated successfully!")
            .await
    }

    pub async fn delete_token(&self, id: &TokenId) -> Result<(), ActionError> {
        self.view.request_started("Deleting token");
        let result = self.api.delete(id).await;
        self.view.request_finished();
        self.after_mutation(result, "Token deleted successfully!")
            .await
    }

    // On success the listing is re-fetched once with the held query; a failed
    // re-fetch reports itself and does not undo the mutation's success.
    async fn after_mutation(
        &self,
        result: Result<String, ApiError>,
        success: &str,
    ) -> Result<(), ActionError> {
        match result {
            Ok(reply) => {
                info!("{success} {reply}");
                self.view.notify(Notice::success(success));
                let _ = self.refresh().await;
                Ok(())
            }
            Err(err) => {
                warn!("mutation failed: {err}");
                self.view.notify(Notice::error(err.to_string()));
                Err(err.into())
            }
        }
    }

    /// Looks a single token up without touching the listing state.
    pub async fn search_token(&self, id: &TokenId) -> Result<Option<Token>, ActionError> {
        self.view.request_started("Searching");
        let result = self.api.search(id).await;
        self.view.request_finished();
        match result {
            Ok(Some(token)) => {
                self.view
                    .render_search(SearchDisplay::Found(TokenRow::from(&token)));
                Ok(Some(token))
            }
            Ok(None) => {
                self.view.render_search(SearchDisplay::NotFound);
                Ok(None)
            }
            Err(err) if err.is_server_reply() => {
                debug!("search for {id} answered: {err}");
                self.view.render_search(SearchDisplay::NotFound);
                Ok(None)
            }
            Err(err) => {
                warn!("search failed: {err}");
                self.view.notify(Notice::error(err.to_string()));
                Err(err.into())
            }
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<(), ActionError> {
        let credentials = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };
        self.view.request_started("Logging in");
        let result = self.api.login(credentials).await;
        self.view.request_finished();
        match result {
            Ok(_) => {
                self.view.notify(Notice::success("Login successful!"));
                Ok(())
            }
            Err(err) => {
                let text = match &err {
                    ApiError::Rejected { message } => format!("Login failed: {message}"),
                    other => other.to_string(),
                };
                self.view.notify(Notice::error(text));
                Err(err.into())
            }
        }
    }

    pub async fn send_mail(&self, mail: MailRequest) -> Result<(), ActionError> {
        self.view.request_started("Sending email");
        let result = self.api.send_mail(mail).await;
        self.view.request_finished();
        match result {
            Ok(()) => {
                self.view.notify(Notice::success("Email sent successfully!"));
                Ok(())
            }
            Err(err) => {
                self.view
                    .notify(Notice::error(format!("Failed to send email: {err}")));
                Err(err.into())
            }
        }
    }

    pub async fn send_message(&self, message: &str) -> Result<String, ActionError> {
        let request = MessageRequest {
            message: message.to_string(),
        };
        self.view.request_started("Sending message");
        let result = self.api.send_message(request).await;
        self.view.request_finished();
        match result {
            Ok(reply) => {
                self.view.notify(Notice::info(reply.clone()));
                Ok(reply)
            }
            Err(err) => {
                self.view.notify(Notice::error(err.to_string()));
                Err(err.into())
            }
        }
    }
}

fn step_page(current: i64, delta: i64) -> NonZeroU32 {
    u32::try_from(current.saturating_add(delta))
        .ok()
        .and_then(NonZeroU32::new)
        .unwrap_or(NonZeroU32::MIN)
}
