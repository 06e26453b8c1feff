//! Presentation seam between the listing controller and whatever draws it.

use serde::Serialize;

use crate::api::{Token, TokenRows};

pub const NO_TOKENS: &str = "No tokens found.";
pub const TOKEN_NOT_FOUND: &str = "Token not found.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

/// Page indicator plus the enabled state of the previous/next controls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub prev_enabled: bool,
    pub next_enabled: bool,
}

impl Pagination {
    pub fn new(current_page: i64, total_pages: i64) -> Self {
        if total_pages < 1 {
            return Self {
                current_page,
                total_pages,
                prev_enabled: false,
                next_enabled: false,
            };
        }
        Self {
            current_page,
            total_pages,
            prev_enabled: current_page != 1,
            next_enabled: current_page != total_pages,
        }
    }

    /// `None` means there is nothing to paginate.
    pub fn label(&self) -> Option<String> {
        if self.total_pages < 1 {
            return None;
        }
        Some(format!("Page {} of {}", self.current_page, self.total_pages))
    }
}

/// What a row in the list shows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TokenRow {
    pub id: String,
    pub name: String,
    pub amount: i64,
    /// Command that removes this row.
    pub delete_action: String,
}

impl From<&Token> for TokenRow {
    fn from(token: &Token) -> Self {
        Self {
            id: token.id.to_string(),
            name: token.name.clone(),
            amount: token.amount,
            delete_action: format!("delete {}", token.id),
        }
    }
}

/// The rendered state of the token list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListDisplay {
    Rows(Vec<TokenRow>),
    Notice(String),
}

impl ListDisplay {
    pub fn from_rows(tokens: &TokenRows) -> Self {
        match tokens {
            TokenRows::Rows(rows) => ListDisplay::Rows(rows.iter().map(TokenRow::from).collect()),
            TokenRows::Malformed => ListDisplay::Notice(NO_TOKENS.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchDisplay {
    Found(TokenRow),
    NotFound,
}

impl SearchDisplay {
    pub fn text(&self) -> String {
        match self {
            SearchDisplay::Found(row) => {
                format!("ID: {}, Name: {}, Amount: {}", row.id, row.name, row.amount)
            }
            SearchDisplay::NotFound => TOKEN_NOT_FOUND.to_string(),
        }
    }
}

pub trait View: Send + Sync {
    fn render_tokens(&self, list: ListDisplay);

    fn render_pagination(&self, pagination: Pagination);

    fn render_search(&self, result: SearchDisplay);

    fn notify(&self, notice: Notice);

    /// A request went out. Views without a busy indicator ignore this.
    fn request_started(&self, _label: &str) {}

    fn request_finished(&self) {}
}
