use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const DEFAULT_PAGE_LIMIT: NonZeroU32 = match NonZeroU32::new(5) {
    Some(limit) => limit,
    None => unreachable!(),
};

/// Server-assigned identifier. Kept in whatever shape the backend sent it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TokenId {
    Number(i64),
    Text(String),
}

impl TokenId {
    /// Identifiers typed by a user are forwarded as text, the way a form field value is.
    pub fn from_input(raw: &str) -> Self {
        TokenId::Text(raw.trim().to_string())
    }

    pub fn as_query_value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenId::Number(n) => write!(f, "{n}"),
            TokenId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for TokenId {
    fn from(value: i64) -> Self {
        TokenId::Number(value)
    }
}

impl From<&str> for TokenId {
    fn from(value: &str) -> Self {
        TokenId::Text(value.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub name: String,
    pub amount: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Unsorted,
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "" | "none" | "off" => Some(Self::Unsorted),
            "asc" | "ascending" => Some(Self::Asc),
            "desc" | "descending" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Unsorted => "",
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Pagination, sort and filter parameters for a listing request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListQuery {
    pub page: NonZeroU32,
    pub limit: NonZeroU32,
    pub sort_order: SortOrder,
    pub min_amount: Option<i64>,
    pub max_amount: Option<i64>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: NonZeroU32::MIN,
            limit: DEFAULT_PAGE_LIMIT,
            sort_order: SortOrder::Unsorted,
            min_amount: None,
            max_amount: None,
        }
    }
}

impl ListQuery {
    /// Query pairs in wire order. Unset values go out as empty strings so the
    /// backend always sees all five keys.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let bound = |b: Option<i64>| b.map(|v| v.to_string()).unwrap_or_default();
        vec![
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
            ("sortOrder", self.sort_order.as_str().to_string()),
            ("minAmount", bound(self.min_amount)),
            ("maxAmount", bound(self.max_amount)),
        ]
    }
}

/// Fields a caller wants to change; everything left `None` keeps the last-used value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryOverrides {
    pub page: Option<NonZeroU32>,
    pub limit: Option<NonZeroU32>,
    pub sort_order: Option<SortOrder>,
    pub min_amount: Option<Option<i64>>,
    pub max_amount: Option<Option<i64>>,
}

impl QueryOverrides {
    pub fn page(page: NonZeroU32) -> Self {
        Self {
            page: Some(page),
            ..Self::default()
        }
    }

    pub fn apply_to(&self, base: &ListQuery) -> ListQuery {
        ListQuery {
            page: self.page.unwrap_or(base.page),
            limit: self.limit.unwrap_or(base.limit),
            sort_order: self.sort_order.unwrap_or(base.sort_order),
            min_amount: self.min_amount.unwrap_or(base.min_amount),
            max_amount: self.max_amount.unwrap_or(base.max_amount),
        }
    }
}

/// The `tokens` field of a listing. Anything that is not an array of tokens
/// decodes to `Malformed` instead of failing the whole response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenRows {
    Rows(Vec<Token>),
    Malformed,
}

impl TokenRows {
    pub fn len(&self) -> usize {
        match self {
            TokenRows::Rows(rows) => rows.len(),
            TokenRows::Malformed => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> Option<&[Token]> {
        match self {
            TokenRows::Rows(rows) => Some(rows.as_slice()),
            TokenRows::Malformed => None,
        }
    }
}

impl Default for TokenRows {
    fn default() -> Self {
        TokenRows::Rows(Vec::new())
    }
}

impl<'de> Deserialize<'de> for TokenRows {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Array(_) => Ok(serde_json::from_value::<Vec<Token>>(value)
                .map(TokenRows::Rows)
                .unwrap_or(TokenRows::Malformed)),
            _ => Ok(TokenRows::Malformed),
        }
    }
}

impl Serialize for TokenRows {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TokenRows::Rows(rows) => rows.serialize(serializer),
            TokenRows::Malformed => serializer.serialize_none(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    #[serde(default)]
    pub tokens: TokenRows,
    pub current_page: i64,
    pub total_pages: i64,
}

impl PageResult {
    /// A listing that reports a page below 1 cannot be rendered.
    pub fn is_consistent(&self) -> bool {
        self.total_pages < 1 || self.current_page >= 1
    }

    /// The last page that exists, when the reported page lies beyond it.
    /// Backends that echo the requested page answer this way once the list
    /// shrinks under the held page.
    pub fn past_end(&self) -> Option<NonZeroU32> {
        let last = self.total_pages.max(1);
        if self.current_page <= last {
            return None;
        }
        u32::try_from(last).ok().and_then(NonZeroU32::new)
    }
}

/// `{status, data, message}` wrapper used by every `/tokens*` endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub status: String,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoginReply {
    #[serde(default, deserialize_with = "flag_or_string")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewToken {
    pub name: String,
    pub amount: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUpdate {
    pub id: TokenId,
    pub name: String,
    pub amount: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MailRequest {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MailReply {
    #[serde(default, deserialize_with = "flag_or_string")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MessageRequest {
    pub message: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MessageReply {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

// the backend answers `"success": "true"` as a string
fn flag_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_i64() == Some(1),
        _ => false,
    })
}
