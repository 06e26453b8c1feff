//! The token backend as a capability: everything the client can ask of the server.

pub mod error;
pub mod http;
pub mod types;

use async_trait::async_trait;

pub use error::{ApiError, ClientError};
pub use http::{HttpOptions, HttpTokenApi};
pub use types::*;

pub type Result<T> = std::result::Result<T, ApiError>;

#[async_trait]
pub trait TokenApi: Send + Sync {
    /// GET /tokens with pagination, sort and filter parameters.
    async fn list(&self, query: &ListQuery) -> Result<PageResult>;

    async fn create(&self, token: NewToken) -> Result<String>;

    async fn update(&self, update: TokenUpdate) -> Result<String>;

    async fn delete(&self, id: &TokenId) -> Result<String>;

    /// `Ok(None)` when the server has no record with this id.
    async fn search(&self, id: &TokenId) -> Result<Option<Token>>;

    async fn login(&self, credentials: Credentials) -> Result<String>;

    async fn send_mail(&self, mail: MailRequest) -> Result<()>;

    /// POST /api, returns the server's reply message.
    async fn send_message(&self, message: MessageRequest) -> Result<String>;
}
