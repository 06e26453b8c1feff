use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{redirect, Proxy, StatusCode};
use serde::de::DeserializeOwned;

use super::error::{ApiError, ClientError};
use super::types::*;
use super::{Result, TokenApi};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Clone, Debug)]
pub struct HttpOptions {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub proxy: Option<String>,
    pub header: Option<String>,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: 30,
            proxy: None,
            header: None,
        }
    }
}

/// `TokenApi` over HTTP/JSON.
#[derive(Clone, Debug)]
pub struct HttpTokenApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTokenApi {
    pub fn new(options: HttpOptions) -> std::result::Result<Self, ClientError> {
        let base_url = options.base_url.trim().trim_end_matches('/').to_string();
        match reqwest::Url::parse(&base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(ClientError::InvalidBaseUrl {
                    url: options.base_url,
                })
            }
        }

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static(concat!(
                "tokendesk/",
                env!("CARGO_PKG_VERSION")
            )),
        );
        if let Some(raw) = options.header.as_deref().filter(|h| !h.trim().is_empty()) {
            let (key, value) = parse_header(raw).ok_or_else(|| ClientError::InvalidHeader {
                header: raw.to_string(),
            })?;
            headers.append(key, value);
        }

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(redirect::Policy::limited(10));
        if options.timeout_seconds > 0 {
            builder = builder.timeout(Duration::from_secs(options.timeout_seconds));
        }
        if let Some(proxy) = options.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            let proxy_cfg = Proxy::all(proxy).map_err(|e| ClientError::ProxySetup {
                proxy: proxy.to_string(),
                source: e,
            })?;
            builder = builder.proxy(proxy_cfg);
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::HttpClientBuild { source: e })?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(StatusCode, String)> {
        let response = request.send().await.map_err(|e| {
            warn!("request failed: {e}");
            ApiError::transport(e)
        })?;
        let status = response.status();
        let body = response.text().await?;
        debug!("{} {}", status.as_u16(), truncate(&body, 256));
        Ok((status, body))
    }

    /// Reads a `{status, data, message}` reply into its payload.
    async fn envelope<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Envelope<T>> {
        let (status, body) = self.send(request).await?;
        let parsed = serde_json::from_str::<Envelope<T>>(&body);
        if !status.is_success() {
            let message = parsed
                .ok()
                .and_then(|e| e.message)
                .filter(|m| !m.trim().is_empty());
            return Err(match message {
                Some(message) => ApiError::Status {
                    status: status.as_u16(),
                    message,
                },
                None => ApiError::unexpected_status(status.as_u16()),
            });
        }
        let envelope = parsed.map_err(|e| ApiError::Decode {
            message: e.to_string(),
        })?;
        if !envelope.is_success() {
            return Err(ApiError::rejected(envelope.message));
        }
        Ok(envelope)
    }

    async fn mutation(&self, request: reqwest::RequestBuilder) -> Result<String> {
        let envelope = self.envelope::<serde_json::Value>(request).await?;
        Ok(envelope.message.unwrap_or_default())
    }
}

#[async_trait]
impl TokenApi for HttpTokenApi {
    async fn list(&self, query: &ListQuery) -> Result<PageResult> {
        let url = self.endpoint("/tokens");
        debug!("GET {url} {:?}", query);
        let request = self.client.get(url).query(&query.to_query_pairs());
        let envelope = self.envelope::<PageResult>(request).await?;
        let page = envelope.data.ok_or_else(|| ApiError::Decode {
            message: "listing without data".to_string(),
        })?;
        if !page.is_consistent() {
            return Err(ApiError::InvalidPage {
                current: page.current_page,
                total: page.total_pages,
            });
        }
        Ok(page)
    }

    async fn create(&self, token: NewToken) -> Result<String> {
        let url = self.endpoint("/tokens/create");
        debug!("POST {url} name={}", token.name);
        self.mutation(self.client.post(url).json(&token)).await
    }

    async fn update(&self, update: TokenUpdate) -> Result<String> {
        let url = self.endpoint("/tokens/update");
        debug!("PUT {url} id={}", update.id);
        self.mutation(self.client.put(url).json(&update)).await
    }

    async fn delete(&self, id: &TokenId) -> Result<String> {
        let url = self.endpoint("/tokens/delete");
        debug!("DELETE {url} id={id}");
        let request = self
            .client
            .delete(url)
            .query(&[("id", id.as_query_value())]);
        self.mutation(request).await
    }

    async fn search(&self, id: &TokenId) -> Result<Option<Token>> {
        let url = self.endpoint("/tokens/search");
        debug!("GET {url} id={id}");
        let request = self.client.get(url).query(&[("id", id.as_query_value())]);
        let envelope = self.envelope::<Token>(request).await?;
        Ok(envelope.data)
    }

    async fn login(&self, credentials: Credentials) -> Result<String> {
        let url = self.endpoint("/login");
        debug!("POST {url} username={}", credentials.username);
        let (status, body) = self.send(self.client.post(url).json(&credentials)).await?;
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: "Invalid credentials".to_string(),
            });
        }
        if !status.is_success() {
            return Err(ApiError::unexpected_status(status.as_u16()));
        }
        let reply = decode::<LoginReply>(&body)?;
        if !reply.success {
            return Err(ApiError::rejected(reply.message));
        }
        Ok(reply.message.unwrap_or_default())
    }

    async fn send_mail(&self, mail: MailRequest) -> Result<()> {
        let url = self.endpoint("/sendmail");
        debug!("POST {url} to={}", mail.to);
        let (status, body) = self.send(self.client.post(url).json(&mail)).await?;
        if !status.is_success() {
            // failures may come back as plain text
            let text = body.trim();
            return Err(if text.is_empty() {
                ApiError::unexpected_status(status.as_u16())
            } else {
                ApiError::Status {
                    status: status.as_u16(),
                    message: text.to_string(),
                }
            });
        }
        let reply = decode::<MailReply>(&body)?;
        if !reply.success {
            return Err(ApiError::rejected(reply.message));
        }
        Ok(())
    }

    async fn send_message(&self, message: MessageRequest) -> Result<String> {
        let url = self.endpoint("/api");
        debug!("POST {url}");
        let (status, body) = self.send(self.client.post(url).json(&message)).await?;
        let reply = serde_json::from_str::<MessageReply>(&body);
        if !status.is_success() {
            return Err(
                match reply.ok().and_then(|r| r.message).filter(|m| !m.is_empty()) {
                    Some(message) => ApiError::Status {
                        status: status.as_u16(),
                        message,
                    },
                    None => ApiError::unexpected_status(status.as_u16()),
                },
            );
        }
        let reply = reply.map_err(|e| ApiError::Decode {
            message: e.to_string(),
        })?;
        if reply.status.as_deref() == Some("fail") {
            return Err(ApiError::rejected(reply.message));
        }
        Ok(reply.message.unwrap_or_default())
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| ApiError::Decode {
        message: e.to_string(),
    })
}

pub fn parse_header(
    raw: &str,
) -> Option<(reqwest::header::HeaderName, reqwest::header::HeaderValue)> {
    let (key, value) = raw.split_once(':')?;
    let key = reqwest::header::HeaderName::from_str(key.trim()).ok()?;
    let value = reqwest::header::HeaderValue::from_str(value.trim()).ok()?;
    Some((key, value))
}

fn truncate(body: &str, max: usize) -> String {
    body.chars().take(max).collect()
}
