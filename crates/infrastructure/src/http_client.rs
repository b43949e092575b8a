use std::sync::Arc;

use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;
use shared::{AppError, Config};
use tracing::{debug, error, warn};

use crate::cookie_manager::CookieManager;

/// ポータルからの応答
#[derive(Debug, Clone, PartialEq)]
pub struct PortalResponse {
    pub status: u16,
    pub set_cookies: Vec<String>,
    /// JSON でなければ `Value::String` に本文をそのまま入れる
    pub body: Value,
}

impl PortalResponse {
    /// 本文のフィールドを文字列として読む（数値も受け付ける）
    pub fn field_str(&self, field: &str) -> Option<String> {
        match self.body.get(field)? {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        }
    }
}

/// Cookie を自動で付与・回収する HTTP クライアント
#[derive(Debug, Clone)]
pub struct PortalHttpClient {
    client: reqwest::Client,
    base_url: String,
    cookies: Arc<CookieManager>,
    pass_cookie_via_url: bool,
    cookie_param_name: String,
}

impl PortalHttpClient {
    pub fn new(config: &Config, cookies: Arc<CookieManager>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.portal_base_url.trim_end_matches('/').to_string(),
            cookies,
            pass_cookie_via_url: config.pass_cookie_via_url,
            cookie_param_name: config.cookie_param_name.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cookies(&self) -> &Arc<CookieManager> {
        &self.cookies
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<PortalResponse, AppError> {
        let request = self.client.get(self.url(path)).query(query);
        self.send("GET", path, request).await
    }

    pub async fn post_form(
        &self,
        path: &str,
        fields: &[(&str, String)],
    ) -> Result<PortalResponse, AppError> {
        let request = self.client.post(self.url(path)).form(fields);
        self.send("POST", path, request).await
    }

    pub async fn post_json<B>(&self, path: &str, body: &B) -> Result<PortalResponse, AppError>
    where
        B: Serialize + ?Sized,
    {
        let request = self.client.post(self.url(path)).json(body);
        self.send("POST", path, request).await
    }

    async fn send(
        &self,
        method: &str,
        path: &str,
        mut request: RequestBuilder,
    ) -> Result<PortalResponse, AppError> {
        // ロックは送信前に解放される
        let cookie_header = self.cookies.to_header_string();
        if !cookie_header.is_empty() {
            if self.pass_cookie_via_url {
                request = request.query(&[(self.cookie_param_name.as_str(), cookie_header.as_str())]);
            }
            request = request.header(COOKIE, cookie_header);
        }

        debug!(method, path, "Sending portal request");
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                error!(method, path, error = %e, "Portal request timed out");
                AppError::Timeout(format!("{} {}: {}", method, path, e))
            } else {
                error!(method, path, error = %e, "Portal request failed");
                AppError::Network(format!("{} {}: {}", method, path, e))
            }
        })?;

        let status = response.status();
        let set_cookies: Vec<String> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_string)
            .collect();

        if !set_cookies.is_empty() {
            let stored = self.cookies.set_from_headers(&set_cookies);
            debug!(path, stored, "Captured cookies from response");
        }

        let text = response.text().await.map_err(|e| {
            AppError::Network(format!("{} {}: failed to read body: {}", method, path, e))
        })?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        check_status(method, path, status)?;
        debug!(method, path, status = status.as_u16(), "Portal request completed");

        Ok(PortalResponse {
            status: status.as_u16(),
            set_cookies,
            body,
        })
    }
}

fn check_status(method: &str, path: &str, status: StatusCode) -> Result<(), AppError> {
    if status.is_success() {
        return Ok(());
    }

    warn!(method, path, status = status.as_u16(), "Portal returned an error status");
    let message = format!("{} {} returned {}", method, path, status);
    if status.is_server_error() {
        Err(AppError::ServiceUnavailable(message))
    } else {
        Err(AppError::ExternalService(message))
    }
}
