//! ポータルへのログイン・状態確認・ログアウト

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use shared::{decode_token_claims, AppError, Config, DecodedToken, RetryExecutor, TokenVerifier};
use tracing::{debug, error, info, warn};

use crate::cookie_manager::{cookie_attributes, CookieManager};
use crate::credentials::{encode_password, EncryptionMode};
use crate::http_client::PortalHttpClient;

pub const PUBLIC_KEY_PATH: &str = "/api/platform/encrypt/getPublicKey.do";
pub const LOGON_PATH: &str = "/api/portal/logon.action";
pub const LOGIN_USER_PATH: &str = "/api/platform/param/v1/getLoginUser.do";
pub const LOGOUT_PATH: &str = "/api/portal/logout.action";

pub const TOKEN_COOKIE: &str = "x-token";
pub const LOGIN_STATUS_COOKIE: &str = "loginStatus";
const TOKEN_MAX_AGE_SECS: i64 = 7 * 24 * 3600;
const LOGIN_STATUS_MAX_AGE_SECS: i64 = 3600;

/// ログイン種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginType {
    /// 企業 ID + アカウント
    #[default]
    Account,
    /// 携帯電話番号
    Phone,
}

impl LoginType {
    /// `identifiers.type` の値
    pub fn code(self) -> &'static str {
        match self {
            LoginType::Account => "1",
            LoginType::Phone => "2",
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct LoginParams {
    pub login_type: LoginType,
    pub tenant_id: String,
    pub user_id: String,
    pub password: String,
}

impl fmt::Debug for LoginParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginParams")
            .field("login_type", &self.login_type)
            .field("tenant_id", &self.tenant_id)
            .field("user_id", &self.user_id)
            .field("password", &"***")
            .finish()
    }
}

impl LoginParams {
    pub fn account(tenant_id: &str, user_id: &str, password: &str) -> Self {
        Self {
            login_type: LoginType::Account,
            tenant_id: tenant_id.trim().to_string(),
            user_id: user_id.trim().to_string(),
            password: password.to_string(),
        }
    }

    pub fn phone(phone: &str, password: &str) -> Self {
        Self {
            login_type: LoginType::Phone,
            tenant_id: String::new(),
            user_id: phone.trim().to_string(),
            password: password.to_string(),
        }
    }

    /// ユーザー ID とパスワードは必須。アカウントログインでは企業 ID も必須
    pub fn validate(&self) -> Result<(), AppError> {
        let mut missing = Vec::new();
        if self.user_id.trim().is_empty() {
            missing.push("user id");
        }
        if self.password.is_empty() {
            missing.push("password");
        }
        if self.login_type == LoginType::Account && self.tenant_id.trim().is_empty() {
            missing.push("tenant id");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(format!(
                "incomplete login parameters: {} required",
                missing.join(", ")
            )))
        }
    }
}

/// ログイン成功時の結果
#[derive(Debug, Clone, PartialEq)]
pub struct LoginSession {
    pub mode: EncryptionMode,
    pub token: Option<String>,
    /// トークンから取り出したクレーム（取り出せなかった場合は None）
    pub claims: Option<DecodedToken>,
    pub message: Option<String>,
    pub data: Value,
}

/// ポータル認証サービス
pub struct PortalAuthService {
    http: PortalHttpClient,
    retry: RetryExecutor,
    verifier: Option<TokenVerifier>,
}

impl PortalAuthService {
    /// `PORTAL_TOKEN_PUBLIC_KEY` があればトークンの署名を検証する
    pub fn new(config: &Config, http: PortalHttpClient) -> Result<Self, AppError> {
        let verifier = match &config.token_public_key {
            Some(pem) => Some(TokenVerifier::rsa_pem(pem)?),
            None => {
                warn!("PORTAL_TOKEN_PUBLIC_KEY is not set; session token claims will be unverified");
                None
            }
        };

        Ok(Self {
            http,
            retry: RetryExecutor::fixed_interval(config.login_retry_count, config.login_retry_delay),
            verifier,
        })
    }

    pub fn with_retry(mut self, retry: RetryExecutor) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_verifier(mut self, verifier: Option<TokenVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn cookies(&self) -> &Arc<CookieManager> {
        self.http.cookies()
    }

    /// 公開鍵を取得する。失敗時は空文字（呼び出し側は平文 base64 に落とす）
    pub async fn fetch_public_key(&self) -> String {
        debug!("Fetching portal public key");
        let response = match self.http.get(PUBLIC_KEY_PATH, &[]).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Failed to fetch public key");
                return String::new();
            }
        };

        let key = match &response.body {
            Value::String(bare) => bare.trim().to_string(),
            body if response.field_str("code").as_deref() == Some("1") => match body.get("data") {
                Some(Value::String(key)) => key.clone(),
                Some(data) => data
                    .get("publicKey")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                None => String::new(),
            },
            _ => String::new(),
        };

        if key.is_empty() {
            warn!("Portal did not provide a public key");
        } else {
            debug!(len = key.len(), "Public key received");
        }
        key
    }

    /// 暗号化ログイン
    pub async fn login(&self, params: &LoginParams) -> Result<LoginSession, AppError> {
        params.validate()?;

        let public_key = self.fetch_public_key().await;
        let encoded = encode_password(&params.password, &public_key);
        info!(
            user_id = %params.user_id,
            login_type = params.login_type.code(),
            mode = ?encoded.mode,
            "Submitting login"
        );

        let fields = [
            ("identifiers.src", "waiqin365".to_string()),
            ("identifiers.password", encoded.value.clone()),
            ("identifiers.rsaType", encoded.mode.rsa_type().to_string()),
            ("identifiers.type", params.login_type.code().to_string()),
            ("identifiers.tenantname", params.tenant_id.clone()),
            ("identifiers.code", params.user_id.clone()),
        ];
        let response = self.http.post_form(LOGON_PATH, &fields).await?;

        let message = response
            .field_str("message")
            .or_else(|| response.field_str("msg"));
        if response.field_str("status").as_deref() != Some("1") {
            let reason = message.unwrap_or_else(|| "portal rejected the login".to_string());
            warn!(user_id = %params.user_id, reason = %reason, "Login rejected");
            return Err(AppError::Authentication(reason));
        }

        let token = response.field_str("token").filter(|token| !token.is_empty());
        let claims = token.as_deref().and_then(|token| self.store_token(token));

        self.cookies().set(
            LOGIN_STATUS_COOKIE,
            "success",
            cookie_attributes([("maxage", LOGIN_STATUS_MAX_AGE_SECS.into())]),
        );

        info!(
            user_id = %params.user_id,
            cookies = self.cookies().len(),
            "Login succeeded"
        );
        Ok(LoginSession {
            mode: encoded.mode,
            token,
            claims,
            message,
            data: response.body,
        })
    }

    /// トークンを `x-token` として保存し、クレームの ID も Cookie にする
    fn store_token(&self, token: &str) -> Option<DecodedToken> {
        let cookies = self.cookies();
        cookies.set(
            TOKEN_COOKIE,
            token,
            cookie_attributes([
                ("maxage", TOKEN_MAX_AGE_SECS.into()),
                ("path", "/".into()),
                ("secure", false.into()),
                ("httponly", false.into()),
            ]),
        );

        let decoded = match decode_token_claims(token, self.verifier.as_ref()) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(error = %e, "Could not read session token claims");
                return None;
            }
        };

        let claim_cookies = [
            ("tenantId", decoded.claims.tenant_id.as_deref()),
            ("userId", decoded.claims.user_id.as_deref()),
        ];
        for (name, value) in claim_cookies {
            if let Some(value) = value {
                cookies.set(
                    name,
                    value,
                    cookie_attributes([
                        ("maxage", TOKEN_MAX_AGE_SECS.into()),
                        ("path", "/".into()),
                    ]),
                );
            }
        }

        Some(decoded)
    }

    /// 失敗は種類を問わず再試行し、最後のエラーを返す
    pub async fn login_with_retry(
        &self,
        params: &LoginParams,
        retry_count: Option<u32>,
    ) -> Result<LoginSession, AppError> {
        params.validate()?;

        let executor = match retry_count {
            Some(count) => self.retry.clone().with_max_attempts(count),
            None => self.retry.clone(),
        };
        debug!(attempts = executor.strategy().max_attempts, "Login with retry");

        executor
            .execute_if(|| self.login(params), |_| true)
            .await
            .into_result()
            .map_err(|e| {
                error!(error = %e, "Login failed after retries");
                e
            })
    }

    /// 設定値の試行回数でログインする
    pub async fn auto_login(&self, params: &LoginParams) -> Result<LoginSession, AppError> {
        info!(user_id = %params.user_id, "Starting auto login");
        params.validate()?;
        self.login_with_retry(params, None).await
    }

    /// ログイン中なら true。通信エラーも false
    pub async fn check_status(&self) -> bool {
        match self.http.get(LOGIN_USER_PATH, &[]).await {
            Ok(response) => {
                let logged_in = response.field_str("code").as_deref() == Some("1");
                debug!(logged_in, "Login status checked");
                logged_in
            }
            Err(e) => {
                warn!(error = %e, "Login status check failed");
                false
            }
        }
    }

    /// サーバーが受け付けたかを返す。Cookie は結果にかかわらず消去
    pub async fn logout(&self) -> bool {
        let acknowledged = match self.http.get(LOGOUT_PATH, &[]).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Logout request failed");
                false
            }
        };

        self.cookies().clear();
        info!(acknowledged, "Logged out");
        acknowledged
    }
}
