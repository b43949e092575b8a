use crate::errors::AppError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORTAL_BASE_URL: &str = "https://cloud.waiqin365.com";
pub const DEFAULT_COOKIE_STORAGE_KEY: &str = "auth_cookies";

#[derive(Debug, Clone)]
pub struct Config {
    /// ポータルのベース URL（ログイン先）
    pub portal_base_url: String,
    pub request_timeout: Duration,
    pub login_retry_count: u32,
    pub login_retry_delay: Duration,
    pub cookie_storage_dir: PathBuf,
    pub cookie_storage_key: String,
    /// Cookie をクエリパラメータでも渡すか
    pub pass_cookie_via_url: bool,
    pub cookie_param_name: String,
    /// セッショントークン検証用の RSA 公開鍵（PEM）。未設定なら検証しない
    pub token_public_key: Option<String>,
    pub environment: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 任意のキー参照関数から設定を組み立てる
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Ok(Config {
            portal_base_url: text("PORTAL_BASE_URL", DEFAULT_PORTAL_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            request_timeout: Duration::from_millis(parse_var(&lookup, "PORTAL_TIMEOUT_MS", 30_000)?),
            login_retry_count: parse_var(&lookup, "LOGIN_RETRY_COUNT", 3)?,
            login_retry_delay: Duration::from_millis(parse_var(
                &lookup,
                "LOGIN_RETRY_DELAY_MS",
                1_000,
            )?),
            cookie_storage_dir: PathBuf::from(text("COOKIE_STORAGE_DIR", ".portal-admin")),
            cookie_storage_key: text("COOKIE_STORAGE_KEY", DEFAULT_COOKIE_STORAGE_KEY),
            pass_cookie_via_url: parse_var(&lookup, "PASS_COOKIE_VIA_URL", false)?,
            cookie_param_name: text("COOKIE_PARAM_NAME", "_cookie"),
            token_public_key: lookup("PORTAL_TOKEN_PUBLIC_KEY")
                .filter(|value| !value.trim().is_empty()),
            environment: text("ENVIRONMENT", "dev"),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            portal_base_url: DEFAULT_PORTAL_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            login_retry_count: 3,
            login_retry_delay: Duration::from_secs(1),
            cookie_storage_dir: PathBuf::from(".portal-admin"),
            cookie_storage_key: DEFAULT_COOKIE_STORAGE_KEY.to_string(),
            pass_cookie_via_url: false,
            cookie_param_name: "_cookie".to_string(),
            token_public_key: None,
            environment: "dev".to_string(),
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key).filter(|value| !value.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Configuration(format!("{} has an invalid value: {}", key, raw))),
        None => Ok(default),
    }
}
