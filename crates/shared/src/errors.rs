use thiserror::Error;

/// アプリケーション全体で使用される包括的なエラー型
#[derive(Debug, Clone, Error)]
pub enum AppError {
    // ドメインエラー
    #[error("Domain error: {0}")]
    Domain(#[from] domain::DomainError),

    // 通信エラー
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout occurred: {0}")]
    Timeout(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    // 認証エラー
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid JWT token: {0}")]
    InvalidJwt(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    // 永続化エラー
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // 入力・設定エラー
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// エラーの分類
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 入力・認証などの呼び出し側起因
    Client,
    /// 相手先サーバー起因
    Server,
    /// 一時的なエラー（リトライ可能）
    Transient,
    /// ローカル環境起因
    Local,
}

/// エラーの重要度
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// エラーメタデータ
#[derive(Debug, Clone)]
pub struct ErrorMetadata {
    /// エラーコード
    pub code: &'static str,
    /// エラー分類
    pub category: ErrorCategory,
    /// エラー重要度
    pub severity: ErrorSeverity,
    /// リトライ可能フラグ
    pub retryable: bool,
}

impl ErrorMetadata {
    fn new(
        code: &'static str,
        category: ErrorCategory,
        severity: ErrorSeverity,
        retryable: bool,
    ) -> Self {
        Self {
            code,
            category,
            severity,
            retryable,
        }
    }
}

impl AppError {
    /// エラーメタデータを取得
    pub fn metadata(&self) -> ErrorMetadata {
        use ErrorCategory::*;
        use ErrorSeverity::*;

        match self {
            AppError::Domain(_) => ErrorMetadata::new("DOMAIN_ERROR", Client, Info, false),
            AppError::Network(_) => ErrorMetadata::new("NETWORK_ERROR", Transient, Error, true),
            AppError::Timeout(_) => ErrorMetadata::new("TIMEOUT", Transient, Error, true),
            AppError::ServiceUnavailable(_) => {
                ErrorMetadata::new("SERVICE_UNAVAILABLE", Transient, Error, true)
            }
            AppError::ExternalService(_) => {
                ErrorMetadata::new("EXTERNAL_SERVICE_ERROR", Server, Error, false)
            }
            AppError::Authentication(_) => {
                ErrorMetadata::new("AUTHENTICATION_ERROR", Client, Warning, false)
            }
            AppError::InvalidJwt(_) => ErrorMetadata::new("INVALID_JWT", Client, Warning, false),
            AppError::Encryption(_) => {
                ErrorMetadata::new("ENCRYPTION_ERROR", Local, Warning, false)
            }
            AppError::Storage(_) => ErrorMetadata::new("STORAGE_ERROR", Local, Warning, false),
            AppError::Serialization(_) => {
                ErrorMetadata::new("SERIALIZATION_ERROR", Local, Error, false)
            }
            AppError::Deserialization(_) => {
                ErrorMetadata::new("DESERIALIZATION_ERROR", Server, Error, false)
            }
            AppError::Validation(_) => ErrorMetadata::new("VALIDATION_ERROR", Client, Info, false),
            AppError::NotFound(_) => ErrorMetadata::new("NOT_FOUND", Client, Info, false),
            AppError::Configuration(_) => {
                ErrorMetadata::new("CONFIGURATION_ERROR", Local, Critical, false)
            }
            AppError::Internal(_) => ErrorMetadata::new("INTERNAL_ERROR", Local, Critical, false),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.metadata().retryable
    }

    /// オペレーター向けメッセージを取得
    pub fn user_message(&self) -> String {
        match self {
            AppError::Network(_) => {
                "ネットワークエラー: サーバーに接続できません（接続先・プロキシ設定を確認してください）"
                    .to_string()
            }
            AppError::Timeout(_) => "処理がタイムアウトしました".to_string(),
            AppError::ServiceUnavailable(_) => "サービスが一時的に利用できません".to_string(),
            AppError::Authentication(reason) => format!("ログインに失敗しました: {}", reason),
            AppError::InvalidJwt(_) => "セッショントークンが無効です".to_string(),
            AppError::Validation(reason) => format!("入力データが無効です: {}", reason),
            AppError::Domain(error) => format!("入力データが無効です: {}", error),
            AppError::NotFound(_) => "リソースが見つかりません".to_string(),
            AppError::Configuration(reason) => format!("設定エラー: {}", reason),
            _ => "予期しないエラーが発生しました".to_string(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        if error.is_data() || error.is_syntax() || error.is_eof() {
            AppError::Deserialization(error.to_string())
        } else {
            AppError::Serialization(error.to_string())
        }
    }
}
