use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid todo status: {0}")]
    InvalidStatus(String),

    #[error("Invalid TodoId: {0}")]
    InvalidTodoId(String),

    // 勤怠関連のエラー
    #[error("Invalid time literal: {0}")]
    InvalidTime(String),

    #[error("Invalid hexagram value: {0}")]
    InvalidHexagram(u8),
}
