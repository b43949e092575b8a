use crate::datetime::{from_epoch, parse_datetime};
use crate::errors::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Todo の識別子（採番はバックエンド側。数値で返ってくることもある）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TodoId(pub String);

impl TodoId {
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TodoId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(i64),
        }

        match RawId::deserialize(deserializer)? {
            RawId::Text(id) => Ok(Self(id)),
            RawId::Number(id) => Ok(Self(id.to_string())),
        }
    }
}

/// Todo の 3 状態
///
/// `Pending -> Processing -> Completed -> Pending` の循環のみを持ち、終端状態はない。
/// ワイヤ上は `"0"` / `"1"` / `"2"` の文字列コードで表現する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TodoStatus {
    /// 未処理
    #[default]
    Pending,
    /// 処理中
    Processing,
    /// 完了
    Completed,
}

impl TodoStatus {
    pub const ALL: [TodoStatus; 3] = [
        TodoStatus::Pending,
        TodoStatus::Processing,
        TodoStatus::Completed,
    ];

    /// ワイヤ上のステータスコード
    pub fn code(self) -> &'static str {
        match self {
            TodoStatus::Pending => "0",
            TodoStatus::Processing => "1",
            TodoStatus::Completed => "2",
        }
    }

    /// 画面表示用のラベル（ポータルの表記に合わせる）
    pub fn label(self) -> &'static str {
        match self {
            TodoStatus::Pending => "未处理",
            TodoStatus::Processing => "处理中",
            TodoStatus::Completed => "已完成",
        }
    }

    /// 循環遷移の次状態
    pub fn next(self) -> Self {
        match self {
            TodoStatus::Pending => TodoStatus::Processing,
            TodoStatus::Processing => TodoStatus::Completed,
            TodoStatus::Completed => TodoStatus::Pending,
        }
    }

    /// コード文字列から厳密に変換
    pub fn from_code(code: &str) -> Result<Self, DomainError> {
        match code.trim() {
            "0" => Ok(TodoStatus::Pending),
            "1" => Ok(TodoStatus::Processing),
            "2" => Ok(TodoStatus::Completed),
            other => Err(DomainError::InvalidStatus(other.to_string())),
        }
    }

    /// 未知のコードは `Pending` として扱う
    pub fn from_code_lenient(code: &str) -> Self {
        Self::from_code(code).unwrap_or_default()
    }

    /// 旧形式の boolean `completed` から変換する。
    /// `false` は常に `Pending` になるため、処理中の情報は失われる。
    pub fn from_legacy(completed: bool) -> Self {
        if completed {
            TodoStatus::Completed
        } else {
            TodoStatus::Pending
        }
    }

    /// 旧形式の boolean へ変換（`Completed` のみ true）
    pub fn to_legacy(self) -> bool {
        self == TodoStatus::Completed
    }
}

impl fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TodoStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s)
    }
}

impl Serialize for TodoStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for TodoStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(StatusValue::deserialize(deserializer)?.resolve())
    }
}

/// 新旧が混在するステータス値（旧データは boolean、新データはコード文字列）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusValue {
    Legacy(bool),
    Code(String),
    Number(i64),
}

impl StatusValue {
    pub fn resolve(&self) -> TodoStatus {
        match self {
            StatusValue::Legacy(completed) => TodoStatus::from_legacy(*completed),
            StatusValue::Code(code) => TodoStatus::from_code_lenient(code),
            StatusValue::Number(code) => TodoStatus::from_code_lenient(&code.to_string()),
        }
    }
}

/// ステータス遷移の記録
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    pub from: TodoStatus,
    pub to: TodoStatus,
}

impl fmt::Display for StatusTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.from.label(), self.to.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTodoItem", rename_all = "camelCase")]
pub struct TodoItem {
    pub id: TodoId,
    pub title: String,
    pub description: Option<String>,
    pub status: TodoStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TodoItem {
    /// ステータスを次状態へ進める
    pub fn advance_status(&mut self) -> StatusTransition {
        let from = self.status;
        self.status = from.next();
        StatusTransition {
            from,
            to: self.status,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status.to_legacy()
    }
}

/// バックエンドから受け取る生レコード
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTodoItem {
    id: TodoId,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<StatusValue>,
    #[serde(default)]
    completed: Option<bool>,
    #[serde(default, alias = "createTime", deserialize_with = "lenient_datetime")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updateTime", deserialize_with = "lenient_datetime")]
    updated_at: Option<DateTime<Utc>>,
}

impl From<RawTodoItem> for TodoItem {
    fn from(raw: RawTodoItem) -> Self {
        // status が優先。無ければ旧 completed フラグから復元
        let status = match (raw.status, raw.completed) {
            (Some(value), _) => value.resolve(),
            (None, Some(completed)) => TodoStatus::from_legacy(completed),
            (None, None) => TodoStatus::Pending,
        };

        Self {
            id: raw.id,
            title: raw.title.unwrap_or_default(),
            description: raw.description,
            status,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        }
    }
}

/// 文字列・秒・ミリ秒のいずれでも受け付け、解釈できなければ None
fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::String(text)) => parse_datetime(&text),
        Some(serde_json::Value::Number(number)) => number.as_i64().and_then(from_epoch),
        _ => None,
    })
}

/// 新規作成用の Todo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTodo {
    pub title: String,
    pub description: Option<String>,
    pub status: TodoStatus,
}

impl NewTodo {
    /// タイトルは前後の空白を除去し、空なら拒否する
    pub fn new(title: &str) -> Result<Self, DomainError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(DomainError::Validation("todo title is empty".to_string()));
        }

        Ok(Self {
            title: title.to_string(),
            description: None,
            status: TodoStatus::Pending,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = if description.trim().is_empty() {
            None
        } else {
            Some(description)
        };
        self
    }
}
