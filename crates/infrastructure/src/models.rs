use chrono::{DateTime, SecondsFormat, Utc};
use domain::{NewTodo, TodoId, TodoItem, TodoStatus};
use serde::Serialize;

/// Todo API へ送るコマンド。`action` フィールドで種別を表す
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum TodoCommand {
    Add {
        title: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        status: TodoStatus,
        #[serde(rename = "createTime")]
        create_time: String,
    },
    Update {
        id: TodoId,
        title: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Delete {
        id: TodoId,
    },
    UpdateStatus {
        id: TodoId,
        status: TodoStatus,
    },
    /// 旧形式（完了フラグのみ）
    Toggle {
        id: TodoId,
        completed: bool,
    },
}

impl TodoCommand {
    pub fn add(todo: &NewTodo, now: DateTime<Utc>) -> Self {
        TodoCommand::Add {
            title: todo.title.clone(),
            description: todo.description.clone(),
            status: todo.status,
            create_time: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            TodoCommand::Add { .. } => "/api/todolist/add.do",
            TodoCommand::Update { .. } => "/api/todolist/update.do",
            TodoCommand::Delete { .. } => "/api/todolist/delete.do",
            TodoCommand::UpdateStatus { .. } => "/api/todolist/updateStatus.do",
            TodoCommand::Toggle { .. } => "/api/todolist/toggle.do",
        }
    }
}

/// 一覧の 1 ページ分
#[derive(Debug, Clone, PartialEq)]
pub struct TodoPage {
    pub items: Vec<TodoItem>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}
