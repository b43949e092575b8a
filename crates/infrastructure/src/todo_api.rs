use std::time::Duration;

use chrono::Utc;
use domain::{NewTodo, StatusTransition, TodoId, TodoItem, TodoStatus};
use serde_json::Value;
use shared::{AppError, RetryExecutor};
use tracing::{debug, info, warn};

use crate::http_client::PortalHttpClient;
use crate::models::{TodoCommand, TodoPage};

pub const LIST_PATH: &str = "/api/todolist/list.do";

/// Todo API クライアント（Cookie は HTTP クライアントが付与する）
pub struct TodoApiClient {
    http: PortalHttpClient,
    retry: RetryExecutor,
}

impl TodoApiClient {
    pub fn new(http: PortalHttpClient) -> Self {
        Self {
            http,
            retry: RetryExecutor::exponential_backoff(3, Duration::from_millis(200)),
        }
    }

    pub fn with_retry(mut self, retry: RetryExecutor) -> Self {
        self.retry = retry;
        self
    }

    /// 作成日時の昇順で 1 ページ取得する。一時的なエラーは再試行
    pub async fn list(&self, page: u32, page_size: u32) -> Result<TodoPage, AppError> {
        if page == 0 || page_size == 0 {
            return Err(AppError::Validation(
                "page and page size start at 1".to_string(),
            ));
        }

        let query = [
            ("page", page.to_string()),
            ("pageSize", page_size.to_string()),
            ("sortBy", "createdAt".to_string()),
            ("sortOrder", "asc".to_string()),
        ];

        let response = self
            .retry
            .execute(|| self.http.get(LIST_PATH, &query))
            .await
            .into_result()?;
        let data = require_data(LIST_PATH, &response.body)?;

        let items: Vec<TodoItem> = data
            .get("items")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(parse_item).collect())
            .unwrap_or_default();
        let total = data
            .get("meta")
            .and_then(|meta| meta.get("total"))
            .and_then(Value::as_u64)
            .unwrap_or(0);

        debug!(page, page_size, count = items.len(), total, "Todo list fetched");
        Ok(TodoPage {
            items,
            total,
            page,
            page_size,
        })
    }

    pub async fn add(&self, todo: &NewTodo) -> Result<Value, AppError> {
        let data = self.send(TodoCommand::add(todo, Utc::now())).await?;
        info!(title = %todo.title, "Todo added");
        Ok(data)
    }

    /// タイトルは作成時と同じ規則で検証する
    pub async fn update(
        &self,
        id: &TodoId,
        title: &str,
        description: Option<&str>,
    ) -> Result<Value, AppError> {
        let mut validated = NewTodo::new(title)?;
        if let Some(description) = description {
            validated = validated.with_description(description);
        }

        let data = self
            .send(TodoCommand::Update {
                id: id.clone(),
                title: validated.title,
                description: validated.description,
            })
            .await?;
        info!(id = %id, "Todo updated");
        Ok(data)
    }

    pub async fn delete(&self, id: &TodoId) -> Result<Value, AppError> {
        let data = self.send(TodoCommand::Delete { id: id.clone() }).await?;
        info!(id = %id, "Todo deleted");
        Ok(data)
    }

    pub async fn update_status(&self, id: &TodoId, status: TodoStatus) -> Result<Value, AppError> {
        let data = self
            .send(TodoCommand::UpdateStatus {
                id: id.clone(),
                status,
            })
            .await?;
        info!(id = %id, status = status.label(), "Todo status updated");
        Ok(data)
    }

    /// 完了フラグだけを持つ旧エンドポイント
    pub async fn toggle_legacy(&self, id: &TodoId, completed: bool) -> Result<Value, AppError> {
        let data = self
            .send(TodoCommand::Toggle {
                id: id.clone(),
                completed,
            })
            .await?;
        info!(id = %id, completed, "Todo toggled");
        Ok(data)
    }

    /// 次のステータスへ進めて送信する。送信に失敗したら項目は変更しない
    pub async fn cycle_status(&self, item: &mut TodoItem) -> Result<StatusTransition, AppError> {
        let next = item.status.next();
        self.update_status(&item.id, next).await?;
        let transition = item.advance_status();
        info!(id = %item.id, transition = %transition, "Todo status cycled");
        Ok(transition)
    }

    async fn send(&self, command: TodoCommand) -> Result<Value, AppError> {
        let path = command.path();
        let response = self.http.post_json(path, &command).await?;
        require_data(path, &response.body).cloned()
    }
}

fn require_data<'a>(path: &str, body: &'a Value) -> Result<&'a Value, AppError> {
    match body.get("data") {
        Some(data) if !data.is_null() => Ok(data),
        _ => {
            warn!(path, "Todo API response has no data");
            Err(AppError::ExternalService(format!("{}: response has no data", path)))
        }
    }
}

fn parse_item(raw: &Value) -> Option<TodoItem> {
    match serde_json::from_value(raw.clone()) {
        Ok(item) => Some(item),
        Err(e) => {
            warn!(error = %e, "Skipping unreadable todo item");
            None
        }
    }
}
