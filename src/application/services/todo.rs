use crate::domain::models::{NewTodoItem, TodoItem, TodoPatch, TodoStats};
use crate::infrastructure::api_client::TodoApi;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::query_cache::{CacheKey, QueryCache, QueryKey};
use std::sync::Arc;

const TODO_MUTATION_SCOPES: [QueryKey; 2] = [QueryKey::Todos, QueryKey::TodoStats];

pub struct TodoService<A>
where
    A: TodoApi,
{
    api: Arc<A>,
    cache: Arc<QueryCache>,
}

impl<A> TodoService<A>
where
    A: TodoApi,
{
    pub fn new(api: Arc<A>, cache: Arc<QueryCache>) -> Self {
        Self { api, cache }
    }

    /// Trims the title and rejects a blank one before anything is sent.
    pub async fn create(&self, todo: NewTodoItem) -> Result<TodoItem, InfraError> {
        let todo = NewTodoItem {
            title: todo.title.trim().to_string(),
            description: todo
                .description
                .map(|description| description.trim().to_string())
                .filter(|description| !description.is_empty()),
            ..todo
        };
        todo.validate().map_err(InfraError::Validation)?;
        let created = self.api.create_todo(&todo).await?;
        self.cache.invalidate_all(&TODO_MUTATION_SCOPES)?;
        Ok(created)
    }

    pub async fn list(&self, completed: Option<bool>) -> Result<Vec<TodoItem>, InfraError> {
        let params = completed
            .map(|value| format!("completed={value}"))
            .unwrap_or_default();
        let api = Arc::clone(&self.api);
        self.cache
            .get_or_fetch(CacheKey::with_params(QueryKey::Todos, params), || async move {
                api.list_todos(completed).await
            })
            .await
    }

    pub async fn update(&self, todo_id: &str, patch: TodoPatch) -> Result<TodoItem, InfraError> {
        let patch = TodoPatch {
            title: patch.title.map(|title| title.trim().to_string()),
            ..patch
        };
        patch.validate().map_err(InfraError::Validation)?;
        let updated = self.api.update_todo(todo_id, &patch).await?;
        self.cache.invalidate_all(&TODO_MUTATION_SCOPES)?;
        Ok(updated)
    }

    /// Flips `completed` on the todo with this id, as last listed.
    pub async fn toggle(&self, todo_id: &str) -> Result<TodoItem, InfraError> {
        let todo_id = todo_id.trim();
        let current = self
            .list(None)
            .await?
            .into_iter()
            .find(|todo| todo.id == todo_id)
            .ok_or_else(|| InfraError::Validation(format!("todo {todo_id} not found")))?;
        self.update(
            todo_id,
            TodoPatch {
                completed: Some(!current.completed),
                ..TodoPatch::default()
            },
        )
        .await
    }

    pub async fn delete(&self, todo_id: &str) -> Result<(), InfraError> {
        self.api.delete_todo(todo_id).await?;
        self.cache.invalidate_all(&TODO_MUTATION_SCOPES)?;
        Ok(())
    }

    pub async fn stats(&self) -> Result<TodoStats, InfraError> {
        let api = Arc::clone(&self.api);
        self.cache
            .get_or_fetch(CacheKey::new(QueryKey::TodoStats), || async move {
                api.todo_stats().await
            })
            .await
    }
}
