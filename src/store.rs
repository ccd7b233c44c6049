use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use diesel::dsl::{Find, Update};
use diesel::pg::Pg;
use diesel::prelude::*;
use rocket::tokio::sync::RwLock;
use rocket_sync_db_pools::database;

use crate::models::{NewTodo, Todo, TodoChanges};
use crate::schema::todos;

/// Persistence boundary for todos.
///
/// A missing record is `Ok(None)` / `Ok(false)`, never an error, so callers
/// can tell "not found" apart from a failing backend.
#[rocket::async_trait]
pub trait TodoStore: Send + Sync {
    async fn insert(&self, todo: NewTodo) -> QueryResult<Todo>;

    /// Up to `limit` todos in creation order.
    async fn list(&self, limit: i64) -> QueryResult<Vec<Todo>>;

    async fn find(&self, id: &str) -> QueryResult<Option<Todo>>;

    async fn update(&self, id: &str, changes: TodoChanges) -> QueryResult<Option<Todo>>;

    /// Whether a row was removed.
    async fn delete(&self, id: &str) -> QueryResult<bool>;
}

#[database("todos")]
pub struct Db(diesel::PgConnection);

fn list_query(limit: i64) -> todos::BoxedQuery<'static, Pg> {
    todos::table
        .order(todos::created_at.asc())
        .limit(limit)
        .into_boxed()
}

fn update_query(
    id: String,
    changes: TodoChanges,
) -> Update<Find<todos::table, String>, TodoChanges> {
    diesel::update(todos::table.find(id)).set(changes)
}

#[rocket::async_trait]
impl TodoStore for Db {
    async fn insert(&self, todo: NewTodo) -> QueryResult<Todo> {
        self.run(move |c| {
            diesel::insert_into(todos::table)
                .values(&todo)
                .get_result(c)
        })
        .await
    }

    async fn list(&self, limit: i64) -> QueryResult<Vec<Todo>> {
        self.run(move |c| list_query(limit).load(c)).await
    }

    async fn find(&self, id: &str) -> QueryResult<Option<Todo>> {
        let id = id.to_owned();
        self.run(move |c| todos::table.find(id).first(c).optional())
            .await
    }

    async fn update(&self, id: &str, changes: TodoChanges) -> QueryResult<Option<Todo>> {
        // diesel refuses an empty SET clause
        if changes.is_empty() {
            return self.find(id).await;
        }

        let id = id.to_owned();
        self.run(move |c| update_query(id, changes).get_result(c).optional())
            .await
    }

    async fn delete(&self, id: &str) -> QueryResult<bool> {
        let id = id.to_owned();
        let res = self
            .run(move |c| diesel::delete(todos::table.find(id)).execute(c))
            .await?;

        Ok(res == 1)
    }
}

/// Process-local store for development and tests. Cloning shares the data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    todos: Arc<RwLock<Vec<Todo>>>,
}

static NEXT_ID: AtomicU32 = AtomicU32::new(0);

/// 24 hex digits: creation second, then a process-wide counter.
fn generate_id(now: DateTime<Utc>) -> String {
    let counter = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{:08x}{:016x}", now.timestamp() as u32, counter)
}

#[rocket::async_trait]
impl TodoStore for MemoryStore {
    async fn insert(&self, todo: NewTodo) -> QueryResult<Todo> {
        let todo = Todo {
            id: generate_id(todo.created_at),
            title: todo.title,
            description: todo.description,
            done: todo.done,
            created_at: todo.created_at,
            completed_at: None,
            created_by: None,
        };
        self.todos.write().await.push(todo.clone());
        Ok(todo)
    }

    async fn list(&self, limit: i64) -> QueryResult<Vec<Todo>> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self.todos.read().await.iter().take(limit).cloned().collect())
    }

    async fn find(&self, id: &str) -> QueryResult<Option<Todo>> {
        Ok(self.todos.read().await.iter().find(|t| t.id == id).cloned())
    }

    async fn update(&self, id: &str, changes: TodoChanges) -> QueryResult<Option<Todo>> {
        let mut todos = self.todos.write().await;
        Ok(todos.iter_mut().find(|t| t.id == id).map(|todo| {
            todo.apply(&changes);
            todo.clone()
        }))
    }

    async fn delete(&self, id: &str) -> QueryResult<bool> {
        let mut todos = self.todos.write().await;
        let before = todos.len();
        todos.retain(|t| t.id != id);
        Ok(todos.len() < before)
    }
}
