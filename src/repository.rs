use chrono::Utc;
use log::error;
use rocket::http::Status;
use rocket::request::{self, FromRequest, Request};
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Json;
use thiserror::Error;

use crate::models::{Message, Todo, TodoPatch, TodoPayload, ValidationError};
use crate::store::{Db, MemoryStore, TodoStore};

pub const DEFAULT_LIMIT: u64 = 10;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Todo matching query does not exist.")]
    NotFound,
    #[error("storage failure: {0}")]
    Storage(#[from] diesel::result::Error),
}

pub type Result<T, E = RepositoryError> = std::result::Result<T, E>;

/// Handled errors keep the `{"msg": ..}` body and a 200 status, which is what
/// existing clients of this API look for. Storage failures are a 500.
impl<'r> Responder<'r, 'static> for RepositoryError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let (status, message) = match &self {
            RepositoryError::Validation(_) | RepositoryError::NotFound => {
                (Status::Ok, Message::new(self.to_string()))
            }
            RepositoryError::Storage(e) => {
                error!("{} {}: {}", req.method(), req.uri(), e);
                let status = Status::InternalServerError;
                (status, Message::new(status.reason_lossy()))
            }
        };

        Response::build_from(Json(message).respond_to(req)?)
            .status(status)
            .ok()
    }
}

/// CRUD over todos, backed by whichever store the service was built with.
pub struct Repository {
    store: Box<dyn TodoStore>,
}

impl Repository {
    pub fn new(store: impl TodoStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    pub async fn create(&self, payload: TodoPayload) -> Result<Todo> {
        let todo = payload.validate(Utc::now())?;
        Ok(self.store.insert(todo).await?)
    }

    pub async fn list(&self, limit: u64) -> Result<Vec<Todo>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        Ok(self.store.list(limit).await?)
    }

    pub async fn get(&self, id: &str) -> Result<Todo> {
        self.store.find(id).await?.ok_or(RepositoryError::NotFound)
    }

    pub async fn update(&self, id: &str, patch: TodoPatch) -> Result<Todo> {
        if let Err(e) = patch.validate(id) {
            // an unknown id wins over a bad payload
            self.get(id).await?;
            return Err(e.into());
        }

        self.store
            .update(id, patch.into_changes(Utc::now()))
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Returns the confirmation message naming the deleted todo.
    pub async fn delete(&self, id: &str) -> Result<Message> {
        let todo = self.get(id).await?;
        if !self.store.delete(id).await? {
            return Err(RepositoryError::NotFound);
        }

        Ok(Message::new(format!(
            "The todo with title: {} is now deleted",
            todo.title
        )))
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Repository {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, ()> {
        if let Some(store) = req.rocket().state::<MemoryStore>() {
            return request::Outcome::Success(Repository::new(store.clone()));
        }

        req.guard::<Db>().await.map(Repository::new)
    }
}

#[cfg(test)]
mod tests {
    use diesel::QueryResult;
    use rocket::local::asynchronous::Client;
    use rocket::serde::json::{json, Value};
    use rocket::State;

    use super::*;
    use crate::models::{NewTodo, TodoChanges};

    /// Reads succeed but the row is always gone by the time it is deleted.
    #[derive(Clone, Default)]
    struct VanishingStore(MemoryStore);

    #[rocket::async_trait]
    impl TodoStore for VanishingStore {
        async fn insert(&self, todo: NewTodo) -> QueryResult<Todo> {
            self.0.insert(todo).await
        }

        async fn list(&self, limit: i64) -> QueryResult<Vec<Todo>> {
            self.0.list(limit).await
        }

        async fn find(&self, id: &str) -> QueryResult<Option<Todo>> {
            self.0.find(id).await
        }

        async fn update(&self, id: &str, changes: TodoChanges) -> QueryResult<Option<Todo>> {
            self.0.update(id, changes).await
        }

        async fn delete(&self, _id: &str) -> QueryResult<bool> {
            Ok(false)
        }
    }

    #[delete("/<id>")]
    async fn delete_vanishing(id: &str, store: &State<VanishingStore>) -> Result<Json<Message>> {
        Repository::new(store.inner().clone())
            .delete(id)
            .await
            .map(Json)
    }

    fn payload(title: &str, description: &str) -> TodoPayload {
        TodoPayload {
            title: Some(title.to_string()),
            description: Some(description.to_string()),
        }
    }

    #[rocket::async_test]
    async fn create_then_get_returns_submitted_fields() {
        let repository = Repository::new(MemoryStore::default());
        let created = repository.create(payload("title", "descr")).await.unwrap();
        assert!(!created.done);
        assert!(created.completed_at.is_none());

        let fetched = repository.get(&created.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[rocket::async_test]
    async fn invalid_create_persists_nothing() {
        let repository = Repository::new(MemoryStore::default());
        let err = repository
            .create(TodoPayload {
                title: Some("only a title".to_string()),
                description: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Validation(_)));
        assert!(repository.list(DEFAULT_LIMIT).await.unwrap().is_empty());
    }

    #[rocket::async_test]
    async fn completing_twice_restamps_completed_at() {
        let repository = Repository::new(MemoryStore::default());
        let todo = repository.create(payload("a", "b")).await.unwrap();
        let done = || TodoPatch {
            done: Some(true),
            ..Default::default()
        };

        let first = repository.update(&todo.id, done()).await.unwrap();
        let second = repository.update(&todo.id, done()).await.unwrap();
        assert!(second.done);
        assert!(second.completed_at.unwrap() >= first.completed_at.unwrap());
    }

    #[rocket::async_test]
    async fn invalid_update_on_unknown_id_is_not_found() {
        let repository = Repository::new(MemoryStore::default());
        let patch = TodoPatch {
            title: Some(String::new()),
            ..Default::default()
        };
        let err = repository.update("missing", patch).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[rocket::async_test]
    async fn delete_reports_title_then_not_found() {
        let repository = Repository::new(MemoryStore::default());
        let todo = repository.create(payload("A", "B")).await.unwrap();

        let message = repository.delete(&todo.id).await.unwrap();
        assert_eq!(message.msg, "The todo with title: A is now deleted");
        assert!(matches!(
            repository.delete(&todo.id).await.unwrap_err(),
            RepositoryError::NotFound
        ));
    }

    #[rocket::async_test]
    async fn delete_losing_the_race_is_not_found() {
        let store = VanishingStore::default();
        let repository = Repository::new(store.clone());
        let todo = repository.create(payload("A", "B")).await.unwrap();

        let err = repository.delete(&todo.id).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
        assert_eq!(err.to_string(), "Todo matching query does not exist.");

        let rocket = rocket::build()
            .manage(store)
            .mount("/todos", routes![delete_vanishing]);
        let client = Client::tracked(rocket).await.unwrap();
        let response = client
            .delete(format!("/todos/{}", todo.id))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(
            response.into_json::<Value>().await.unwrap(),
            json!({ "msg": "Todo matching query does not exist." })
        );
    }
}
