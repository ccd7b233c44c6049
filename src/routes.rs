use rocket::serde::json::Json;
use rocket::Route;

use crate::auth::Authenticated;
use crate::models::{Message, Todo, TodoPatch, TodoPayload};
use crate::repository::{Repository, Result, DEFAULT_LIMIT};

/// A `limit` that is missing or not a non-negative integer means the default.
#[get("/?<limit>")]
async fn get_all_todos(repository: Repository, limit: Option<u64>) -> Result<Json<Vec<Todo>>> {
    repository
        .list(limit.unwrap_or(DEFAULT_LIMIT))
        .await
        .map(Json)
}

#[post("/", data = "<todo>")]
async fn create_todo(
    _auth: Authenticated,
    repository: Repository,
    todo: Json<TodoPayload>,
) -> Result<Json<Todo>> {
    repository.create(todo.into_inner()).await.map(Json)
}

#[get("/<id>")]
async fn get_todo(repository: Repository, id: &str) -> Result<Json<Todo>> {
    repository.get(id).await.map(Json)
}

#[put("/<id>", data = "<patch>")]
async fn update_todo(
    _auth: Authenticated,
    repository: Repository,
    id: &str,
    patch: Json<TodoPatch>,
) -> Result<Json<Todo>> {
    repository.update(id, patch.into_inner()).await.map(Json)
}

#[patch("/<id>", data = "<patch>")]
async fn patch_todo(
    auth: Authenticated,
    repository: Repository,
    id: &str,
    patch: Json<TodoPatch>,
) -> Result<Json<Todo>> {
    update_todo(auth, repository, id, patch).await
}

#[delete("/<id>")]
async fn delete_todo(
    _auth: Authenticated,
    repository: Repository,
    id: &str,
) -> Result<Json<Message>> {
    repository.delete(id).await.map(Json)
}

pub fn routes() -> Vec<Route> {
    routes![
        get_all_todos,
        create_todo,
        get_todo,
        update_todo,
        patch_todo,
        delete_todo
    ]
}
