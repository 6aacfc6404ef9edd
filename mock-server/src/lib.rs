//! An in-memory stand-in for the Mailin web service.
//!
//! Like the real service it exposes a single endpoint taking form-encoded
//! POSTs, dispatches on the `webaction` field, and always answers `200` with
//! a JSON body, errors included.

mod store;

use std::{collections::HashMap, sync::Arc};

use axum::{extract::State, routing::post, Form, Json, Router};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub use store::{Store, ENTERED, SEEDED_CAMPAIGN};

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    app_with_store(Store::new())
}

pub fn app_with_store(store: Store) -> Router {
    let db: Db = Arc::new(RwLock::new(store));
    Router::new().route("/", post(dispatch)).with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn dispatch(State(db): State<Db>, Form(form): Form<HashMap<String, String>>) -> Json<Value> {
    if form.get("key").map_or(true, |key| key.trim().is_empty()) {
        tracing::warn!("request without API key");
        return Json(json!({ "errorMsg": "Key not found" }));
    }

    let action = form.get("webaction").map(String::as_str).unwrap_or_default();
    let body = db.write().await.handle(action, &form);
    tracing::debug!(action, success = body.get("errorMsg").is_none(), "handled");
    Json(body)
}
