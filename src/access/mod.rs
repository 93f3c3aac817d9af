pub mod gate;
pub mod plan;
pub mod policy;

use crate::state::AppState;
use axum::{routing::get, Extension, Json, Router};
use serde_json::Value;

use self::{
    plan::{Plan, User},
    policy::AccessRequest,
};
use crate::envelope::Envelope;

/// Decision endpoint, mounted under `/api`.
pub fn router() -> Router<AppState> {
    Router::new().route("/access", get(gate::check_access))
}

/// Gated views. Each one is its own router so it gets its own requirement.
pub fn views(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(gate::protect(
            Router::new().route("/dashboard", get(dashboard)),
            state,
            AccessRequest::default(),
        ))
        .merge(gate::protect(
            Router::new().route("/admin", get(admin)),
            state,
            AccessRequest::admin_only(),
        ))
        .merge(gate::protect(
            Router::new().route("/premium", get(premium)),
            state,
            AccessRequest::plan(Plan::Pro),
        ))
}

fn view(name: &str, user: User) -> Json<Envelope> {
    let user = serde_json::to_value(user).unwrap_or(Value::Null);
    Json(
        Envelope::succeeded()
            .with("view", Value::from(name))
            .with("user", user),
    )
}

async fn dashboard(Extension(user): Extension<User>) -> Json<Envelope> {
    view("dashboard", user)
}

async fn admin(Extension(user): Extension<User>) -> Json<Envelope> {
    view("admin", user)
}

async fn premium(Extension(user): Extension<User>) -> Json<Envelope> {
    view("premium", user)
}
