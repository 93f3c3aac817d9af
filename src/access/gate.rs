use axum::{
    extract::{Query, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
    Extension, Json, Router,
};
use serde_json::Value;
use tracing::{debug, error, instrument, warn};

use super::{
    plan::User,
    policy::{evaluate, AccessRequest, AuthState, Decision},
};
use crate::{
    backend::{credential, Backend},
    envelope::Envelope,
    state::AppState,
};

pub const LOADING_PLACEHOLDER: &str = "Loading...";

/// Asks the identity provider who is calling. Every failure resolves to a
/// signed-out state; only the log tells them apart.
pub async fn resolve_auth_state(
    backend: &dyn Backend,
    authorization: Option<&HeaderValue>,
) -> AuthState {
    let Some(authorization) =
        authorization.filter(|v| !v.as_bytes().iter().all(u8::is_ascii_whitespace))
    else {
        return AuthState::anonymous();
    };

    let body = match backend.me(authorization).await {
        Ok(reply) => match reply.into_result("Failed to get user") {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "identity lookup rejected");
                return AuthState::anonymous();
            }
        },
        Err(e) => {
            error!(error = %e, "identity lookup failed");
            return AuthState::anonymous();
        }
    };

    match body.data.get("user").cloned().map(serde_json::from_value::<User>) {
        Some(Ok(user)) => AuthState::signed_in(user),
        Some(Err(e)) => {
            warn!(error = %e, "identity provider sent an unreadable user");
            AuthState::anonymous()
        }
        None => {
            warn!("identity provider reply has no user");
            AuthState::anonymous()
        }
    }
}

/// Middleware run in front of every protected view.
pub async fn gate(
    State(state): State<AppState>,
    Extension(access): Extension<AccessRequest>,
    mut req: Request,
    next: Next,
) -> Response {
    let authorization = credential(req.headers()).cloned();
    let auth = resolve_auth_state(state.backend.as_ref(), authorization.as_ref()).await;
    match evaluate(&auth, &access) {
        Decision::Allow => {
            if let Some(user) = auth.user {
                req.extensions_mut().insert(user);
            }
            next.run(req).await
        }
        Decision::Redirect(target) => {
            debug!(path = %req.uri().path(), to = target.path(), "gate redirect");
            Redirect::to(target.path()).into_response()
        }
        Decision::Wait => (StatusCode::ACCEPTED, LOADING_PLACEHOLDER).into_response(),
    }
}

/// Puts every route of `router` behind the gate with one access requirement.
pub fn protect(router: Router<AppState>, state: &AppState, access: AccessRequest) -> Router<AppState> {
    router
        .route_layer(middleware::from_fn_with_state(state.clone(), gate))
        .route_layer(Extension(access))
}

/// Runs the same policy as the gate and reports the verdict as JSON.
#[instrument(skip(state, headers))]
pub async fn check_access(
    State(state): State<AppState>,
    Query(access): Query<AccessRequest>,
    headers: HeaderMap,
) -> Json<Envelope> {
    let auth = resolve_auth_state(state.backend.as_ref(), credential(&headers)).await;
    let body = match evaluate(&auth, &access) {
        Decision::Allow => Envelope::succeeded().with("decision", Value::from("allow")),
        Decision::Wait => Envelope::succeeded().with("decision", Value::from("wait")),
        Decision::Redirect(target) => Envelope::succeeded()
            .with("decision", Value::from("redirect"))
            .with("redirect", Value::from(target.path())),
    };
    Json(body)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::header::{AUTHORIZATION, LOCATION},
        routing::get,
    };
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::{access::plan::Plan, backend::fake::FakeBackend};

    fn me_reply(role: &str, plan: &str) -> FakeBackend {
        FakeBackend::replying(
            StatusCode::OK,
            json!({
                "success": true,
                "user": { "role": role, "subscription": { "plan": plan } }
            }),
        )
    }

    fn app(backend: Arc<FakeBackend>, access: AccessRequest) -> Router {
        let state = AppState::fake(backend);
        let protected = Router::new().route(
            "/view",
            get(|Extension(user): Extension<User>| async move { user.plan().to_string() }),
        );
        protect(protected, &state, access).with_state(state)
    }

    async fn call(app: Router, authorization: Option<&str>) -> Response {
        let mut builder = axum::http::Request::builder().uri("/view");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap()
    }

    fn location(res: &Response) -> &str {
        res.headers().get(LOCATION).unwrap().to_str().unwrap()
    }

    #[tokio::test]
    async fn no_header_redirects_to_login_without_upstream_call() {
        let backend = Arc::new(me_reply("admin", "pro"));
        let res = call(app(backend.clone(), AccessRequest::default()), None).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), "/login");
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn blank_header_redirects_to_login_without_upstream_call() {
        let backend = Arc::new(me_reply("admin", "pro"));
        let res = call(app(backend.clone(), AccessRequest::default()), Some("")).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), "/login");
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn rejected_token_redirects_to_login() {
        let backend = Arc::new(FakeBackend::replying(
            StatusCode::UNAUTHORIZED,
            json!({ "success": false, "message": "jwt expired" }),
        ));
        let res = call(app(backend.clone(), AccessRequest::default()), Some("Bearer old")).await;
        assert_eq!(location(&res), "/login");
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn upstream_outage_redirects_to_login() {
        let backend = Arc::new(FakeBackend::failing("connection refused"));
        let res = call(app(backend, AccessRequest::default()), Some("Bearer t")).await;
        assert_eq!(location(&res), "/login");
    }

    #[tokio::test]
    async fn low_plan_redirects_to_upgrade() {
        let backend = Arc::new(me_reply("member", "free"));
        let res = call(app(backend, AccessRequest::plan(Plan::Pro)), Some("Bearer t")).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), "/upgrade");
    }

    #[tokio::test]
    async fn member_on_admin_view_redirects_to_dashboard() {
        let backend = Arc::new(me_reply("member", "pro"));
        let res = call(app(backend, AccessRequest::admin_only()), Some("Bearer t")).await;
        assert_eq!(location(&res), "/dashboard");
    }

    #[tokio::test]
    async fn allowed_request_reaches_view_with_user() {
        let backend = Arc::new(me_reply("member", "pro"));
        let res = call(app(backend.clone(), AccessRequest::plan(Plan::Basic)), Some("Bearer t")).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"pro");
        assert_eq!(
            backend.last_authorization.lock().unwrap().as_deref(),
            Some("Bearer t")
        );
    }

    #[tokio::test]
    async fn reply_without_user_is_signed_out() {
        let backend = FakeBackend::replying(StatusCode::OK, json!({ "success": true }));
        let auth = resolve_auth_state(&backend, Some(&HeaderValue::from_static("Bearer t"))).await;
        assert!(!auth.is_authenticated);
        assert!(auth.user.is_none());
    }
}
