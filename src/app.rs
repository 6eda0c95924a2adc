use std::net::SocketAddr;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{auth, reliefs};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_status))
        .nest(
            "/api/v1",
            Router::new()
                .route("/", get(|| async { "Server is running.." }))
                .merge(auth::router())
                .merge(reliefs::router(&state)),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

async fn root_status() -> Json<Value> {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    Json(json!({
        "message": "Server is running smoothly",
        "timestamp": timestamp,
    }))
}

pub async fn serve(app: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use tower::ServiceExt;

    use super::*;
    use crate::auth::repo::memory::{DownUserStore, MemoryUserStore};
    use crate::auth::repo::UserStore;
    use crate::config::{AppConfig, HashConfig, JwtConfig};
    use crate::reliefs::repo::memory::{DownReliefStore, MemoryReliefStore};
    use crate::reliefs::repo::ReliefStore;

    fn test_config(require_auth_for_writes: bool) -> Arc<AppConfig> {
        Arc::new(AppConfig {
            database_url: "postgres://unused".into(),
            db_max_connections: 1,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                expires_in: Duration::from_secs(3600),
            },
            hash: HashConfig {
                memory_kib: 8,
                iterations: 1,
            },
            host: "127.0.0.1".into(),
            port: 0,
            require_auth_for_writes,
        })
    }

    fn app_with(
        users: Arc<dyn UserStore>,
        reliefs: Arc<dyn ReliefStore>,
        require_auth_for_writes: bool,
    ) -> Router {
        let state = AppState::from_parts(test_config(require_auth_for_writes), users, reliefs)
            .expect("state");
        build_app(state)
    }

    fn app() -> (Router, Arc<MemoryUserStore>, Arc<MemoryReliefStore>) {
        let users = Arc::new(MemoryUserStore::default());
        let reliefs = Arc::new(MemoryReliefStore::default());
        (app_with(users.clone(), reliefs.clone(), false), users, reliefs)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Response {
        send_with_token(app, method, uri, body, None).await
    }

    async fn send_with_token(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(v) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        app.clone().oneshot(req).await.unwrap()
    }

    async fn bytes(res: Response) -> Vec<u8> {
        axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn json_body(res: Response) -> Value {
        serde_json::from_slice(&bytes(res).await).unwrap()
    }

    async fn register(app: &Router, email: &str, password: &str) -> Response {
        send(
            app,
            Method::POST,
            "/api/v1/register",
            Some(json!({ "name": "A", "email": email, "password": password })),
        )
        .await
    }

    async fn login(app: &Router, email: &str, password: &str) -> Response {
        send(
            app,
            Method::POST,
            "/api/v1/login",
            Some(json!({ "email": email, "password": password })),
        )
        .await
    }

    #[tokio::test]
    async fn register_then_login_flow() {
        let (app, _, _) = app();

        let res = register(&app, "a@x.com", "pw").await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body = json_body(res).await;
        assert_eq!(body["success"], true);
        assert!(body.get("token").is_none());

        let res = login(&app, "a@x.com", "pw").await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["email"], "a@x.com");
        assert!(!body["token"].as_str().unwrap().is_empty());

        let res = login(&app, "a@x.com", "wrong").await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let (app, users, _) = app();
        assert_eq!(register(&app, "a@x.com", "pw").await.status(), StatusCode::CREATED);

        let res = register(&app, "a@x.com", "pw2").await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(res).await,
            json!({ "success": false, "message": "User already exists" })
        );
        assert_eq!(users.len(), 1);
    }

    #[tokio::test]
    async fn login_failures_are_byte_identical() {
        let (app, _, _) = app();
        register(&app, "a@x.com", "pw").await;

        let wrong_pw = login(&app, "a@x.com", "nope").await;
        let unknown = login(&app, "ghost@x.com", "pw").await;
        assert_eq!(wrong_pw.status(), unknown.status());
        let a = bytes(wrong_pw).await;
        let b = bytes(unknown).await;
        assert_eq!(a, b);
        assert_eq!(
            serde_json::from_slice::<Value>(&a).unwrap(),
            json!({ "message": "Invalid email or password" })
        );
    }

    #[tokio::test]
    async fn missing_fields_are_malformed() {
        let (app, users, _) = app();
        let res = send(
            &app,
            Method::POST,
            "/api/v1/register",
            Some(json!({ "email": "a@x.com" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["success"], false);

        let res = send(
            &app,
            Method::POST,
            "/api/v1/login",
            Some(json!({ "email": "", "password": "pw" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(users.len(), 0);
    }

    #[tokio::test]
    async fn store_outage_is_503() {
        let app = app_with(Arc::new(DownUserStore), Arc::new(DownReliefStore), false);
        let res = login(&app, "a@x.com", "pw").await;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        let res = send(&app, Method::GET, "/api/v1/relief-goods", None).await;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn status_routes() {
        let (app, _, _) = app();
        let res = send(&app, Method::GET, "/api/v1", None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(bytes(res).await, b"Server is running..");

        let res = send(&app, Method::GET, "/", None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["message"], "Server is running smoothly");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn relief_goods_crud() {
        let (app, _, reliefs) = app();

        let res = send(
            &app,
            Method::POST,
            "/api/v1/relief-goods",
            Some(json!({
                "title": "Rice",
                "categori": "Food",
                "amount": 50,
                "image": "https://img/rice.png",
                "description": "50kg bags"
            })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let ack = json_body(res).await;
        assert_eq!(ack["acknowledged"], true);
        let id = ack["insertedId"].as_str().unwrap().to_string();

        let res = send(&app, Method::GET, &format!("/api/v1/relief-goods/{id}"), None).await;
        let item = json_body(res).await;
        assert_eq!(item["_id"], id);
        assert_eq!(item["categori"], "Food");
        assert_eq!(item["amount"], 50);

        let res = send(
            &app,
            Method::PUT,
            &format!("/api/v1/relief-goods/{id}"),
            Some(json!({ "amount": 40 })),
        )
        .await;
        let ack = json_body(res).await;
        assert_eq!(ack["matchedCount"], 1);
        assert_eq!(ack["modifiedCount"], 1);
        assert_eq!(ack["upsertedCount"], 0);

        let res = send(&app, Method::GET, &format!("/api/v1/relief-goods/{id}"), None).await;
        let item = json_body(res).await;
        // PUT replaces the whole payload; fields it omits come back null
        assert_eq!(item["amount"], 40);
        assert_eq!(item["title"], Value::Null);
        assert_eq!(item["categori"], Value::Null);

        let res = send(&app, Method::DELETE, &format!("/api/v1/relief-goods/{id}"), None).await;
        assert_eq!(json_body(res).await["deletedCount"], 1);
        assert_eq!(reliefs.len(), 0);

        let res = send(&app, Method::GET, &format!("/api/v1/relief-goods/{id}"), None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await, Value::Null);
    }

    #[tokio::test]
    async fn put_on_missing_id_upserts() {
        let (app, _, reliefs) = app();
        let id = uuid::Uuid::new_v4();
        let res = send(
            &app,
            Method::PUT,
            &format!("/api/v1/relief-goods/{id}"),
            Some(json!({ "title": "Blankets" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let ack = json_body(res).await;
        assert_eq!(ack["upsertedCount"], 1);
        assert_eq!(ack["upsertedId"], id.to_string());
        assert_eq!(reliefs.len(), 1);
    }

    #[tokio::test]
    async fn teaser_listing_caps_at_six() {
        let (app, _, _) = app();
        for i in 0..8 {
            send(
                &app,
                Method::POST,
                "/api/v1/relief-goods",
                Some(json!({ "title": format!("item {i}") })),
            )
            .await;
        }
        let teaser = json_body(send(&app, Method::GET, "/api/v1/reliefs", None).await).await;
        assert_eq!(teaser.as_array().unwrap().len(), 6);
        assert_eq!(teaser[0]["title"], "item 0");

        let all = json_body(send(&app, Method::GET, "/api/v1/relief-goods", None).await).await;
        assert_eq!(all.as_array().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn malformed_item_id_is_bad_request() {
        let (app, _, _) = app();
        let res = send(&app, Method::GET, "/api/v1/relief-goods/not-an-id", None).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["success"], false);
    }

    #[tokio::test]
    async fn writes_open_by_default() {
        let (app, _, _) = app();
        let res = send(
            &app,
            Method::POST,
            "/api/v1/relief-goods",
            Some(json!({ "title": "Water" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn guarded_writes_need_a_login_token() {
        let users = Arc::new(MemoryUserStore::default());
        let reliefs = Arc::new(MemoryReliefStore::default());
        let app = app_with(users, reliefs.clone(), true);

        let item = json!({ "title": "Water" });
        let res = send(&app, Method::POST, "/api/v1/relief-goods", Some(item.clone())).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            json_body(res).await,
            json!({ "success": false, "message": "Invalid or expired token" })
        );

        let res = send_with_token(
            &app,
            Method::POST,
            "/api/v1/relief-goods",
            Some(item.clone()),
            Some("garbage"),
        )
        .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(reliefs.len(), 0);

        register(&app, "a@x.com", "pw").await;
        let token = json_body(login(&app, "a@x.com", "pw").await).await["token"]
            .as_str()
            .unwrap()
            .to_string();

        let res = send_with_token(
            &app,
            Method::POST,
            "/api/v1/relief-goods",
            Some(item),
            Some(&token),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(reliefs.len(), 1);

        // reads stay public
        let res = send(&app, Method::GET, "/api/v1/relief-goods", None).await;
        assert_eq!(res.status(), StatusCode::OK);
    }
}
