//! Integration tests for the request lifecycle: short-circuits, rewrites,
//! error handling, timeouts and plugin deduplication.

mod helpers;

use std::time::Duration;

use axum::http::StatusCode;
use futures::future::ready;
use serde_json::json;

use trellis_core::config::AppConfig;
use trellis_plugin::prelude::*;

use helpers::{CallLog, TestApp};

#[tokio::test]
async fn test_before_handle_short_circuit_skips_handler() {
    let log = CallLog::new();
    let handler_log = log.clone();

    let app = TestApp::new(
        Instance::new()
            .on_before_handle(|ctx: &Context| {
                let reply = match ctx.header("authorization") {
                    Some(_) => None,
                    None => Some(Reply::text("unauthorized").with_status(StatusCode::UNAUTHORIZED)),
                };
                ready(Ok(reply))
            })
            .get("/secret", move |_: &Context| {
                handler_log.push("handler");
                ready(Ok("secret"))
            }),
    );

    let denied = app.get("/secret").await;
    assert_eq!(denied.status, StatusCode::UNAUTHORIZED);
    assert_eq!(denied.text, "unauthorized");
    assert!(log.entries().is_empty());

    let allowed = app.request("GET", "/secret", &[("authorization", "token")]).await;
    assert_eq!(allowed.status, StatusCode::OK);
    assert_eq!(log.entries(), vec!["handler"]);
}

#[tokio::test]
async fn test_after_handle_rewrites_reply() {
    let app = TestApp::new(
        Instance::new()
            .on_after_handle(|_: &Context, reply: &Reply| {
                let wrapped = json!({ "data": reply.body_text().unwrap_or_default() });
                ready(Ok(Some(Reply::json(wrapped).with_header("x-wrapped", "1"))))
            })
            .get("/", |_: &Context| ready(Ok("payload"))),
    );

    let response = app.get("/").await;
    assert_eq!(response.body, json!({ "data": "payload" }));
}

#[tokio::test]
async fn test_failing_hook_fails_only_its_request() {
    let app = TestApp::new(
        Instance::new()
            .derive(|ctx: &Context| {
                let result = match ctx.header("explode") {
                    Some(_) => Err(AppError::hook("derive exploded")),
                    None => Ok(Derived::new().with_value("ok", true)),
                };
                ready(result)
            })
            .get("/", |ctx: &Context| ready(ctx.value("ok").cloned())),
    );

    let (failed, fine) = futures::join!(
        app.request("GET", "/", &[("explode", "yes")]),
        app.get("/")
    );
    assert_eq!(failed.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(failed.body["error"], "HOOK");
    assert_eq!(failed.body["message"], "derive exploded");
    assert_eq!(fine.status, StatusCode::OK);
    assert_eq!(fine.text, "true");
}

#[tokio::test]
async fn test_error_hook_follows_scope_rules() {
    let plugin = Instance::named("errors")
        .on_error_with(HookOptions::scope(Scope::Local), |_: &Context, err: &AppError| {
            ready(Some(Reply::text(format!("handled: {}", err.message)).with_status(StatusCode::BAD_GATEWAY)))
        })
        .get("/plugin", |_: &Context| ready(Err::<&str, _>(AppError::internal("upstream down"))));

    let app = TestApp::new(
        Instance::new()
            .use_plugin(plugin)
            .get("/root", |_: &Context| ready(Err::<&str, _>(AppError::internal("root down")))),
    );

    let plugin_response = app.get("/plugin").await;
    assert_eq!(plugin_response.status, StatusCode::BAD_GATEWAY);
    assert_eq!(plugin_response.text, "handled: upstream down");

    let root_response = app.get("/root").await;
    assert_eq!(root_response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(root_response.body["error"], "INTERNAL");
}

#[tokio::test]
async fn test_response_hook_observes_short_circuit_reply() {
    let log = CallLog::new();
    let observer = log.clone();

    let app = TestApp::new(
        Instance::new()
            .on_before_handle(|_: &Context| ready(Ok(Some(Reply::text("cached")))))
            .on_response(move |ctx: &Context, reply: &Reply| {
                observer.push(format!("{} {}", ctx.path(), reply.status.as_u16()));
                ready(Ok(()))
            })
            .get("/", |_: &Context| ready(Ok("fresh"))),
    );

    assert_eq!(app.get("/").await.text, "cached");
    assert_eq!(log.entries(), vec!["/ 200"]);
}

#[tokio::test]
async fn test_slow_hook_times_out() {
    let config = AppConfig::from_toml(
        r#"
        [pipeline]
        hook_timeout_ms = 20
        "#,
    )
    .expect("test config");

    let app = TestApp::with_config(
        Instance::new()
            .derive(|_: &Context| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, AppError>(Derived::new())
            })
            .get("/", |_: &Context| ready(Ok("ok"))),
        config,
    );

    let response = app.get("/").await;
    assert_eq!(response.status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(response.body["error"], "TIMEOUT");
}

#[tokio::test]
async fn test_timeout_keeps_store_mutations_of_completed_hooks() {
    let config = AppConfig::from_toml(
        r#"
        [pipeline]
        hook_timeout_ms = 20
        "#,
    )
    .expect("test config");
    let log = CallLog::new();
    let handler_log = log.clone();

    let app = TestApp::with_config(
        Instance::new()
            .state("hits", 0)
            .derive(|ctx: &Context| ready(ctx.store().increment("hits", 1).map(|_| Derived::new())))
            .derive(|ctx: &Context| {
                let slow = ctx.header("slow").is_some();
                async move {
                    if slow {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                    Ok::<_, AppError>(Derived::new())
                }
            })
            .get("/", move |ctx: &Context| {
                handler_log.push("handler");
                ready(Ok(ctx.store().get_i64("hits").unwrap_or_default()))
            }),
        config,
    );

    let timed_out = app.request("GET", "/", &[("slow", "1")]).await;
    assert_eq!(timed_out.status, StatusCode::GATEWAY_TIMEOUT);
    assert!(log.entries().is_empty());

    let next = app.get("/").await;
    assert_eq!(next.status, StatusCode::OK);
    assert_eq!(next.text, "2");
}

#[tokio::test]
async fn test_after_handle_failure_reaches_error_hook() {
    let log = CallLog::new();
    let observer = log.clone();

    let app = TestApp::new(
        Instance::new()
            .on_after_handle(|_: &Context, _: &Reply| ready(Err::<Option<Reply>, _>(AppError::hook("wrap failed"))))
            .on_after_handle(move |_: &Context, _: &Reply| {
                observer.push("second after-handle");
                ready(Ok(None))
            })
            .on_error(|_: &Context, err: &AppError| {
                ready(Some(Reply::text(format!("recovered: {}", err.message)).with_status(StatusCode::SERVICE_UNAVAILABLE)))
            })
            .get("/", |_: &Context| ready(Ok("payload"))),
    );

    let response = app.get("/").await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.text, "recovered: wrap failed");
    assert!(log.entries().is_empty());
}

#[tokio::test]
async fn test_server_error_messages_can_be_hidden() {
    let mut config = AppConfig::default();
    config.pipeline.expose_error_messages = false;

    let app = TestApp::with_config(
        Instance::new()
            .get("/", |_: &Context| ready(Err::<&str, _>(AppError::internal("connection string leaked")))),
        config,
    );

    let response = app.get("/").await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["message"], "Internal server error");
}

#[tokio::test]
async fn test_named_plugin_applied_once() {
    let log = CallLog::new();
    let plugin = |log: &CallLog| {
        let log = log.clone();
        Instance::named("audit").derive(move |_: &Context| {
            log.push("audit");
            ready(Ok(Derived::new()))
        })
    };

    let app = TestApp::new(
        Instance::new()
            .use_plugin(plugin(&log))
            .use_plugin(plugin(&log))
            .get("/", |_: &Context| ready(Ok("ok"))),
    );

    app.get("/").await;
    assert_eq!(log.entries(), vec!["audit"]);
}

#[tokio::test]
async fn test_struct_plugin_installs_hooks_and_routes() {
    struct Health;

    impl Plugin for Health {
        fn name(&self) -> &str {
            "health"
        }

        fn install(&self, instance: Instance) -> Instance {
            instance
                .decorate("status", "up")
                .get("/health", |ctx: &Context| ready(ctx.value("status").cloned()))
        }
    }

    let app = TestApp::new(Instance::new().install(&Health).install(&Health));
    let response = app.get("/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.text, "up");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = TestApp::new(Instance::new().get("/", |_: &Context| ready(Ok("ok"))));
    let response = app.get("/nope").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["error"], "NOT_FOUND");
}

#[test]
fn test_conflicting_routes_fail_at_build() {
    let plugin = Instance::named("users").get("/users/:id", |_: &Context| ready(Ok("plugin")));
    let err = Instance::new()
        .use_plugin(plugin)
        .get("/users/:name", |_: &Context| ready(Ok("root")))
        .build()
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
}
