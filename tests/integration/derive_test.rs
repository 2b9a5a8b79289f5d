//! Integration tests for context derivation and the shared store.

mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::http::StatusCode;
use futures::future::ready;
use serde_json::{Value, json};

use trellis_core::error::AppError;
use trellis_plugin::prelude::*;

use helpers::{CallLog, TestApp};

#[tokio::test]
async fn test_derived_function_is_callable_from_handler() {
    let app = TestApp::new(
        Instance::new()
            .derive(|_: &Context| ready(Ok(Derived::new().with_fn("hi", |_: &[Value]| Ok(json!("hi"))))))
            .get("/", |ctx: &Context| ready(ctx.call("hi", &[]))),
    );

    let response = app.get("/").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.text, "hi");
}

#[tokio::test]
async fn test_functional_plugin_contributes_derive() {
    fn hi_plugin(app: Instance) -> Instance {
        app.derive(|_: &Context| ready(Ok(Derived::new().with_fn("hi", |_: &[Value]| Ok(json!("hi"))))))
    }

    let app = TestApp::new(
        Instance::new()
            .apply(hi_plugin)
            .get("/", |ctx: &Context| ready(ctx.call("hi", &[]))),
    );

    assert_eq!(app.get("/").await.text, "hi");
}

#[tokio::test]
async fn test_derived_function_mutates_store() {
    let app = TestApp::new(
        Instance::new()
            .state("counter", 1)
            .derive(|ctx: &Context| {
                let store = ctx.store().clone();
                ready(Ok(Derived::new().with_fn("increase", move |_: &[Value]| {
                    store.increment("counter", 1).map(Value::from)
                })))
            })
            .get("/", |ctx: &Context| {
                let result = ctx
                    .call("increase", &[])
                    .and_then(|_| ctx.store().get("counter").ok_or_else(|| AppError::context("counter missing")));
                ready(result)
            }),
    );

    assert_eq!(app.get("/").await.text, "2");
}

#[tokio::test]
async fn test_derive_reads_request_header() {
    let app = TestApp::new(
        Instance::new()
            .derive(|ctx: &Context| {
                let name = ctx.header("name").unwrap_or_default().to_string();
                ready(Ok(Derived::new().with_value("name", name)))
            })
            .get("/", |ctx: &Context| ready(ctx.value("name").cloned())),
    );

    let response = app.request("GET", "/", &[("name", "Trellis")]).await;
    assert_eq!(response.text, "Trellis");
}

#[tokio::test]
async fn test_local_derive_runs_only_for_plugin_routes() {
    let called = CallLog::new();
    let recorder = called.clone();

    let plugin = Instance::named("plugin")
        .derive_with(HookOptions::scoped(true), move |ctx: &Context| {
            recorder.push(ctx.path());
            ready(Ok(Derived::new()))
        })
        .get("/inner", |_: &Context| ready(Ok("inner")));

    let app = TestApp::new(
        Instance::new()
            .use_plugin(plugin)
            .get("/outer", |_: &Context| ready(Ok("outer"))),
    );

    let (inner, outer) = futures::join!(app.get("/inner"), app.get("/outer"));
    assert_eq!(inner.text, "inner");
    assert_eq!(outer.text, "outer");
    assert_eq!(called.entries(), vec!["/inner"]);
}

#[tokio::test]
async fn test_global_derive_runs_for_plugin_and_parent_routes() {
    let called = CallLog::new();
    let recorder = called.clone();

    let plugin = Instance::named("plugin")
        .derive_with(HookOptions::scoped(false), move |ctx: &Context| {
            recorder.push(ctx.path());
            ready(Ok(Derived::new()))
        })
        .get("/inner", |_: &Context| ready(Ok("inner")));

    let app = TestApp::new(
        Instance::new()
            .use_plugin(plugin)
            .get("/outer", |_: &Context| ready(Ok("outer"))),
    );

    futures::join!(app.get("/inner"), app.get("/outer"));
    assert_eq!(called.entries(), vec!["/inner", "/outer"]);
}

#[tokio::test]
async fn test_after_handle_collection_runs_every_function() {
    let counter = Arc::new(AtomicUsize::new(0));
    let (first, second) = (counter.clone(), counter.clone());

    let app = TestApp::new(
        Instance::new()
            .register_hooks(
                HookOptions::default(),
                [
                    HookFn::after_handle(move |_: &Context, _: &Reply| {
                        first.fetch_add(1, Ordering::SeqCst);
                        ready(Ok(None))
                    }),
                    HookFn::after_handle(move |_: &Context, _: &Reply| {
                        second.fetch_add(1, Ordering::SeqCst);
                        ready(Ok(None))
                    }),
                ],
            )
            .get("/", |_: &Context| ready(Ok("ok"))),
    );

    app.get("/").await;
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_decorations_reach_plugin_and_parent_routes() {
    let plugin = Instance::named("meta")
        .decorate("version", "1.2.3")
        .get("/plugin", |ctx: &Context| ready(ctx.value("version").cloned()));

    let app = TestApp::new(
        Instance::new()
            .use_plugin(plugin)
            .get("/root", |ctx: &Context| ready(ctx.value("version").cloned())),
    );

    assert_eq!(app.get("/plugin").await.text, "1.2.3");
    assert_eq!(app.get("/root").await.text, "1.2.3");
}

#[tokio::test]
async fn test_missing_context_key_is_an_error() {
    let app = TestApp::new(Instance::new().get("/", |ctx: &Context| ready(ctx.value("absent").cloned())));

    let response = app.get("/").await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["error"], "CONTEXT");
}

#[tokio::test]
async fn test_path_params_visible_to_derive() {
    let app = TestApp::new(
        Instance::new()
            .derive(|ctx: &Context| {
                let id: i64 = ctx.param("id").and_then(|id| id.parse().ok()).unwrap_or_default();
                ready(Ok(Derived::new().with_value("double", id * 2)))
            })
            .get("/items/:id", |ctx: &Context| ready(ctx.value("double").cloned())),
    );

    assert_eq!(app.get("/items/21").await.text, "42");
}
