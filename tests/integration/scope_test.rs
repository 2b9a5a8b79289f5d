//! Integration tests for hook visibility across merged instances.

mod helpers;

use futures::future::ready;
use serde_json::Value;

use trellis_plugin::prelude::*;

use helpers::{CallLog, TestApp};

/// Derive hook that records `label` and contributes `key = true`.
fn marker(log: &CallLog, label: &'static str, key: &'static str) -> HookFn {
    let log = log.clone();
    HookFn::derive(move |_: &Context| {
        log.push(label);
        ready(Ok(Derived::new().with_value(key, true)))
    })
}

/// Handler replying with the sorted list of boolean markers present.
fn keys_handler(ctx: &Context) -> futures::future::Ready<AppResult<String>> {
    let mut keys: Vec<&str> = ctx
        .keys()
        .filter(|key| matches!(ctx.get(key).and_then(ContextValue::as_value), Some(Value::Bool(true))))
        .collect();
    keys.sort_unstable();
    ready(Ok(keys.join(",")))
}

#[tokio::test]
async fn test_local_hook_invisible_outside_declaring_instance() {
    let log = CallLog::new();
    let child = Instance::named("child")
        .register_hooks(HookOptions::scope(Scope::Local), [marker(&log, "child", "local")])
        .get("/child", keys_handler);
    let sibling = Instance::named("sibling").get("/sibling", keys_handler);

    let app = TestApp::new(
        Instance::new()
            .use_plugin(child)
            .use_plugin(sibling)
            .get("/root", keys_handler),
    );

    assert_eq!(app.get("/child").await.text, "local");
    assert_eq!(app.get("/sibling").await.text, "");
    assert_eq!(app.get("/root").await.text, "");
    assert_eq!(log.entries(), vec!["child"]);
}

#[tokio::test]
async fn test_scoped_hook_reaches_parent_only() {
    let log = CallLog::new();
    let child = Instance::named("child")
        .register_hooks(HookOptions::scope(Scope::Scoped), [marker(&log, "child", "scoped")])
        .get("/child", keys_handler);
    let parent = Instance::named("parent").use_plugin(child).get("/parent", keys_handler);
    let app = TestApp::new(Instance::new().use_plugin(parent).get("/grandparent", keys_handler));

    assert_eq!(app.get("/child").await.text, "scoped");
    assert_eq!(app.get("/parent").await.text, "scoped");
    assert_eq!(app.get("/grandparent").await.text, "");
}

#[tokio::test]
async fn test_global_hook_reaches_every_ancestor() {
    let log = CallLog::new();
    let mut level = Instance::named("level-0")
        .register_hooks(HookOptions::scope(Scope::Global), [marker(&log, "origin", "global")])
        .get("/level-0", keys_handler);

    for depth in 1..=4 {
        level = Instance::named(format!("level-{depth}"))
            .use_plugin(level)
            .get(format!("/level-{depth}"), keys_handler);
    }

    let app = TestApp::new(Instance::new().use_plugin(level).get("/root", keys_handler));
    for path in ["/level-0", "/level-1", "/level-2", "/level-3", "/level-4", "/root"] {
        assert_eq!(app.get(path).await.text, "global", "route {path}");
    }
}

#[tokio::test]
async fn test_parent_hooks_run_before_inherited_hooks_in_registration_order() {
    let log = CallLog::new();
    let child = Instance::named("child").register_hooks(
        HookOptions::scope(Scope::Global),
        [marker(&log, "child-1", "c1"), marker(&log, "child-2", "c2")],
    );

    let app = TestApp::new(
        Instance::new()
            .register_hooks(HookOptions::default(), [marker(&log, "root-1", "r1")])
            .register_hooks(HookOptions::default(), [marker(&log, "root-2", "r2")])
            .use_plugin(child)
            .get("/", keys_handler),
    );

    assert_eq!(app.get("/").await.text, "c1,c2,r1,r2");
    assert_eq!(log.entries(), vec!["root-1", "root-2", "child-1", "child-2"]);
}

#[tokio::test]
async fn test_collection_registration_matches_individual_registration() {
    let batched_log = CallLog::new();
    let batched = TestApp::new(
        Instance::new()
            .register_hooks(
                HookOptions::default(),
                [
                    marker(&batched_log, "a", "a"),
                    marker(&batched_log, "b", "b"),
                    marker(&batched_log, "c", "c"),
                ],
            )
            .get("/", keys_handler),
    );

    let single_log = CallLog::new();
    let single = TestApp::new(
        Instance::new()
            .register_hooks(HookOptions::default(), [marker(&single_log, "a", "a")])
            .register_hooks(HookOptions::default(), [marker(&single_log, "b", "b")])
            .register_hooks(HookOptions::default(), [marker(&single_log, "c", "c")])
            .get("/", keys_handler),
    );

    batched.get("/").await;
    single.get("/").await;
    assert_eq!(batched_log.entries(), single_log.entries());
    assert_eq!(batched_log.entries(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_store_mutation_visible_to_later_request() {
    let app = TestApp::new(
        Instance::new()
            .state("hits", 0)
            .on_before_handle(|ctx: &Context| ready(ctx.store().increment("hits", 1).map(|_| None)))
            .get("/", |ctx: &Context| ready(Ok(ctx.store().get_i64("hits").unwrap_or_default()))),
    );

    assert_eq!(app.get("/").await.text, "1");
    assert_eq!(app.get("/").await.text, "2");
}

#[tokio::test]
async fn test_plugin_store_shared_with_parent_routes() {
    let plugin = Instance::named("counter")
        .state("count", 0)
        .post("/count", |ctx: &Context| ready(ctx.store().increment("count", 1)));

    let app = TestApp::new(
        Instance::new()
            .use_plugin(plugin)
            .get("/count", |ctx: &Context| ready(Ok(ctx.store().get_i64("count").unwrap_or(-1)))),
    );

    app.request("POST", "/count", &[]).await;
    app.request("POST", "/count", &[]).await;
    assert_eq!(app.get("/count").await.text, "2");
}

#[tokio::test]
async fn test_independent_instances_do_not_share_context_or_store() {
    let build = |label: &'static str| {
        Instance::new()
            .state("visits", 0)
            .derive_with(HookOptions::scope(Scope::Local), move |_: &Context| {
                ready(Ok(Derived::new().with_value(label, true)))
            })
            .get("/", |ctx: &Context| {
                let visits = ctx.store().increment("visits", 1).unwrap_or_default();
                let keys: Vec<&str> = ctx.keys().collect();
                ready(Ok(format!("{}:{visits}", keys.join(","))))
            })
    };

    let first = TestApp::new(build("first"));
    let second = TestApp::new(build("second"));

    let (a, b) = futures::join!(first.get("/"), second.get("/"));
    assert_eq!(a.text, "first:1");
    assert_eq!(b.text, "second:1");
    assert_eq!(first.get("/").await.text, "first:2");
}

#[tokio::test]
async fn test_default_scope_from_config() {
    let log = CallLog::new();
    let child = Instance::with_options(InstanceOptions {
        name: Some("child".into()),
        default_scope: Scope::Scoped,
    })
    .register_hooks(HookOptions::default(), [marker(&log, "child", "scoped")]);
    let parent = Instance::named("parent").use_plugin(child).get("/parent", keys_handler);
    let app = TestApp::new(Instance::new().use_plugin(parent).get("/root", keys_handler));

    assert_eq!(app.get("/parent").await.text, "scoped");
    assert_eq!(app.get("/root").await.text, "");
}
