//! End-to-end tests for pipeline execution.

#[cfg(test)]
mod tests {
    use crate::context::InvocationContext;
    use crate::errors::{EngineError, StepError};
    use crate::event::PlatformResponse;
    use crate::registry::{PluginRegistry, PluginSelector};
    use crate::runner::{Handler, PipelineConfig};
    use crate::steps::{FnStep, Step};
    use crate::testing::{sample_context, sample_event};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    async fn invoke(handler: &Handler) -> PlatformResponse {
        handler
            .run(sample_event(), sample_context())
            .await
            .expect("invocation should produce a response")
    }

    fn joined_stack(ctx: &InvocationContext) -> String {
        match ctx.req().get("stack") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(","),
            _ => String::new(),
        }
    }

    fn stack_handler() -> Handler {
        Handler::sync(|ctx| {
            ctx.req().push("stack", json!("Finally"));
            ctx.res().send(joined_stack(ctx));
            Ok(Value::Null)
        })
    }

    fn delayed_push(delay_ms: u64, label: &'static str) -> Step {
        Step::future(move |ctx| async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            ctx.req().push("stack", json!(label));
            Ok(Value::Null)
        })
    }

    /// Registry with the three plugins the filter tests select between:
    /// `one` (async), `two` (a parallel pair), `three` (sync).
    fn stack_registry() -> Arc<PluginRegistry> {
        let registry = PluginRegistry::new();
        registry.register("one", delayed_push(50, "First"));
        registry.register(
            "two",
            Step::group(vec![delayed_push(100, "Third"), delayed_push(50, "Second")]),
        );
        registry.register(
            "three",
            Step::sync(|ctx| {
                ctx.req().push("stack", json!("Fourth"));
                Ok(Value::Null)
            }),
        );
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_json_response_round_trip() {
        let handler = Handler::sync(|ctx| {
            ctx.res().json_status(200, &json!({"works": true}));
            Ok(Value::Null)
        });
        let response = invoke(&handler).await;

        assert_eq!(response.status_code, 200);
        assert_eq!(response.headers["Content-Type"], "application/json");
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["works"], json!(true));
    }

    #[tokio::test]
    async fn test_async_terminal_handler() {
        let handler = Handler::future(|ctx| async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            ctx.res().send("async main");
            Ok(Value::Null)
        });

        let response = invoke(&handler).await;
        assert_eq!(response.body, "async main");
    }

    #[tokio::test]
    async fn test_sequential_steps_apply_in_order() {
        let handler = stack_handler()
            .before(Step::merge(json!({"stack": []})))
            .before(delayed_push(50, "First"))
            .before(Step::sync(|ctx| {
                ctx.req().push("stack", json!("Second"));
                Ok(Value::Null)
            }));

        let response = invoke(&handler).await;
        assert_eq!(response.body, "First,Second,Finally");
    }

    #[tokio::test]
    async fn test_parallel_group_is_one_position_with_deterministic_effects() {
        let handler = stack_handler()
            .before(Step::merge(json!({"stack": []})))
            .before(delayed_push(50, "First"))
            .before(Step::group(vec![
                delayed_push(100, "Third"),
                delayed_push(50, "Second"),
            ]))
            .before(Step::sync(|ctx| {
                ctx.req().push("stack", json!("Fourth"));
                Ok(Value::Null)
            }));

        let response = invoke(&handler).await;
        assert_eq!(response.body, "First,Second,Third,Fourth,Finally");
    }

    #[tokio::test]
    async fn test_end_short_circuits_remaining_steps_and_handler() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_main = ran.clone();
        let ran_later = Arc::new(AtomicBool::new(false));
        let ran_later_step = ran_later.clone();

        let handler = Handler::sync(move |_ctx| {
            ran_main.store(true, Ordering::SeqCst);
            Ok(Value::Null)
        })
        .before(Step::sync(|ctx| {
            ctx.res().end();
            Ok(Value::Null)
        }))
        .before(Step::sync(move |_ctx| {
            ran_later_step.store(true, Ordering::SeqCst);
            Ok(Value::Null)
        }));

        let response = invoke(&handler).await;
        assert!(!ran.load(Ordering::SeqCst));
        assert!(!ran_later.load(Ordering::SeqCst));
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, "");
        assert_eq!(response.headers["Content-Type"], "text/plain");
    }

    #[tokio::test]
    async fn test_failing_before_routes_to_catch_and_stops_pipeline() {
        let continued = Arc::new(AtomicBool::new(false));
        let continued_step = continued.clone();
        let continued_main = continued.clone();

        let handler = Handler::sync(move |_ctx| {
            continued_main.store(true, Ordering::SeqCst);
            Ok(Value::Null)
        })
        .before(Step::sync(|_ctx| Err(StepError::new("AN ERROR"))))
        .before(Step::sync(move |_ctx| {
            continued_step.store(true, Ordering::SeqCst);
            Ok(Value::Null)
        }))
        .catch_sync(|errors, ctx| {
            ctx.res().send_status(400, errors[0].message.clone());
        });

        let response = invoke(&handler).await;
        assert_eq!(response.status_code, 400);
        assert_eq!(response.body, "AN ERROR");
        assert!(!continued.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_default_responder_emits_400_json() {
        let handler =
            Handler::sync(|_ctx| Err(anyhow::anyhow!("undefined variable").into()));

        let response = invoke(&handler).await;
        assert_eq!(response.status_code, 400);
        assert_eq!(response.headers["Content-Type"], "application/json");
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert!(body["message"].is_string());
        assert!(body["stack"].is_string());
    }

    #[tokio::test]
    async fn test_terminal_handler_failure_is_routed_like_a_step_failure() {
        let handler = Handler::sync(|_ctx| Err(StepError::new("main failed")))
            .catch_sync(|errors, ctx| {
                ctx.res().send_status(400, errors[0].message.clone());
            });

        let response = invoke(&handler).await;
        assert_eq!(response.body, "main failed");
    }

    #[tokio::test]
    async fn test_finally_receives_handler_return_value() {
        let seen = Arc::new(parking_lot::Mutex::new(None));

        let seen_hook = seen.clone();
        let handler = Handler::sync(|ctx| {
            ctx.res().json(&json!({"works": true}));
            Ok(json!("works"))
        })
        .finally_with(move |value| {
            *seen_hook.lock() = Some(value);
            Ok(())
        });

        invoke(&handler).await;
        assert_eq!(seen.lock().clone(), Some(json!("works")));
    }

    #[tokio::test]
    async fn test_finally_receives_handler_return_value_with_befores() {
        let seen = Arc::new(parking_lot::Mutex::new(None));

        let seen_hook = seen.clone();
        let handler = Handler::sync(|ctx| {
            ctx.res().json(&json!({"works": true}));
            Ok(json!("works"))
        })
        .before(Step::sync(|ctx| {
            ctx.req().set("test", json!(true));
            Ok(Value::Null)
        }))
        .finally_with(move |value| {
            *seen_hook.lock() = Some(value);
            Ok(())
        });

        invoke(&handler).await;
        assert_eq!(seen.lock().clone(), Some(json!("works")));
    }

    #[tokio::test]
    async fn test_finally_runs_with_null_on_failure_path() {
        let seen = Arc::new(parking_lot::Mutex::new(None));

        let seen_hook = seen.clone();
        let handler = Handler::sync(|_ctx| Err(StepError::new("boom"))).finally_with(
            move |value| {
                *seen_hook.lock() = Some(value);
                Ok(())
            },
        );

        let response = invoke(&handler).await;
        assert_eq!(response.status_code, 400);
        assert_eq!(seen.lock().clone(), Some(Value::Null));
    }

    #[tokio::test]
    async fn test_failing_finally_never_disturbs_the_response() {
        let handler = Handler::sync(|ctx| {
            ctx.res().json(&json!({"works": true}));
            Ok(Value::Null)
        })
        .finally_with(|_value| Err(anyhow::anyhow!("hook exploded")));

        let response = invoke(&handler).await;
        assert_eq!(response.status_code, 200);
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["works"], json!(true));
    }

    #[tokio::test]
    async fn test_double_emission_keeps_first_response() {
        let handler = Handler::sync(|ctx| {
            ctx.res().send("first");
            ctx.res().send("second");
            ctx.res().json(&json!("third"));
            Ok(Value::Null)
        });

        let response = invoke(&handler).await;
        assert_eq!(response.body, "first");
    }

    #[tokio::test]
    async fn test_registry_filter_includes_in_filter_order() {
        let handler = stack_handler().registry(stack_registry()).plugins([
            PluginSelector::name("one"),
            PluginSelector::name("two"),
        ]);

        let response = invoke(&handler).await;
        assert_eq!(response.body, "First,Second,Third,Finally");
    }

    #[tokio::test]
    async fn test_registry_excludes_apply_without_filter() {
        let handler = stack_handler()
            .registry(stack_registry())
            .exclude_plugins(["two"]);

        let response = invoke(&handler).await;
        assert_eq!(response.body, "First,Fourth,Finally");
    }

    #[tokio::test]
    async fn test_registry_all_mode_runs_everything_in_registration_order() {
        let handler = stack_handler().registry(stack_registry());

        let response = invoke(&handler).await;
        assert_eq!(response.body, "First,Second,Third,Fourth,Finally");
    }

    #[tokio::test]
    async fn test_keep_warm_probe_skips_steps_catch_and_finally() {
        let touched = Arc::new(AtomicBool::new(false));

        let touched_step = touched.clone();
        let touched_finally = touched.clone();
        let handler = Handler::sync(|ctx| {
            ctx.res().send("real work");
            Ok(Value::Null)
        })
        .before(Step::sync(move |_ctx| {
            touched_step.store(true, Ordering::SeqCst);
            Ok(Value::Null)
        }))
        .finally_with(move |_value| {
            touched_finally.store(true, Ordering::SeqCst);
            Ok(())
        });

        let mut event = sample_event();
        event.keep_warm = true;
        let response = handler.run(event, sample_context()).await.unwrap();

        assert!(!touched.load(Ordering::SeqCst));
        assert!(response.body.contains("keepingWarm"));
    }

    #[tokio::test]
    async fn test_merge_step_unions_into_req_and_res() {
        let handler = Handler::sync(|ctx| {
            let parts = [
                ctx.req().get("m1"),
                ctx.res().fields().get("m1"),
                ctx.req().get("m2"),
                ctx.res().fields().get("m2"),
            ];
            let body: String = parts
                .iter()
                .filter_map(|part| part.as_ref().and_then(Value::as_str))
                .collect();
            ctx.res().send(body);
            Ok(Value::Null)
        })
        .before(Step::sync(|ctx| {
            ctx.req().set("m1", json!("req1"));
            ctx.res().fields().set("m1", json!("res1"));
            Ok(Value::Null)
        }))
        .before(Step::merge(
            json!({"req": {"m2": "req2"}, "res": {"m2": "res2"}}),
        ));

        let response = invoke(&handler).await;
        assert_eq!(response.body, "req1res1req2res2");
    }

    #[tokio::test]
    async fn test_step_resolved_patch_shape_is_merged() {
        let handler = Handler::sync(|ctx| {
            ctx.res().send(ctx.req().get("injected").map_or_else(
                || "missing".to_string(),
                |value| value.to_string(),
            ));
            Ok(Value::Null)
        })
        .before(Step::sync(|_ctx| Ok(json!({"req": {"injected": true}}))));

        let response = invoke(&handler).await;
        assert_eq!(response.body, "true");
    }

    #[tokio::test]
    async fn test_parallel_sibling_failure_does_not_cancel_members() {
        let sibling_ran = Arc::new(AtomicBool::new(false));

        let sibling_flag = sibling_ran.clone();
        let handler = Handler::sync(|ctx| {
            ctx.res().send("should not run");
            Ok(Value::Null)
        })
        .before(Step::group(vec![
            Step::sync(|_ctx| Err(StepError::new("member failed"))),
            Step::future(move |ctx| {
                let sibling_flag = sibling_flag.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    sibling_flag.store(true, Ordering::SeqCst);
                    ctx.req().set("sibling", json!(true));
                    Ok(Value::Null)
                }
            }),
        ]))
        .catch_sync(|errors, ctx| {
            let sibling_mutation = ctx.req().get("sibling");
            ctx.res().send_status(
                400,
                format!("{}:{}", errors[0].message, sibling_mutation == Some(json!(true))),
            );
        });

        let response = invoke(&handler).await;
        assert!(sibling_ran.load(Ordering::SeqCst));
        assert_eq!(response.body, "member failed:true");
    }

    #[tokio::test]
    async fn test_event_defaults_merge_over_incoming_event() {
        let handler = Handler::sync(|ctx| {
            let stage = ctx
                .raw()
                .event
                .extra
                .get("stage")
                .and_then(Value::as_str)
                .unwrap_or("missing")
                .to_string();
            let query = ctx.req().get("query").unwrap_or_default();
            ctx.res().send(format!("{stage}:{}", query["query"] == json!("true")));
            Ok(Value::Null)
        })
        .event(json!({"stage": "prod"}));

        let response = invoke(&handler).await;
        assert_eq!(response.body, "prod:true");
    }

    #[tokio::test]
    async fn test_cors_headers_are_injected_before_steps() {
        let handler = Handler::sync(|ctx| {
            ctx.res().send("ok");
            Ok(Value::Null)
        })
        .cors("*");

        let response = invoke(&handler).await;
        assert_eq!(response.headers["Access-Control-Allow-Origin"], "*");
        assert!(response.headers["Access-Control-Allow-Methods"].contains("GET"));
    }

    #[tokio::test]
    async fn test_cors_with_explicit_method_list() {
        let handler = Handler::sync(|ctx| {
            ctx.res().send("ok");
            Ok(Value::Null)
        })
        .cors_with_methods("https://app.example.com", &["get", "post"]);

        let response = invoke(&handler).await;
        assert_eq!(
            response.headers["Access-Control-Allow-Methods"],
            "GET, POST"
        );
    }

    #[tokio::test]
    async fn test_no_steps_fast_path() {
        let handler = Handler::sync(|ctx| {
            ctx.res().send("works");
            Ok(Value::Null)
        });

        let response = invoke(&handler).await;
        assert_eq!(response.body, "works");
    }

    #[tokio::test]
    async fn test_silent_handler_yields_no_response_error() {
        let handler = Handler::sync(|_ctx| Ok(Value::Null));
        let result = handler.run(sample_event(), sample_context()).await;
        assert!(matches!(result, Err(EngineError::NoResponse)));
    }

    #[tokio::test]
    async fn test_debug_mode_wraps_delivered_body() {
        let handler = Handler::sync(|ctx| {
            ctx.res().send("inner");
            Ok(Value::Null)
        })
        .debug();

        let response = invoke(&handler).await;
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["body"], json!("inner"));
        assert_eq!(body["statusCode"], json!(200));
    }

    #[tokio::test]
    async fn test_handler_is_reusable_across_invocations() {
        let handler = stack_handler()
            .before(Step::merge(json!({"stack": []})))
            .before(Step::sync(|ctx| {
                ctx.req().push("stack", json!("First"));
                Ok(Value::Null)
            }));

        let first = invoke(&handler).await;
        let second = invoke(&handler).await;
        assert_eq!(first.body, "First,Finally");
        assert_eq!(second.body, first.body);
    }

    #[tokio::test]
    async fn test_async_catch_handler_trait_object() {
        struct JsonCatch;

        #[async_trait::async_trait]
        impl crate::runner::CatchFn for JsonCatch {
            async fn call(&self, errors: &[StepError], ctx: &InvocationContext) {
                ctx.res()
                    .json_status(400, &json!({"failed": errors.len()}));
            }
        }

        let handler = Handler::sync(|_ctx| Err(StepError::new("boom")))
            .catch_with(Arc::new(JsonCatch));

        let response = invoke(&handler).await;
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["failed"], json!(1));
    }

    #[tokio::test]
    async fn test_config_registers_default_plugins() {
        let config = PipelineConfig::new().plugin(
            "test",
            Step::sync(|ctx| {
                ctx.req().set("global", json!("works"));
                Ok(Value::Null)
            }),
        );
        let terminal = FnStep::new(|ctx: &InvocationContext| {
            let global = ctx
                .req()
                .get("global")
                .and_then(|value| value.as_str().map(String::from))
                .unwrap_or_default();
            ctx.res().send(global);
            Ok(Value::Null)
        });
        let handler = Handler::with_config(config, Arc::new(terminal));

        let response = invoke(&handler).await;
        assert_eq!(response.body, "works");
    }

    #[test]
    fn test_run_blocking_adapter() {
        let handler = Handler::sync(|ctx| {
            ctx.res().send("sync");
            Ok(Value::Null)
        });
        let response = handler
            .run_blocking(sample_event(), sample_context())
            .unwrap();
        assert_eq!(response.body, "sync");
    }

    #[tokio::test]
    async fn test_catch_without_emission_ends_with_empty_response() {
        let handler = Handler::sync(|_ctx| Err(StepError::new("boom")))
            .catch_sync(|_errors, _ctx| {});

        let response = invoke(&handler).await;
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, "");
    }
}
