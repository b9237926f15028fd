//! Tool-call Front-end
//!
//! Maps named tool invocations (`kv_get`, `kv_set`, ...) 1:1 onto engine
//! methods. Arguments arrive as a JSON object; every call produces a JSON
//! result with a `success` flag - validation failures and backend errors
//! come back as `{"success": false, "error": ...}` rather than faults, so
//! callers always receive a structured payload.
//!
//! An optional `username` argument namespaces the call: keys are prefixed
//! with `"{username}:"` before reaching the engine and the prefix is
//! stripped from returned key lists.

use serde_json::{json, Value};
use tracing::debug;

use crate::engine::KvEngine;
use crate::tenant;

/// Tool names this front-end dispatches.
pub const TOOL_NAMES: &[&str] = &[
    "kv_get",
    "kv_set",
    "kv_delete",
    "kv_exists",
    "kv_keys",
    "kv_expire",
    "kv_ttl",
    "kv_incr",
    "kv_decr",
    "kv_append",
    "kv_persist",
    "kv_stats",
    "kv_backup",
    "kv_clear",
];

/// Dispatches one tool invocation to the engine.
pub async fn dispatch(engine: &KvEngine, name: &str, args: &Value) -> Value {
    debug!(tool = name, "dispatching tool call");

    let username = args.get("username").and_then(Value::as_str);

    match name {
        "kv_get" => {
            let Some(key) = key_arg(args) else {
                return missing("key");
            };
            let key = tenant::qualify(username, key);
            match engine.get(&key).await {
                Ok(Some(value)) => json!({"success": true, "found": true, "value": value}),
                Ok(None) => json!({"success": true, "found": false}),
                Err(e) => failure(&e.to_string()),
            }
        }
        "kv_set" => {
            let Some(key) = key_arg(args) else {
                return missing("key");
            };
            let Some(value) = args.get("value") else {
                return missing("value");
            };
            let ttl = args.get("ttl").and_then(Value::as_u64);
            let key = tenant::qualify(username, key);
            match engine.set(&key, value.clone(), ttl).await {
                Ok(()) => json!({"success": true}),
                Err(e) => failure(&e.to_string()),
            }
        }
        "kv_delete" => {
            let Some(key) = key_arg(args) else {
                return missing("key");
            };
            let key = tenant::qualify(username, key);
            match engine.delete(&key).await {
                Ok(deleted) => json!({"success": true, "deleted": deleted}),
                Err(e) => failure(&e.to_string()),
            }
        }
        "kv_exists" => {
            let Some(key) = key_arg(args) else {
                return missing("key");
            };
            let key = tenant::qualify(username, key);
            match engine.exists(&key).await {
                Ok(exists) => json!({"success": true, "exists": exists}),
                Err(e) => failure(&e.to_string()),
            }
        }
        "kv_keys" => {
            let pattern = args.get("pattern").and_then(Value::as_str);
            let qualified = tenant::qualify_pattern(username, pattern);
            match engine.keys(qualified.as_deref()).await {
                Ok(keys) => {
                    let keys = tenant::strip_prefix(username, keys);
                    json!({"success": true, "count": keys.len(), "keys": keys})
                }
                Err(e) => failure(&e.to_string()),
            }
        }
        "kv_expire" => {
            let Some(key) = key_arg(args) else {
                return missing("key");
            };
            let Some(seconds) = args.get("seconds").and_then(Value::as_u64) else {
                return missing("seconds");
            };
            let key = tenant::qualify(username, key);
            match engine.expire(&key, seconds).await {
                Ok(updated) => json!({"success": true, "updated": updated}),
                Err(e) => failure(&e.to_string()),
            }
        }
        "kv_ttl" => {
            let Some(key) = key_arg(args) else {
                return missing("key");
            };
            let key = tenant::qualify(username, key);
            match engine.ttl(&key).await {
                Ok(ttl) => json!({"success": true, "ttl": ttl}),
                Err(e) => failure(&e.to_string()),
            }
        }
        "kv_incr" | "kv_decr" => {
            let Some(key) = key_arg(args) else {
                return missing("key");
            };
            let key = tenant::qualify(username, key);
            let result = if name == "kv_incr" {
                engine.incr(&key).await
            } else {
                engine.decr(&key).await
            };
            match result {
                Ok(value) => json!({"success": true, "value": value}),
                Err(e) => failure(&e.to_string()),
            }
        }
        "kv_append" => {
            let Some(key) = key_arg(args) else {
                return missing("key");
            };
            let Some(suffix) = args.get("string").and_then(Value::as_str) else {
                return missing("string");
            };
            let key = tenant::qualify(username, key);
            match engine.append(&key, suffix).await {
                Ok(length) => json!({"success": true, "length": length}),
                Err(e) => failure(&e.to_string()),
            }
        }
        "kv_persist" => {
            let Some(key) = key_arg(args) else {
                return missing("key");
            };
            let key = tenant::qualify(username, key);
            match engine.persist(&key).await {
                Ok(updated) => json!({"success": true, "updated": updated}),
                Err(e) => failure(&e.to_string()),
            }
        }
        "kv_stats" => match engine.stats().await {
            Ok(stats) => match serde_json::to_value(&stats) {
                Ok(stats) => json!({"success": true, "stats": stats}),
                Err(e) => failure(&e.to_string()),
            },
            Err(e) => failure(&e.to_string()),
        },
        "kv_backup" => match engine.backup().await {
            Ok(path) => json!({"success": true, "path": path.display().to_string()}),
            Err(e) => failure(&e.to_string()),
        },
        "kv_clear" => match engine.clear().await {
            Ok(()) => json!({"success": true}),
            Err(e) => failure(&e.to_string()),
        },
        other => failure(&format!("unknown tool: {}", other)),
    }
}

fn key_arg(args: &Value) -> Option<&str> {
    args.get("key").and_then(Value::as_str)
}

fn missing(name: &str) -> Value {
    failure(&format!("missing required argument: {}", name))
}

fn failure(message: &str) -> Value {
    json!({"success": false, "error": message})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Limits;
    use crate::storage::MemoryBackend;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn engine() -> (KvEngine, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let engine = KvEngine::new(
            Arc::new(MemoryBackend::new()),
            Limits::default(),
            dir.path().join("backups"),
        );
        (engine, dir)
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let (engine, _dir) = engine();

        let result = dispatch(
            &engine,
            "kv_set",
            &json!({"key": "k", "value": {"n": 1}, "ttl": 60}),
        )
        .await;
        assert_eq!(result, json!({"success": true}));

        let result = dispatch(&engine, "kv_get", &json!({"key": "k"})).await;
        assert_eq!(
            result,
            json!({"success": true, "found": true, "value": {"n": 1}})
        );

        let result = dispatch(&engine, "kv_get", &json!({"key": "absent"})).await;
        assert_eq!(result, json!({"success": true, "found": false}));
    }

    #[tokio::test]
    async fn test_validation_failure_is_structured() {
        let (engine, _dir) = engine();

        let result = dispatch(&engine, "kv_set", &json!({"key": "", "value": 1})).await;
        assert_eq!(result["success"], json!(false));
        assert!(result["error"].as_str().unwrap().contains("invalid key"));
    }

    #[tokio::test]
    async fn test_missing_argument() {
        let (engine, _dir) = engine();

        let result = dispatch(&engine, "kv_set", &json!({"key": "k"})).await;
        assert_eq!(result["success"], json!(false));
        assert!(result["error"].as_str().unwrap().contains("value"));
    }

    #[tokio::test]
    async fn test_every_tool_name_is_dispatchable() {
        let (engine, _dir) = engine();
        for name in TOOL_NAMES {
            let result = dispatch(&engine, name, &json!({})).await;
            // Known tools may fail on missing arguments but are never
            // reported as unknown.
            if let Some(error) = result["error"].as_str() {
                assert!(!error.contains("unknown tool"), "{}", name);
            }
        }
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (engine, _dir) = engine();
        let result = dispatch(&engine, "kv_frobnicate", &json!({})).await;
        assert_eq!(result["success"], json!(false));
        assert!(result["error"].as_str().unwrap().contains("unknown tool"));
    }

    #[tokio::test]
    async fn test_username_prefixes_and_strips() {
        let (engine, _dir) = engine();

        dispatch(
            &engine,
            "kv_set",
            &json!({"key": "note", "value": 1, "username": "alice"}),
        )
        .await;
        dispatch(
            &engine,
            "kv_set",
            &json!({"key": "note", "value": 2, "username": "bob"}),
        )
        .await;

        // The engine stores qualified keys.
        assert!(engine.exists("alice:note").await.unwrap());

        // Each tenant sees only its own keys, unprefixed.
        let result = dispatch(&engine, "kv_keys", &json!({"username": "alice"})).await;
        assert_eq!(result["keys"], json!(["note"]));
        assert_eq!(result["count"], json!(1));

        let result = dispatch(
            &engine,
            "kv_get",
            &json!({"key": "note", "username": "bob"}),
        )
        .await;
        assert_eq!(result["value"], json!(2));
    }

    #[tokio::test]
    async fn test_counter_and_string_tools() {
        let (engine, _dir) = engine();

        let result = dispatch(&engine, "kv_incr", &json!({"key": "n"})).await;
        assert_eq!(result, json!({"success": true, "value": 1}));
        let result = dispatch(&engine, "kv_decr", &json!({"key": "n"})).await;
        assert_eq!(result, json!({"success": true, "value": 0}));

        let result = dispatch(&engine, "kv_append", &json!({"key": "s", "string": "ab"})).await;
        assert_eq!(result, json!({"success": true, "length": 2}));
    }

    #[tokio::test]
    async fn test_expire_ttl_persist_tools() {
        let (engine, _dir) = engine();

        dispatch(&engine, "kv_set", &json!({"key": "k", "value": 1})).await;

        let result = dispatch(&engine, "kv_expire", &json!({"key": "k", "seconds": 30})).await;
        assert_eq!(result, json!({"success": true, "updated": true}));

        let result = dispatch(&engine, "kv_ttl", &json!({"key": "k"})).await;
        let ttl = result["ttl"].as_i64().unwrap();
        assert!(ttl > 0 && ttl <= 30);

        let result = dispatch(&engine, "kv_persist", &json!({"key": "k"})).await;
        assert_eq!(result, json!({"success": true, "updated": true}));
        let result = dispatch(&engine, "kv_ttl", &json!({"key": "k"})).await;
        assert_eq!(result["ttl"], json!(-1));
    }

    #[tokio::test]
    async fn test_stats_backup_clear() {
        let (engine, _dir) = engine();

        dispatch(&engine, "kv_set", &json!({"key": "k", "value": 1})).await;

        let result = dispatch(&engine, "kv_stats", &json!({})).await;
        assert_eq!(result["success"], json!(true));
        assert_eq!(result["stats"]["totalKeys"], json!(1));

        let result = dispatch(&engine, "kv_backup", &json!({})).await;
        assert_eq!(result["success"], json!(true));
        assert!(result["path"].as_str().unwrap().contains("snapshot-"));

        let result = dispatch(&engine, "kv_clear", &json!({})).await;
        assert_eq!(result, json!({"success": true}));
        let result = dispatch(&engine, "kv_keys", &json!({})).await;
        assert_eq!(result["count"], json!(0));
    }
}
