use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::Value;
use tracing::warn;

fn env_reference() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env reference pattern is valid")
    })
}

/// Replaces `${NAME}` references in every string of a JSON tree with values
/// from the process environment.
pub fn substitute_env_vars(value: &mut Value) {
    substitute_with(value, &|name| std::env::var(name).ok());
}

/// Same as [`substitute_env_vars`] with an explicit lookup. Unknown names
/// become the empty string.
pub fn substitute_with(value: &mut Value, lookup: &dyn Fn(&str) -> Option<String>) {
    match value {
        Value::String(text) => {
            if text.contains("${") {
                *text = expand(text, lookup);
            }
        }
        Value::Array(items) => {
            for item in items {
                substitute_with(item, lookup);
            }
        }
        Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                substitute_with(item, lookup);
            }
        }
        _ => {}
    }
}

fn expand(text: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    env_reference()
        .replace_all(text, |caps: &Captures<'_>| {
            let name = &caps[1];
            lookup(name).unwrap_or_else(|| {
                warn!("Environment variable {} is not set, substituting empty string", name);
                String::new()
            })
        })
        .into_owned()
}
