use std::collections::BTreeSet;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    /// Who consumed the config, e.g. `config-check`.
    pub consumer: String,
    /// Sorted, unique JSON-pointer prefixes treated as read.
    pub consumed_prefixes: Vec<String>,
    /// Sorted leaf pointers under none of the prefixes.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Report config leaves that no consumed prefix covers.
///
/// `/a/b` covers `/a/b` and `/a/b/c` but not `/a/bc`; `/` covers all.
/// With `Fail` a non-clean report is an error; with `Warn` it is logged.
pub fn report_unused_keys(
    consumer: &str,
    consumed: &[&str],
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let prefixes: BTreeSet<String> = consumed.iter().map(|p| normalize_pointer(p)).collect();

    let mut leaves = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let unused: BTreeSet<String> = leaves
        .into_iter()
        .filter(|leaf| !prefixes.iter().any(|p| covers(p, leaf)))
        .collect();

    let report = UnusedKeyReport {
        consumer: consumer.to_string(),
        consumed_prefixes: prefixes.into_iter().collect(),
        unused_leaf_pointers: unused.into_iter().collect(),
    };

    if !report.is_clean() {
        let first: Vec<&String> = report.unused_leaf_pointers.iter().take(12).collect();
        match policy {
            UnusedKeyPolicy::Fail => bail!(
                "CONFIG_UNUSED_KEYS (consumer={}): {} unused leaf key(s): {:?}",
                report.consumer,
                report.unused_leaf_pointers.len(),
                first
            ),
            UnusedKeyPolicy::Warn => warn!(
                consumer = %report.consumer,
                count = report.unused_leaf_pointers.len(),
                first = ?first,
                "unused config keys"
            ),
        }
    }

    Ok(report)
}

fn normalize_pointer(p: &str) -> String {
    let t = p.trim().trim_end_matches('/');
    if t.is_empty() {
        "/".to_string()
    } else if t.starts_with('/') {
        t.to_string()
    } else {
        format!("/{t}")
    }
}

fn covers(prefix: &str, leaf: &str) -> bool {
    prefix == "/"
        || leaf == prefix
        || leaf
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn collect_leaf_pointers(v: &Value, at: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(m) if !m.is_empty() => {
            for (k, child) in m {
                let token = k.replace('~', "~0").replace('/', "~1");
                collect_leaf_pointers(child, &format!("{at}/{token}"), out);
            }
        }
        Value::Array(a) if !a.is_empty() => {
            for (i, child) in a.iter().enumerate() {
                collect_leaf_pointers(child, &format!("{at}/{i}"), out);
            }
        }
        // Empty containers count as leaves so a stray `foo: {}` is reported.
        _ => {
            if at.is_empty() {
                // Root-level empty object: nothing configured.
                if !matches!(v, Value::Object(_)) {
                    out.push("/".to_string());
                }
            } else {
                out.push(at.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_respects_token_boundary() {
        assert!(covers("/a/b", "/a/b"));
        assert!(covers("/a/b", "/a/b/c"));
        assert!(!covers("/a/b", "/a/bc"));
        assert!(covers("/", "/anything"));
    }

    #[test]
    fn pointers_are_normalized() {
        assert_eq!(normalize_pointer("regime/"), "/regime");
        assert_eq!(normalize_pointer(""), "/");
    }
}
