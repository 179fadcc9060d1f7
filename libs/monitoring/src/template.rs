//! Placeholder substitution.
//!
//! Templates are JSON documents whose string values may contain
//! `{instance_id}`, `{cluster_name}` and `{region}`. Object keys are never
//! rewritten. A binding that is absent leaves its placeholder untouched, which
//! is how the cluster pass defers `{instance_id}` to the node pass.

use serde_json::Value;

pub const INSTANCE_ID: &str = "{instance_id}";
pub const CLUSTER_NAME: &str = "{cluster_name}";
pub const REGION: &str = "{region}";

/// Values to substitute. `None` leaves the placeholder in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    pub instance_id: Option<String>,
    pub cluster_name: Option<String>,
    pub region: Option<String>,
}

impl Bindings {
    /// Cluster-level bindings: no node id.
    pub fn cluster(cluster_name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            instance_id: None,
            cluster_name: Some(cluster_name.into()),
            region: Some(region.into()),
        }
    }

    /// Node-level bindings: node id only.
    pub fn node(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: Some(instance_id.into()),
            ..Self::default()
        }
    }

    /// Cluster bindings plus a node id.
    pub fn with_instance(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    fn apply(&self, s: &str) -> String {
        let mut out = s.to_string();
        let pairs = [
            (INSTANCE_ID, &self.instance_id),
            (CLUSTER_NAME, &self.cluster_name),
            (REGION, &self.region),
        ];
        for (placeholder, value) in pairs {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                out = out.replace(placeholder, value);
            }
        }
        out
    }
}

/// Render a copy of `template` and count the string values that changed.
pub fn substitute(template: &Value, bindings: &Bindings) -> (Value, usize) {
    let mut rendered = template.clone();
    let count = substitute_in_place(&mut rendered, bindings);
    (rendered, count)
}

fn substitute_in_place(value: &mut Value, bindings: &Bindings) -> usize {
    match value {
        Value::String(s) => {
            let replaced = bindings.apply(s);
            if replaced == *s {
                0
            } else {
                *s = replaced;
                1
            }
        }
        Value::Array(items) => items
            .iter_mut()
            .map(|item| substitute_in_place(item, bindings))
            .sum(),
        Value::Object(map) => map
            .values_mut()
            .map(|item| substitute_in_place(item, bindings))
            .sum(),
        Value::Null | Value::Bool(_) | Value::Number(_) => 0,
    }
}
