//! Dashboard, alarm and agent configuration rendering.

use std::io;

use fleet_id::InstanceId;
use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::{json, Serializer, Value};

use crate::template::{substitute, Bindings};

/// One rendered template item.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedItem {
    /// The node this copy was rendered for.
    pub node_id: InstanceId,

    pub value: Value,

    /// String values changed by the node-level pass.
    pub substitutions: usize,
}

/// Render dashboard widgets for a cluster.
///
/// Each item gets a cluster pass, then one node pass per node on a fresh
/// copy. An item whose first node pass changes nothing is node-invariant and
/// is emitted once; otherwise it is emitted once per node. With no nodes,
/// nothing is emitted.
pub fn render_dashboard(
    template: &[Value],
    nodes: &[InstanceId],
    cluster_name: &str,
    region: &str,
) -> Vec<RenderedItem> {
    let cluster = Bindings::cluster(cluster_name, region);
    let mut widgets = Vec::new();

    for item in template {
        let (cluster_item, _) = substitute(item, &cluster);
        for node_id in nodes {
            let (value, substitutions) =
                substitute(&cluster_item, &Bindings::node(node_id.as_str()));
            widgets.push(RenderedItem {
                node_id: node_id.clone(),
                value,
                substitutions,
            });
            if substitutions == 0 {
                break;
            }
        }
    }

    widgets
}

/// Serialize widgets into a dashboard body.
///
/// Keys keep template order, items are separated by `", "` and keys by
/// `": "`, and non-ASCII characters are written as `\uXXXX` escapes.
pub fn dashboard_body(widgets: &[RenderedItem]) -> String {
    let widgets: Vec<&Value> = widgets.iter().map(|w| &w.value).collect();
    spaced_json(&json!({ "widgets": widgets }))
}

fn spaced_json(value: &Value) -> String {
    let mut out = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut out, SpacedFormatter);
    // Writing into memory cannot fail and the formatter only emits ASCII.
    if value.serialize(&mut serializer).is_err() {
        return value.to_string();
    }
    String::from_utf8(out).unwrap_or_else(|_| value.to_string())
}

/// Single-line JSON with a space after each separator.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(&[ch as u8])?;
            } else {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}

/// Render one alarm per (node, alarm) pair, in node-major order.
pub fn render_alarms(
    template: &[Value],
    nodes: &[InstanceId],
    cluster_name: &str,
    region: &str,
) -> Vec<RenderedItem> {
    let cluster = Bindings::cluster(cluster_name, region);

    nodes
        .iter()
        .flat_map(|node_id| {
            let bindings = cluster.clone().with_instance(node_id.as_str());
            template.iter().map(move |item| {
                let (value, substitutions) = substitute(item, &bindings);
                RenderedItem {
                    node_id: node_id.clone(),
                    value,
                    substitutions,
                }
            })
        })
        .collect()
}

/// Render the agent configuration. `{instance_id}` is left for the agent.
pub fn render_agent_config(template: &Value, cluster_name: &str, region: &str) -> Value {
    substitute(template, &Bindings::cluster(cluster_name, region)).0
}

/// Alarm name used in logs and errors.
pub fn alarm_name(alarm: &Value) -> &str {
    alarm
        .get("AlarmName")
        .and_then(Value::as_str)
        .unwrap_or("<unnamed alarm>")
}
