//! Embeddable HTML rendering of a subgraph (vis-network)

use super::{NodeKind, Subgraph};
use serde_json::{json, Value};

const ROOT_COLOR: &str = "#8fa6a0";
const BOOK_COLOR: &str = "#b7c7c2";
const UNREAD_COLOR: &str = "#e6c79c";
const AUTHOR_COLOR: &str = "#c4b7a6";
const EDGE_COLOR: &str = "rgba(120, 110, 90, 0.35)";

const LABEL_MAX_CHARS: usize = 30;

const TEMPLATE: &str = r##"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<script src="https://unpkg.com/vis-network/standalone/umd/vis-network.min.js"></script>
<style>
  html, body { margin: 0; height: 100%; background: #faf9f6; }
  #graph { width: 100%; height: 600px; }
</style>
</head>
<body>
<div id="graph"></div>
<script type="text/javascript">
  var nodes = new vis.DataSet(__NODES__);
  var edges = new vis.DataSet(__EDGES__);
  var root = __ROOT__;
  var network = new vis.Network(document.getElementById("graph"), { nodes: nodes, edges: edges }, {
    physics: {
      solver: "forceAtlas2Based",
      forceAtlas2Based: { gravitationalConstant: -80, centralGravity: 0.002, springLength: 200, springConstant: 0.02, avoidOverlap: 1 },
      stabilization: { iterations: 300 }
    },
    nodes: { borderWidth: 0, font: { size: 13, face: "Arial", color: "#4c483c" } },
    edges: { width: 1, smooth: { type: "continuous" } },
    interaction: { hover: true, tooltipDelay: 200 }
  });
  setTimeout(function () {
    if (nodes.get(root)) {
      network.focus(root, { scale: 1.2, animation: { duration: 600, easingFunction: "easeInOutQuad" } });
    }
  }, 300);
</script>
</body>
</html>
"##;

/// Shorten `text` to at most 30 characters, ending with an ellipsis when cut
pub fn truncate_label(text: &str) -> String {
    if text.chars().count() <= LABEL_MAX_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(LABEL_MAX_CHARS - 3).collect();
    out.push('…');
    out
}

/// Render `subgraph` as a standalone HTML page focused on its root book
pub fn render_html(subgraph: &Subgraph) -> String {
    let nodes: Vec<Value> = subgraph
        .nodes
        .iter()
        .map(|node| {
            let is_root = node.key == subgraph.root;
            let (color, size, tooltip) = match node.kind {
                NodeKind::Book if is_root => (ROOT_COLOR, 28, node.label.clone()),
                NodeKind::Book if node.unread => (UNREAD_COLOR, 20, format!("Unread: {}", node.label)),
                NodeKind::Book => (BOOK_COLOR, 20, node.label.clone()),
                NodeKind::Author => (AUTHOR_COLOR, 26, format!("Author: {}", node.label)),
            };
            json!({
                "id": node.key,
                "label": truncate_label(&node.label),
                "title": tooltip,
                "color": color,
                "size": size,
            })
        })
        .collect();

    let edges: Vec<Value> = subgraph
        .edges
        .iter()
        .map(|edge| {
            json!({
                "from": edge.source,
                "to": edge.target,
                "value": edge.weight,
                "color": EDGE_COLOR,
            })
        })
        .collect();

    fill_template(
        TEMPLATE,
        &[
            ("__NODES__", script_json(&Value::Array(nodes))),
            ("__EDGES__", script_json(&Value::Array(edges))),
            ("__ROOT__", script_json(&Value::String(subgraph.root.clone()))),
        ],
    )
}

/// Replace each placeholder in `template` in one left-to-right pass
///
/// Only the template itself is scanned, never the substituted text.
fn fill_template(template: &str, values: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len() + values.iter().map(|(_, v)| v.len()).sum::<usize>());
    let mut rest = template;
    loop {
        let next = values
            .iter()
            .filter_map(|(marker, value)| rest.find(marker).map(|pos| (pos, *marker, value)))
            .min_by_key(|(pos, _, _)| *pos);
        let Some((pos, marker, value)) = next else {
            out.push_str(rest);
            return out;
        };
        out.push_str(&rest[..pos]);
        out.push_str(value);
        rest = &rest[pos + marker.len()..];
    }
}

/// JSON safe to inline inside a `<script>` element
fn script_json(value: &Value) -> String {
    value.to_string().replace("</", "<\\/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{build_graph, EdgeKind, Recommendation};
    use crate::models::book::sample;

    #[test]
    fn test_truncate_label() {
        assert_eq!(truncate_label("Dune"), "Dune");
        let long = "The Hitchhiker's Guide to the Galaxy";
        let label = truncate_label(long);
        assert_eq!(label.chars().count(), 28);
        assert!(label.ends_with('…'));
        assert_eq!(truncate_label(&"x".repeat(30)), "x".repeat(30));
    }

    #[test]
    fn test_render_contains_nodes_and_focus() {
        let g = build_graph(&[sample("1", "Dune", "Frank Herbert")]);
        let html = render_html(&g.subgraph("1").unwrap());

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("\"book::1\""));
        assert!(html.contains("author::Frank Herbert"));
        assert!(html.contains(ROOT_COLOR));
        assert!(html.contains("network.focus(root"));
        assert!(!html.contains("__NODES__"));
    }

    #[test]
    fn test_placeholder_like_title_is_not_expanded() {
        let g = build_graph(&[sample("1", "__ROOT__ and __EDGES__", "__NODES__")]);
        let html = render_html(&g.subgraph("1").unwrap());

        assert!(html.contains(r#""label":"__ROOT__ and __EDGES__""#));
        assert!(html.contains(r#""id":"author::__NODES__""#));
        assert!(html.contains(r#"var root = "book::1";"#));
        assert_eq!(html.matches("var nodes = new vis.DataSet([").count(), 1);
    }

    #[test]
    fn test_fill_template_single_pass() {
        let filled = fill_template("a=__A__ b=__B__", &[("__A__", "__B__".into()), ("__B__", "2".into())]);
        assert_eq!(filled, "a=__B__ b=2");
    }

    #[test]
    fn test_unread_nodes_are_gold() {
        let g = build_graph(&[sample("1", "Kindred", "Octavia E. Butler")]);
        let mut sub = g.subgraph("1").unwrap();
        sub.attach_unread(&[Recommendation {
            key: "unread::Dawn::Octavia E. Butler".into(),
            title: "Dawn".into(),
            author: Some("Octavia E. Butler".into()),
            weight: 0.5,
            via: EdgeKind::WrittenBy,
            unread: true,
            cover_url: None,
            external_id: None,
        }]);

        let html = render_html(&sub);
        assert!(html.contains(UNREAD_COLOR));
        assert!(html.contains(r#""title":"Unread: Dawn""#));
    }

    #[test]
    fn test_script_breakout_escaped() {
        let g = build_graph(&[sample("1", "</script><b>", "Someone")]);
        let html = render_html(&g.subgraph("1").unwrap());
        assert!(!html.contains("</script><b>"));
    }
}
