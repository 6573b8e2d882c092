//! Span forest reconstruction.
//!
//! Spans arrive as a flat list linked only by `parent_id`. [`build_tree`]
//! turns one session's spans into an ordered forest; [`ExpansionState`]
//! tracks which nodes the user has opened.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::warn;

use crate::error::ClientError;
use crate::model::AgentSpan;

/// A span plus its ordered children.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanNode {
    pub span: AgentSpan,
    pub children: Vec<SpanNode>,
}

impl SpanNode {
    pub fn id(&self) -> i64 {
        self.span.id
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Ordered roots of one session's span hierarchy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpanForest {
    roots: Vec<SpanNode>,
    len: usize,
}

/// One renderable line of a forest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeRow<'a> {
    pub depth: usize,
    pub span: &'a AgentSpan,
    pub has_children: bool,
    pub expanded: bool,
}

impl SpanForest {
    pub fn roots(&self) -> &[SpanNode] {
        &self.roots
    }

    pub fn into_roots(self) -> Vec<SpanNode> {
        self.roots
    }

    /// Total node count across all roots.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Depth-first, pre-order walk yielding `(depth, node)`.
    pub fn walk(&self) -> impl Iterator<Item = (usize, &SpanNode)> {
        let mut stack: Vec<(usize, &SpanNode)> = self.roots.iter().rev().map(|n| (0, n)).collect();
        std::iter::from_fn(move || {
            let (depth, node) = stack.pop()?;
            stack.extend(node.children.iter().rev().map(|c| (depth + 1, c)));
            Some((depth, node))
        })
    }

    pub fn find(&self, id: i64) -> Option<&SpanNode> {
        self.walk().map(|(_, n)| n).find(|n| n.id() == id)
    }

    /// Rows visible under `expansion`: a node's children appear only while
    /// the node itself is expanded.
    pub fn visible_rows<'a>(&'a self, expansion: &ExpansionState) -> Vec<TreeRow<'a>> {
        let mut rows = Vec::new();
        let mut stack: Vec<(usize, &SpanNode)> = self.roots.iter().rev().map(|n| (0, n)).collect();
        while let Some((depth, node)) = stack.pop() {
            let expanded = expansion.is_expanded(node.id());
            rows.push(TreeRow {
                depth,
                span: &node.span,
                has_children: node.has_children(),
                expanded,
            });
            if expanded {
                stack.extend(node.children.iter().rev().map(|c| (depth + 1, c)));
            }
        }
        rows
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Visit {
    Unseen,
    OnPath,
    Done,
}

/// Builds the forest for one session's spans.
///
/// Never fails. A span whose parent is missing becomes a root. When ids
/// repeat, the last record wins and keeps the position of the first. A span
/// naming itself as parent is a root; in a parent cycle, the member that
/// appears first in the input becomes a root.
pub fn build_tree(spans: impl IntoIterator<Item = AgentSpan>) -> SpanForest {
    let mut slots: Vec<Option<AgentSpan>> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();

    for span in spans {
        match index.get(&span.id) {
            Some(&at) => {
                warn!(span_id = span.id, "Duplicate span id; keeping last record");
                slots[at] = Some(span);
            }
            None => {
                index.insert(span.id, slots.len());
                slots.push(Some(span));
            }
        }
    }

    let n = slots.len();
    let mut parent: Vec<Option<usize>> = slots
        .iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.as_ref()
                .and_then(|s| s.parent_id)
                .and_then(|pid| index.get(&pid).copied())
                .filter(|&p| p != i)
        })
        .collect();

    break_cycles(&mut parent, &slots);

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut roots = Vec::new();
    for (i, p) in parent.iter().enumerate() {
        match p {
            Some(p) => children[*p].push(i),
            None => roots.push(i),
        }
    }

    // Pre-order puts every node before its descendants, so walking it
    // backwards assembles children before their parents.
    let mut order = Vec::with_capacity(n);
    let mut stack: Vec<usize> = roots.iter().rev().copied().collect();
    while let Some(i) = stack.pop() {
        order.push(i);
        stack.extend(children[i].iter().rev().copied());
    }

    let mut built: Vec<Option<SpanNode>> = vec![None; n];
    for &i in order.iter().rev() {
        let Some(span) = slots[i].take() else {
            continue;
        };
        let kids = children[i].iter().filter_map(|&c| built[c].take()).collect();
        built[i] = Some(SpanNode { span, children: kids });
    }

    SpanForest {
        roots: roots.iter().filter_map(|&r| built[r].take()).collect(),
        len: order.len(),
    }
}

fn break_cycles(parent: &mut [Option<usize>], slots: &[Option<AgentSpan>]) {
    let mut state = vec![Visit::Unseen; parent.len()];

    for start in 0..parent.len() {
        let mut path: Vec<usize> = Vec::new();
        let mut cur = Some(start);

        while let Some(node) = cur {
            match state[node] {
                Visit::Done => break,
                Visit::OnPath => {
                    let Some(pos) = path.iter().position(|&p| p == node) else {
                        break;
                    };
                    if let Some(&first) = path[pos..].iter().min() {
                        let span_id = slots[first].as_ref().map(|s| s.id);
                        warn!(?span_id, "Span parent cycle; promoting to root");
                        parent[first] = None;
                    }
                    break;
                }
                Visit::Unseen => {
                    state[node] = Visit::OnPath;
                    path.push(node);
                    cur = parent[node];
                }
            }
        }

        for p in path {
            state[p] = Visit::Done;
        }
    }
}

/// Flattens a nested tree payload into span records.
///
/// Nested nodes omit `session_id` and `parent_id`; the session comes from
/// the request and the parent from the nesting. Fields already present on a
/// node are kept. Output is in pre-order.
pub fn flatten_nested(session_id: i64, nodes: Vec<Value>) -> Result<Vec<AgentSpan>, ClientError> {
    let mut out = Vec::new();
    let mut stack: Vec<(Value, Option<i64>)> = nodes.into_iter().rev().map(|v| (v, None)).collect();

    while let Some((value, parent_id)) = stack.pop() {
        let Value::Object(mut fields) = value else {
            return Err(ClientError::Decode("span tree node is not an object".into()));
        };
        let children = match fields.remove("children") {
            Some(Value::Array(children)) => children,
            _ => Vec::new(),
        };
        fields.entry("session_id").or_insert(Value::from(session_id));
        if let Some(pid) = parent_id {
            fields.entry("parent_id").or_insert(Value::from(pid));
        }

        let span: AgentSpan = serde_json::from_value(Value::Object(fields))?;
        let id = span.id;
        out.push(span);
        stack.extend(children.into_iter().rev().map(|c| (c, Some(id))));
    }

    Ok(out)
}

/// Which span ids are expanded. Everything starts collapsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionState {
    expanded: HashSet<i64>,
}

impl ExpansionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_expanded(&self, id: i64) -> bool {
        self.expanded.contains(&id)
    }

    /// Flips one node and returns its new state.
    pub fn toggle(&mut self, id: i64) -> bool {
        if self.expanded.remove(&id) {
            return false;
        }
        self.expanded.insert(id);
        true
    }

    pub fn expand(&mut self, id: i64) {
        self.expanded.insert(id);
    }

    pub fn collapse(&mut self, id: i64) {
        self.expanded.remove(&id);
    }

    pub fn expand_all(&mut self, forest: &SpanForest) {
        self.expanded.extend(forest.walk().map(|(_, n)| n.id()));
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }

    /// Forgets ids that no longer exist in `forest`.
    pub fn retain_present(&mut self, forest: &SpanForest) {
        let present: HashSet<i64> = forest.walk().map(|(_, n)| n.id()).collect();
        self.expanded.retain(|id| present.contains(id));
    }

    pub fn len(&self) -> usize {
        self.expanded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SpanStatus, SpanType};
    use serde_json::json;

    fn span(id: i64, parent_id: Option<i64>) -> AgentSpan {
        AgentSpan {
            id,
            session_id: 1,
            parent_id,
            name: format!("span-{id}"),
            ..Default::default()
        }
    }

    fn root_ids(forest: &SpanForest) -> Vec<i64> {
        forest.roots().iter().map(|n| n.id()).collect()
    }

    #[test]
    fn test_every_span_attached_once() {
        let spans = vec![
            span(1, None),
            span(2, Some(1)),
            span(3, Some(1)),
            span(4, Some(2)),
            span(5, None),
        ];
        let forest = build_tree(spans);

        assert_eq!(root_ids(&forest), vec![1, 5]);
        assert_eq!(forest.len(), 5);
        assert_eq!(forest.walk().count(), 5);

        let one = forest.find(1).unwrap();
        let kids: Vec<i64> = one.children.iter().map(|c| c.id()).collect();
        assert_eq!(kids, vec![2, 3]);
        assert_eq!(forest.find(2).unwrap().children[0].id(), 4);
    }

    #[test]
    fn test_children_resolve_regardless_of_input_order() {
        let forest = build_tree(vec![span(4, Some(2)), span(2, Some(1)), span(1, None)]);
        assert_eq!(root_ids(&forest), vec![1]);
        assert_eq!(forest.find(2).unwrap().children[0].id(), 4);
    }

    #[test]
    fn test_dangling_parent_becomes_root() {
        let forest = build_tree(vec![span(1, None), span(2, Some(99))]);
        assert_eq!(root_ids(&forest), vec![1, 2]);
        assert_eq!(forest.len(), 2);
    }

    #[test]
    fn test_duplicate_id_last_wins() {
        let mut later = span(2, Some(1));
        later.name = "retry".into();
        let forest = build_tree(vec![span(1, None), span(2, None), later]);

        assert_eq!(forest.len(), 2);
        assert_eq!(root_ids(&forest), vec![1]);
        assert_eq!(forest.find(2).unwrap().span.name, "retry");
    }

    #[test]
    fn test_self_parent_is_root() {
        let forest = build_tree(vec![span(7, Some(7))]);
        assert_eq!(root_ids(&forest), vec![7]);
    }

    #[test]
    fn test_cycle_is_broken_at_first_member() {
        let forest = build_tree(vec![span(1, Some(3)), span(2, Some(1)), span(3, Some(2)), span(4, Some(3))]);

        assert_eq!(root_ids(&forest), vec![1]);
        assert_eq!(forest.len(), 4);
        let three = forest.find(3).unwrap();
        assert_eq!(three.children[0].id(), 4);
    }

    #[test]
    fn test_deep_chain() {
        let spans: Vec<AgentSpan> = (0..1_000)
            .map(|i| span(i, if i == 0 { None } else { Some(i - 1) }))
            .collect();
        let forest = build_tree(spans);
        assert_eq!(forest.roots().len(), 1);
        assert_eq!(forest.walk().last().map(|(d, _)| d), Some(999));
    }

    #[test]
    fn test_collapsing_hides_child_rows() {
        let mut agent = span(10, None);
        agent.span_type = SpanType::Agent;
        agent.status = SpanStatus::Running;
        let mut tool = span(11, Some(10));
        tool.span_type = SpanType::Tool;

        let forest = build_tree(vec![agent, tool]);
        let mut expansion = ExpansionState::new();

        let rows = forest.visible_rows(&expansion);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].has_children);
        assert!(!rows[0].expanded);

        assert!(expansion.toggle(10));
        let rows = forest.visible_rows(&expansion);
        assert_eq!(rows.iter().map(|r| r.span.id).collect::<Vec<_>>(), vec![10, 11]);
        assert_eq!(rows[1].depth, 1);

        assert!(!expansion.toggle(10));
        assert_eq!(forest.visible_rows(&expansion).len(), 1);
        assert!(forest.find(11).is_some());
    }

    #[test]
    fn test_retain_present_drops_missing_ids() {
        let forest = build_tree(vec![span(1, None)]);
        let mut expansion = ExpansionState::new();
        expansion.expand(1);
        expansion.expand(42);
        expansion.retain_present(&forest);
        assert!(expansion.is_expanded(1));
        assert!(!expansion.is_expanded(42));
    }

    #[test]
    fn test_flatten_nested_infers_parent_and_session() {
        let payload = vec![json!({
            "id": 10, "name": "agent", "span_type": "agent", "status": "success",
            "created_at": "2024-05-01T10:00:00",
            "children": [
                {"id": 11, "name": "search", "span_type": "tool", "status": "success",
                 "created_at": "2024-05-01T10:00:01", "children": []},
                {"id": 12, "name": "answer", "span_type": "llm_call", "status": "failure",
                 "created_at": "2024-05-01T10:00:02"}
            ]
        })];

        let spans = flatten_nested(5, payload).unwrap();
        let ids: Vec<i64> = spans.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![10, 11, 12]);
        assert!(spans.iter().all(|s| s.session_id == 5));
        assert_eq!(spans[0].parent_id, None);
        assert_eq!(spans[2].parent_id, Some(10));

        let forest = build_tree(spans);
        assert_eq!(forest.roots().len(), 1);
        assert_eq!(forest.roots()[0].children.len(), 2);
    }

    #[test]
    fn test_flatten_rejects_non_object() {
        assert!(flatten_nested(1, vec![json!(3)]).is_err());
    }
}
