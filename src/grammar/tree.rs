use std::sync::Arc;

/// Registry entry for one node type. `index` is the stable numeric identity
/// used in tree buffers; `id` is the derived string identity (`rule`,
/// `rule_begin`, `rule_end`, `rule-cN`).
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub index: usize,
    pub id: String,
    pub props: NodeProps,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeProps {
    pub kind: NodeKind,
    /// Semantic tag from the grammar (capture name), used for highlighting.
    pub tag: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    #[default]
    Rule,
    ScopeBegin,
    ScopeEnd,
    Capture,
    /// Single-character token emitted where no rule matched.
    Skip,
}

/// The shared, immutable registry of node types for one compiled grammar.
#[derive(Debug, Default, PartialEq)]
pub struct NodeSet {
    nodes: Vec<Node>,
}

pub const DOCUMENT_NODE: usize = 0;
pub const SKIP_NODE: usize = 1;

impl NodeSet {
    pub fn new() -> Self {
        let mut set = NodeSet { nodes: Vec::new() };
        set.add("document", NodeProps {
            kind: NodeKind::Document,
            tag: None,
        });
        set.add("skip", NodeProps {
            kind: NodeKind::Skip,
            tag: None,
        });
        set
    }

    pub fn add(&mut self, id: impl Into<String>, props: NodeProps) -> usize {
        let index = self.nodes.len();
        self.nodes.push(Node {
            index,
            id: id.into(),
            props,
        });
        index
    }

    pub fn get(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn by_id(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Relation of a position to a span, used to find which open scopes and
/// tokens an edit range touches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Before,
    AtOrBefore,
    Around,
    AtOrAfter,
    After,
    DontCare,
}

pub fn check_side(side: Side, pos: usize, from: usize, to: usize) -> bool {
    match side {
        Side::Before => pos < from,
        Side::AtOrBefore => pos <= from,
        Side::Around => pos >= from && pos <= to,
        Side::AtOrAfter => pos >= to,
        Side::After => pos > to,
        Side::DontCare => true,
    }
}

const RECORD_WIDTH: usize = 4;

/// Flattened, shareable encoding of a parsed tree: four integers per record
/// (node type index, from, to, direct child count), records in pre-order,
/// referencing a shared [`NodeSet`]. Immutable once produced, so buffers are
/// safe to share by reference across threads.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeBuffer {
    buffer: Vec<u32>,
    nodes: Arc<NodeSet>,
    length: usize,
}

/// One decoded record of a [`TreeBuffer`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TreeRecord {
    pub node: usize,
    pub from: usize,
    pub to: usize,
    pub child_count: usize,
}

impl TreeBuffer {
    pub(crate) fn from_records(
        records: Vec<TreeRecord>,
        nodes: Arc<NodeSet>,
        length: usize,
    ) -> Self {
        let mut buffer = Vec::with_capacity(records.len() * RECORD_WIDTH);
        for record in records {
            buffer.push(record.node as u32);
            buffer.push(record.from as u32);
            buffer.push(record.to as u32);
            buffer.push(record.child_count as u32);
        }
        TreeBuffer {
            buffer,
            nodes,
            length,
        }
    }

    /// Total byte length of the parsed text.
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn record_count(&self) -> usize {
        self.buffer.len() / RECORD_WIDTH
    }

    pub fn record(&self, index: usize) -> TreeRecord {
        let at = index * RECORD_WIDTH;
        TreeRecord {
            node: self.buffer[at] as usize,
            from: self.buffer[at + 1] as usize,
            to: self.buffer[at + 2] as usize,
            child_count: self.buffer[at + 3] as usize,
        }
    }

    pub fn node_set(&self) -> &Arc<NodeSet> {
        &self.nodes
    }

    pub fn node(&self, record: TreeRecord) -> Option<&Node> {
        self.nodes.get(record.node)
    }

    pub fn records(&self) -> impl Iterator<Item = TreeRecord> + '_ {
        (0..self.record_count()).map(|index| self.record(index))
    }

    /// Indices of records whose span satisfies `side` relative to `pos`.
    pub fn find(&self, side: Side, pos: usize) -> Vec<usize> {
        (0..self.record_count())
            .filter(|index| {
                let record = self.record(*index);
                check_side(side, pos, record.from, record.to)
            })
            .collect()
    }

    /// Raw buffer contents, exposed for equivalence checks.
    pub fn raw(&self) -> &[u32] {
        &self.buffer
    }
}
