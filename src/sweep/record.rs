//! Record and collection tree types.
//!
//! Collectors describe the work they found as a tree of [`CollectionNode`]s.
//! Leaves carry a single [`Record`] tagged with its [`RecordKind`]; groups
//! nest further nodes. Traversal is depth-first in sequence order, which is
//! the only ordering the dispatcher guarantees.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of a stale record, used as the dispatch key for processors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Obsolete versions of a versioned record.
    Version,
    /// A completed (published or reverted) change set and its items.
    ChangeSet,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Version => "version",
            RecordKind::ChangeSet => "change_set",
        }
    }

    /// Whether a record belongs to this kind.
    pub fn matches(&self, record: &Record) -> bool {
        record.kind == *self
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single candidate record produced by a collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Dispatch key.
    pub kind: RecordKind,
    /// Table (or record class) the record lives in.
    pub table: String,
    /// Primary key of the record.
    pub id: u64,
    /// Versions targeted by this record. Empty for whole-record kinds.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<u32>,
    /// Locale the versions belong to, for localised tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl Record {
    /// Stale versions of a versioned record.
    pub fn version(table: impl Into<String>, id: u64, versions: Vec<u32>) -> Self {
        Self {
            kind: RecordKind::Version,
            table: table.into(),
            id,
            versions,
            locale: None,
        }
    }

    /// A change set to be removed along with its items.
    pub fn change_set(id: u64) -> Self {
        Self {
            kind: RecordKind::ChangeSet,
            table: "ChangeSet".to_string(),
            id,
            versions: Vec::new(),
            locale: None,
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.table, self.id)?;
        if let Some(locale) = &self.locale {
            write!(f, "@{locale}")?;
        }
        Ok(())
    }
}

/// A node in a collection tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionNode {
    Leaf(Record),
    Group(Vec<CollectionNode>),
}

impl From<Record> for CollectionNode {
    fn from(record: Record) -> Self {
        CollectionNode::Leaf(record)
    }
}

impl From<Vec<CollectionNode>> for CollectionNode {
    fn from(nodes: Vec<CollectionNode>) -> Self {
        CollectionNode::Group(nodes)
    }
}

/// An ordered sequence of nodes; one unit of work produced by a collector.
pub type Collection = Vec<CollectionNode>;

/// Count the leaf records in a sequence of nodes, at every depth.
pub fn count_records(nodes: &[CollectionNode]) -> usize {
    leaves(nodes).count()
}

/// Iterate the leaf records of a sequence of nodes depth-first, in sequence order.
pub fn leaves(nodes: &[CollectionNode]) -> Leaves<'_> {
    Leaves {
        stack: vec![nodes.iter()],
    }
}

/// Depth-first iterator over the leaves of a collection tree.
///
/// Uses an explicit stack so arbitrarily deep trees don't recurse.
pub struct Leaves<'a> {
    stack: Vec<std::slice::Iter<'a, CollectionNode>>,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = &'a Record;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            match top.next() {
                Some(CollectionNode::Leaf(record)) => return Some(record),
                Some(CollectionNode::Group(children)) => self.stack.push(children.iter()),
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}
