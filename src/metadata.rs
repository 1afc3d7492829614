//! Sequence and event metadata consulted by the coverage metrics and by
//! diagnostic output.

use crate::error::{inconsistent, CafError};
use rustc_hash::FxHashMap;

pub type EventId = usize;

#[derive(Debug, Clone)]
pub struct Event {
    header: String,
    parent: Option<EventId>,
    children: Vec<EventId>,
    branch_length: f64,
    outgroup: bool,
}

impl Event {
    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn parent(&self) -> Option<EventId> {
        self.parent
    }

    pub fn children(&self) -> &[EventId] {
        &self.children
    }

    /// Length of the branch leading to this event from its parent
    pub fn branch_length(&self) -> f64 {
        self.branch_length
    }

    pub fn is_outgroup(&self) -> bool {
        self.outgroup
    }
}

/// Rooted species tree. The root event is created with the tree.
#[derive(Debug, Clone)]
pub struct EventTree {
    events: Vec<Event>,
}

impl EventTree {
    pub fn new(root_header: &str) -> Self {
        Self {
            events: vec![Event {
                header: root_header.to_string(),
                parent: None,
                children: Vec::new(),
                branch_length: 0.0,
                outgroup: false,
            }],
        }
    }

    pub fn root(&self) -> EventId {
        0
    }

    pub fn add_event(
        &mut self,
        parent: EventId,
        header: &str,
        branch_length: f64,
        outgroup: bool,
    ) -> Result<EventId, CafError> {
        if parent >= self.events.len() {
            return Err(CafError::Missing {
                kind: "event",
                name: parent as u64,
            });
        }
        if branch_length < 0.0 || branch_length.is_nan() {
            return Err(inconsistent(format!(
                "Event {} has invalid branch length {}",
                header, branch_length
            )));
        }
        let id = self.events.len();
        self.events.push(Event {
            header: header.to_string(),
            parent: Some(parent),
            children: Vec::new(),
            branch_length,
            outgroup,
        });
        self.events[parent].children.push(id);
        Ok(id)
    }

    pub fn event(&self, id: EventId) -> Option<&Event> {
        self.events.get(id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Lowest event that has both `a` and `b` as descendants (or is one of them).
    pub fn common_ancestor(&self, a: EventId, b: EventId) -> EventId {
        let mut ancestors = Vec::new();
        let mut cursor = Some(a);
        while let Some(id) = cursor {
            ancestors.push(id);
            cursor = self.events[id].parent;
        }
        let mut cursor = Some(b);
        while let Some(id) = cursor {
            if ancestors.contains(&id) {
                return id;
            }
            cursor = self.events[id].parent;
        }
        self.root()
    }

    /// Sum of the branch lengths of every event strictly below `id`.
    pub fn subtree_branch_length(&self, id: EventId) -> f64 {
        let mut total = 0.0;
        let mut stack: Vec<EventId> = self.events[id].children.clone();
        while let Some(child) = stack.pop() {
            total += self.events[child].branch_length;
            stack.extend_from_slice(&self.events[child].children);
        }
        total
    }
}

#[derive(Debug, Clone)]
pub struct SequenceInfo {
    pub header: String,
    pub event: EventId,
}

/// Maps thread names to the sequence they were built from.
#[derive(Debug, Clone, Default)]
pub struct SequenceCatalog {
    sequences: FxHashMap<u64, SequenceInfo>,
}

impl SequenceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, thread_name: u64, header: &str, event: EventId) {
        self.sequences.insert(
            thread_name,
            SequenceInfo {
                header: header.to_string(),
                event,
            },
        );
    }

    pub fn get(&self, thread_name: u64) -> Option<&SequenceInfo> {
        self.sequences.get(&thread_name)
    }

    pub fn event_of(&self, thread_name: u64) -> Result<EventId, CafError> {
        self.get(thread_name)
            .map(|info| info.event)
            .ok_or(CafError::Missing {
                kind: "sequence",
                name: thread_name,
            })
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}
