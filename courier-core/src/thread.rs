//! Arena-backed conversation tree.
//!
//! Nodes live in one `Vec` in level order (depth, then creation time), with a `HashMap` from message
//! id to arena slot. Children are stored as slot indices, so building and walking the tree never
//! recurses and arbitrarily deep threads cannot exhaust the stack.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{CourierError, Result};
use crate::types::{Message, MessageId, UserId};

#[derive(Debug, Clone, Serialize)]
pub struct ThreadNode {
    pub message: Message,
    pub depth: u32,
    /// Arena slot of the parent; `None` for the root.
    pub parent: Option<usize>,
    /// Arena slots of direct replies, oldest first.
    pub children: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreadTree {
    nodes: Vec<ThreadNode>,
    #[serde(skip)]
    index: HashMap<MessageId, usize>,
}

impl ThreadTree {
    /// Builds the tree from rows in level order, as returned by the thread query.
    ///
    /// The first row must be the root at depth 0; every later row must reference a parent that
    /// appeared earlier one level up.
    pub fn from_levels(rows: Vec<(Message, u32)>) -> Result<Self> {
        let size = rows.len();
        let tree = Self::build(rows).map_err(|err| {
            warn!(size, error = %err, "Rejected thread rows");
            err
        })?;
        debug!(root_id = tree.root().message.id, size, "Built thread tree");
        Ok(tree)
    }

    fn build(rows: Vec<(Message, u32)>) -> Result<Self> {
        let mut nodes: Vec<ThreadNode> = Vec::with_capacity(rows.len());
        let mut index = HashMap::with_capacity(rows.len());

        for (message, depth) in rows {
            let slot = nodes.len();
            let parent = if slot == 0 {
                if depth != 0 {
                    return Err(CourierError::InvalidReference(format!(
                        "thread must start at depth 0, got {} for message {}",
                        depth, message.id
                    )));
                }
                None
            } else {
                let parent_id = message.parent_id.ok_or_else(|| {
                    CourierError::InvalidReference(format!(
                        "message {} at depth {} has no parent",
                        message.id, depth
                    ))
                })?;
                let parent_slot = *index.get(&parent_id).ok_or_else(|| {
                    CourierError::InvalidReference(format!(
                        "parent {} of message {} is not part of the thread",
                        parent_id, message.id
                    ))
                })?;
                let parent_node: &ThreadNode = &nodes[parent_slot];
                if parent_node.depth + 1 != depth {
                    return Err(CourierError::InvalidReference(format!(
                        "message {} at depth {} under parent at depth {}",
                        message.id, depth, parent_node.depth
                    )));
                }
                Some(parent_slot)
            };

            if index.insert(message.id, slot).is_some() {
                return Err(CourierError::InvalidReference(format!(
                    "message {} appears twice in thread",
                    message.id
                )));
            }
            nodes.push(ThreadNode {
                message,
                depth,
                parent,
                children: Vec::new(),
            });
            if let Some(parent_slot) = parent {
                nodes[parent_slot].children.push(slot);
            }
        }

        if nodes.is_empty() {
            return Err(CourierError::NotFound("empty thread".to_string()));
        }

        Ok(Self { nodes, index })
    }

    pub fn root(&self) -> &ThreadNode {
        &self.nodes[0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false for a built tree; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: MessageId) -> Option<&ThreadNode> {
        self.index.get(&id).map(|&slot| &self.nodes[slot])
    }

    /// Direct replies to `id`, oldest first. Empty when `id` is not in the tree.
    pub fn replies_to(&self, id: MessageId) -> Vec<&Message> {
        self.get(id)
            .map(|node| {
                node.children
                    .iter()
                    .map(|&slot| &self.nodes[slot].message)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Messages in level order: root, then each depth level oldest first.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.nodes.iter().map(|n| &n.message)
    }

    pub fn max_depth(&self) -> u32 {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    /// Pre-order walk (each node followed by its subtree), driven by an explicit stack.
    pub fn depth_first(&self) -> Vec<&ThreadNode> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![0usize];
        while let Some(slot) = stack.pop() {
            let node = &self.nodes[slot];
            out.push(node);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Senders and receivers of every message in the tree.
    pub fn participants(&self) -> BTreeSet<UserId> {
        self.nodes
            .iter()
            .flat_map(|n| [n.message.sender_id, n.message.receiver_id])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn msg(id: MessageId, parent_id: Option<MessageId>, sender: UserId, receiver: UserId) -> Message {
        Message {
            id,
            sender_id: sender,
            receiver_id: receiver,
            parent_id,
            content: format!("m{}", id),
            created_at: Utc::now() + Duration::milliseconds(id),
            edited: false,
            edited_at: None,
            read: false,
            version: 1,
        }
    }

    #[test]
    fn test_build_and_walk() {
        // 1 -> (2 -> 4), 3
        let rows = vec![
            (msg(1, None, 10, 20), 0),
            (msg(2, Some(1), 20, 10), 1),
            (msg(3, Some(1), 30, 10), 1),
            (msg(4, Some(2), 10, 20), 2),
        ];
        let tree = ThreadTree::from_levels(rows).unwrap();

        assert_eq!(tree.len(), 4);
        assert_eq!(tree.root().message.id, 1);
        assert_eq!(tree.max_depth(), 2);
        let replies: Vec<MessageId> = tree.replies_to(1).iter().map(|m| m.id).collect();
        assert_eq!(replies, vec![2, 3]);

        let walk: Vec<MessageId> = tree.depth_first().iter().map(|n| n.message.id).collect();
        assert_eq!(walk, vec![1, 2, 4, 3]);

        let level: Vec<MessageId> = tree.messages().map(|m| m.id).collect();
        assert_eq!(level, vec![1, 2, 3, 4]);

        assert_eq!(tree.participants().into_iter().collect::<Vec<_>>(), vec![10, 20, 30]);
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let depth = 20_000;
        let mut rows = vec![(msg(1, None, 1, 2), 0)];
        for i in 2..=depth {
            rows.push((msg(i, Some(i - 1), 1, 2), (i - 1) as u32));
        }
        let tree = ThreadTree::from_levels(rows).unwrap();
        assert_eq!(tree.max_depth() as i64, depth - 1);
        assert_eq!(tree.depth_first().len() as i64, depth);
    }

    #[test]
    fn test_rejects_orphan_row() {
        let rows = vec![(msg(1, None, 1, 2), 0), (msg(5, Some(9), 1, 2), 1)];
        let err = ThreadTree::from_levels(rows).unwrap_err();
        assert_eq!(err.code(), "invalid_reference");
    }

    #[test]
    fn test_rejects_empty_input() {
        let err = ThreadTree::from_levels(Vec::new()).unwrap_err();
        assert_eq!(err.code(), "not_found");
    }
}
