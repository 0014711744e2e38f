use std::collections::VecDeque;

use tracing::debug;

use crate::codec;
use crate::config::Config;
use crate::error::{ZedisError, ZedisResult};
use crate::ziplist::{EMPTY_SIZE, Ziplist};

#[derive(Debug, Clone)]
struct QuicklistNode {
    zl: Ziplist,
    num_bytes: usize,
    len: usize,
}

impl QuicklistNode {
    fn new() -> Self {
        QuicklistNode {
            zl: Ziplist::new(),
            num_bytes: EMPTY_SIZE,
            len: 0,
        }
    }

    fn from_ziplist(zl: Ziplist) -> Self {
        let num_bytes = zl.num_bytes();
        let len = zl.len();
        QuicklistNode { zl, num_bytes, len }
    }

    fn refresh(&mut self) {
        self.num_bytes = self.zl.num_bytes();
        self.len = self.zl.len();
    }

    /// A fresh node takes any entry, however large. A node already
    /// holding entries must stay inside both limits after the insert.
    fn accepts(&self, value_len: usize, config: &Config) -> bool {
        if self.len == 0 {
            return true;
        }
        self.num_bytes + codec::estimate_entry_size(value_len) <= config.node_max_bytes
            && self.len + 1 <= config.node_max_entries as usize
    }
}

/// A list of compact-buffer nodes. Spreading entries over bounded nodes
/// keeps each insert or removal shifting one small buffer rather than
/// the whole list. Nodes are never empty; a drained node is unlinked
/// and adjacent small nodes merge back together.
#[derive(Debug, Clone)]
pub struct Quicklist {
    nodes: VecDeque<QuicklistNode>,
    len: usize,
    config: Config,
}

impl Quicklist {
    pub fn new() -> Self {
        Quicklist::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Quicklist {
            nodes: VecDeque::new(),
            len: 0,
            config,
        }
    }

    /// Total entries across all nodes. O(1).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Append to the tail node, opening a new one when the tail is
    /// full.
    pub fn push_back(&mut self, value: &[u8]) -> ZedisResult<()> {
        match self.nodes.back_mut() {
            Some(node) if node.accepts(value.len(), &self.config) => {
                node.zl.push_back(value)?;
                node.refresh();
            }
            _ => {
                let mut node = QuicklistNode::new();
                node.zl.push_back(value)?;
                node.refresh();
                self.nodes.push_back(node);
                debug!("opened tail node, {} nodes", self.nodes.len());
            }
        }
        self.len += 1;
        Ok(())
    }

    /// Prepend to the head node, opening a new one when the head is
    /// full.
    pub fn push_front(&mut self, value: &[u8]) -> ZedisResult<()> {
        match self.nodes.front_mut() {
            Some(node) if node.accepts(value.len(), &self.config) => {
                node.zl.push_front(value)?;
                node.refresh();
            }
            _ => {
                let mut node = QuicklistNode::new();
                node.zl.push_front(value)?;
                node.refresh();
                self.nodes.push_front(node);
                debug!("opened head node, {} nodes", self.nodes.len());
            }
        }
        self.len += 1;
        Ok(())
    }

    pub fn pop_back(&mut self) -> ZedisResult<Option<Vec<u8>>> {
        let (value, drained) = match self.nodes.back_mut() {
            Some(node) => {
                let mut removed = node.zl.remove_from_tail(1, 0)?;
                node.refresh();
                (removed.values.pop(), node.len == 0)
            }
            None => return Ok(None),
        };
        if drained {
            self.nodes.pop_back();
            debug!("unlinked drained tail node, {} remain", self.nodes.len());
        }
        if value.is_some() {
            self.len -= 1;
        }
        Ok(value)
    }

    pub fn pop_front(&mut self) -> ZedisResult<Option<Vec<u8>>> {
        let (value, drained) = match self.nodes.front_mut() {
            Some(node) => {
                let mut removed = node.zl.remove_from_head(1, 0)?;
                node.refresh();
                (removed.values.pop(), node.len == 0)
            }
            None => return Ok(None),
        };
        if drained {
            self.nodes.pop_front();
            debug!("unlinked drained head node, {} remain", self.nodes.len());
        }
        if value.is_some() {
            self.len -= 1;
        }
        Ok(value)
    }

    /// Value at `index`, or `None` past the end. Skips whole nodes
    /// using their cached entry counts.
    pub fn index(&self, index: usize) -> ZedisResult<Option<Vec<u8>>> {
        if index >= self.len {
            return Ok(None);
        }
        let mut remaining = index;
        for node in &self.nodes {
            if remaining < node.len {
                return node.zl.index(remaining);
            }
            remaining -= node.len;
        }
        Ok(None)
    }

    /// Overwrite the entry at `index`. The node keeps the entry even if
    /// the new value pushes it past the insert limits.
    pub fn replace_at(&mut self, index: usize, value: &[u8]) -> ZedisResult<()> {
        if index >= self.len {
            return Err(ZedisError::IndexOutOfRange);
        }
        let mut remaining = index;
        for node in &mut self.nodes {
            if remaining < node.len {
                node.zl.replace_at(remaining, value)?;
                node.refresh();
                return Ok(());
            }
            remaining -= node.len;
        }
        Err(ZedisError::IndexOutOfRange)
    }

    /// Values in `[start, end)`, with `end` clamped to the list length.
    pub fn range(&self, start: usize, end: usize) -> ZedisResult<Vec<Vec<u8>>> {
        let end = end.min(self.len);
        if start >= end {
            return Ok(Vec::new());
        }
        let mut out = Vec::with_capacity(end - start);
        let mut node_start = 0usize;
        for node in &self.nodes {
            let node_end = node_start + node.len;
            if node_end <= start {
                node_start = node_end;
                continue;
            }
            if node_start >= end {
                break;
            }
            for entry in node.zl.iter() {
                let entry = entry?;
                let global = node_start + entry.index;
                if global < start {
                    continue;
                }
                if global >= end {
                    break;
                }
                out.push(entry.value);
            }
            node_start = node_end;
        }
        Ok(out)
    }

    /// Keep only `[start, end)`, discarding everything outside it. An
    /// empty window clears the list.
    pub fn trim(&mut self, start: usize, end: usize) -> ZedisResult<()> {
        let end = end.min(self.len);
        if start >= end {
            self.nodes.clear();
            self.len = 0;
            return Ok(());
        }
        let drop_back = self.len - end;
        self.remove_from_front(start)?;
        self.remove_from_back(drop_back)?;
        Ok(())
    }

    /// Remove up to `count` entries from the head, unlinking nodes as
    /// they drain.
    pub fn remove_from_front(&mut self, count: usize) -> ZedisResult<Vec<Vec<u8>>> {
        let mut values = Vec::new();
        let mut remaining = count;
        while remaining > 0 {
            let (mut chunk, drained) = match self.nodes.front_mut() {
                Some(node) => {
                    let removed = node.zl.remove_from_head(remaining, 0)?;
                    node.refresh();
                    (removed.values, node.len == 0)
                }
                None => break,
            };
            remaining -= chunk.len();
            self.len -= chunk.len();
            values.append(&mut chunk);
            if drained {
                self.nodes.pop_front();
                debug!("unlinked drained head node, {} remain", self.nodes.len());
            }
        }
        self.try_merge_front()?;
        Ok(values)
    }

    /// Remove up to `count` entries from the tail, tail side first.
    pub fn remove_from_back(&mut self, count: usize) -> ZedisResult<Vec<Vec<u8>>> {
        let mut values = Vec::new();
        let mut remaining = count;
        while remaining > 0 {
            let (mut chunk, drained) = match self.nodes.back_mut() {
                Some(node) => {
                    let removed = node.zl.remove_from_tail(remaining, 0)?;
                    node.refresh();
                    (removed.values, node.len == 0)
                }
                None => break,
            };
            remaining -= chunk.len();
            self.len -= chunk.len();
            values.append(&mut chunk);
            if drained {
                self.nodes.pop_back();
                debug!("unlinked drained tail node, {} remain", self.nodes.len());
            }
        }
        self.try_merge_back()?;
        Ok(values)
    }

    /// All values, head to tail.
    pub fn iter(&self) -> impl Iterator<Item = ZedisResult<Vec<u8>>> + '_ {
        self.nodes
            .iter()
            .flat_map(|node| node.zl.iter().map(|entry| entry.map(|e| e.value)))
    }

    /// The per-node compact buffers, head to tail.
    pub fn nodes(&self) -> impl Iterator<Item = &Ziplist> + '_ {
        self.nodes.iter().map(|node| &node.zl)
    }

    /// Rebuild a list from per-node buffers, head to tail. Empty nodes
    /// are rejected.
    pub fn from_nodes<I>(config: Config, nodes: I) -> ZedisResult<Quicklist>
    where
        I: IntoIterator<Item = Ziplist>,
    {
        let mut list = Quicklist::with_config(config);
        for zl in nodes {
            if zl.is_empty() {
                return Err(ZedisError::CorruptEncoding(
                    "empty chained-list node".into(),
                ));
            }
            let node = QuicklistNode::from_ziplist(zl);
            list.len += node.len;
            list.nodes.push_back(node);
        }
        Ok(list)
    }

    fn merge_allowed(&self, a: &QuicklistNode, b: &QuicklistNode) -> bool {
        a.num_bytes + b.num_bytes - EMPTY_SIZE <= self.config.node_max_bytes
            && a.len + b.len <= self.config.node_max_entries as usize
    }

    fn try_merge_front(&mut self) -> ZedisResult<()> {
        if self.nodes.len() < 2 || !self.merge_allowed(&self.nodes[0], &self.nodes[1]) {
            return Ok(());
        }
        if let Some(second) = self.nodes.remove(1) {
            if let Some(first) = self.nodes.front_mut() {
                first.zl.merge_back(&second.zl)?;
                first.refresh();
                debug!("merged head nodes, {} remain", self.nodes.len());
            }
        }
        Ok(())
    }

    fn try_merge_back(&mut self) -> ZedisResult<()> {
        let n = self.nodes.len();
        if n < 2 || !self.merge_allowed(&self.nodes[n - 2], &self.nodes[n - 1]) {
            return Ok(());
        }
        if let Some(last) = self.nodes.pop_back() {
            if let Some(prev) = self.nodes.back_mut() {
                prev.zl.merge_back(&last.zl)?;
                prev.refresh();
                debug!("merged tail nodes, {} remain", self.nodes.len());
            }
        }
        Ok(())
    }
}

impl Default for Quicklist {
    fn default() -> Self {
        Quicklist::new()
    }
}
