/// Size thresholds for chained-list nodes.
///
/// A node stops accepting inserts once its buffer would grow past
/// `node_max_bytes` or its entry count past `node_max_entries`; the next
/// insert on that side opens a fresh node. The same limits gate whether two
/// adjacent nodes may be merged back together after removals.
#[derive(Debug, Clone)]
pub struct Config {
    pub node_max_bytes: usize,
    pub node_max_entries: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            node_max_bytes: 8192,
            node_max_entries: 128,
        }
    }
}
