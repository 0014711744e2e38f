//! # Zedis
//!
//! Compact in-memory encodings for a Redis-style data store.
//!
//! Small lists and hashes spend most of their lives tiny, so Zedis packs
//! them into contiguous buffers instead of pointer-chased nodes: a byte
//! codec that stores short numerals as machine integers, a compact list
//! over one growable buffer, a chained list that spreads entries across
//! bounded compact nodes, and a small hash laid over alternating list
//! entries.

pub mod codec;
pub mod config;
pub mod error;
pub mod quicklist;
pub mod value;
pub mod ziplist;
pub mod zipmap;
