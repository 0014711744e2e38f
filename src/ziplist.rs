use bytes::Bytes;
use tracing::trace;

use crate::codec;
use crate::error::{ZedisError, ZedisResult};

// Buffer layout: <total_bytes u32> <tail_offset u32> <entry_count u16>
// <entry>* <0xFF>, header fields little endian. total_bytes always equals
// the buffer length, tail_offset points at the start of the last entry
// (at the terminator's slot when empty), and entry_count saturates at
// 65535, past which `len` rescans. Removals store the exact count again
// once it drops back under the bound.
pub(crate) const HEADER_SIZE: usize = 10;
const END_SIZE: usize = 1;
pub(crate) const EMPTY_SIZE: usize = HEADER_SIZE + END_SIZE;
const END_BYTE: u8 = 0xFF;
const COUNT_SATURATED: u16 = u16::MAX;

/// A compact list: one contiguous growable buffer of variable-width
/// entries. Every entry records the encoded size of its predecessor, so
/// the buffer walks forward from the header and backward from the tail
/// offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ziplist {
    buf: Vec<u8>,
}

/// One decoded entry, as yielded by [`Ziplist::iter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZiplistEntry {
    pub index: usize,
    pub offset: usize,
    pub value: Vec<u8>,
}

/// Outcome of a skip-aware removal.
#[derive(Debug)]
pub struct Removed {
    /// Removed values, in removal order.
    pub values: Vec<Vec<u8>>,
    /// Entries actually skipped before the removal began.
    pub skipped: usize,
    /// True when the walk consumed or skipped entries through the far
    /// end of the buffer.
    pub reached_end: bool,
}

impl Ziplist {
    pub fn new() -> Self {
        let mut buf = vec![0u8; EMPTY_SIZE];
        buf[EMPTY_SIZE - 1] = END_BYTE;
        let mut zl = Ziplist { buf };
        zl.set_total_bytes(EMPTY_SIZE);
        zl.set_tail_offset(HEADER_SIZE);
        zl
    }

    /// Number of entries. O(1) until the stored count saturates, after
    /// which the buffer is rescanned.
    pub fn len(&self) -> usize {
        let stored = self.stored_count();
        if stored < COUNT_SATURATED {
            stored as usize
        } else {
            trace!("entry count saturated, rescanning");
            self.scan_len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buf.len() == EMPTY_SIZE
    }

    /// Size of the underlying buffer in bytes.
    pub fn num_bytes(&self) -> usize {
        self.buf.len()
    }

    /// Append a value after the current tail.
    pub fn push_back(&mut self, value: &[u8]) -> ZedisResult<()> {
        let prevlen = if self.is_empty() {
            0
        } else {
            codec::entry_size(&self.buf, self.tail_offset())?
        };
        let mut entry = codec::encode_prevlen(prevlen);
        entry.extend_from_slice(&codec::encode_value(value));
        let size = entry.len();
        let offset = self.buf.len() - END_SIZE;

        self.grow(offset, size);
        self.buf[offset..offset + size].copy_from_slice(&entry);
        self.set_tail_offset(offset);
        self.sync_total();
        self.add_count(1);
        Ok(())
    }

    /// Insert a value before the current head.
    pub fn push_front(&mut self, value: &[u8]) -> ZedisResult<()> {
        let mut entry = codec::encode_prevlen(0);
        entry.extend_from_slice(&codec::encode_value(value));
        let size = entry.len();
        let had_entries = !self.is_empty();

        self.grow(HEADER_SIZE, size);
        self.buf[HEADER_SIZE..HEADER_SIZE + size].copy_from_slice(&entry);
        if had_entries {
            let tail = self.tail_offset();
            self.set_tail_offset(tail + size);
            self.cascade_prevlen(HEADER_SIZE + size, size)?;
        } else {
            self.set_tail_offset(HEADER_SIZE);
        }
        self.sync_total();
        self.add_count(1);
        Ok(())
    }

    /// Value at `index`, or `None` past the end. Linear scan from the
    /// head.
    pub fn index(&self, index: usize) -> ZedisResult<Option<Vec<u8>>> {
        match self.offset_of_index(index)? {
            Some(offset) => {
                let (value, _) = codec::decode_entry(&self.buf, offset)?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Overwrite the entry at `index` in place, shifting the rest of the
    /// buffer by the size difference.
    pub fn replace_at(&mut self, index: usize, value: &[u8]) -> ZedisResult<()> {
        let offset = match self.offset_of_index(index)? {
            Some(offset) => offset,
            None => return Err(ZedisError::IndexOutOfRange),
        };
        let old_size = codec::entry_size(&self.buf, offset)?;
        let (prevlen, _) = codec::decode_prevlen(&self.buf, offset)?;
        let mut entry = codec::encode_prevlen(prevlen);
        entry.extend_from_slice(&codec::encode_value(value));
        let new_size = entry.len();

        let delta = new_size as isize - old_size as isize;
        if delta > 0 {
            self.grow(offset, delta as usize);
        } else if delta < 0 {
            self.buf.drain(offset..offset + (-delta) as usize);
        }
        self.buf[offset..offset + new_size].copy_from_slice(&entry);

        let tail = self.tail_offset();
        if offset < tail {
            self.set_tail_offset((tail as isize + delta) as usize);
            self.cascade_prevlen(offset + new_size, new_size)?;
        }
        self.sync_total();
        Ok(())
    }

    /// Skip `skip` entries from the head, then remove up to `count`
    /// entries. Removing every entry resets the buffer to its empty
    /// form.
    pub fn remove_from_head(&mut self, count: usize, skip: usize) -> ZedisResult<Removed> {
        let len = self.len();
        if skip >= len {
            return Ok(Removed {
                values: Vec::new(),
                skipped: len,
                reached_end: true,
            });
        }
        if count == 0 {
            return Ok(Removed {
                values: Vec::new(),
                skipped: skip,
                reached_end: false,
            });
        }

        let mut last_kept = None;
        let mut start = HEADER_SIZE;
        for _ in 0..skip {
            last_kept = Some(start);
            start += codec::entry_size(&self.buf, start)?;
        }

        let mut values = Vec::new();
        let mut offset = start;
        while values.len() < count && !self.at_end(offset) {
            let (value, size) = codec::decode_entry(&self.buf, offset)?;
            values.push(value);
            offset += size;
        }
        let reached_end = self.at_end(offset);

        if skip == 0 && reached_end {
            *self = Ziplist::new();
            return Ok(Removed {
                values,
                skipped: 0,
                reached_end: true,
            });
        }

        let removed_bytes = offset - start;
        match last_kept {
            Some(tail) if reached_end => {
                self.buf.drain(start..offset);
                self.set_tail_offset(tail);
            }
            _ => {
                let new_prevlen = match last_kept {
                    Some(kept) => codec::entry_size(&self.buf, kept)?,
                    None => 0,
                };
                self.buf.drain(start..offset);
                let tail = self.tail_offset();
                self.set_tail_offset(tail - removed_bytes);
                self.cascade_prevlen(start, new_prevlen)?;
            }
        }
        self.sync_total();
        self.drop_count(values.len());
        Ok(Removed {
            values,
            skipped: skip,
            reached_end,
        })
    }

    /// Skip `skip` entries from the tail, then remove up to `count`
    /// entries walking toward the head. Values come back in removal
    /// order, tail side first.
    pub fn remove_from_tail(&mut self, count: usize, skip: usize) -> ZedisResult<Removed> {
        let len = self.len();
        if skip >= len {
            return Ok(Removed {
                values: Vec::new(),
                skipped: len,
                reached_end: true,
            });
        }
        if count == 0 {
            return Ok(Removed {
                values: Vec::new(),
                skipped: skip,
                reached_end: false,
            });
        }

        let mut last = self.tail_offset();
        for _ in 0..skip {
            let (prevlen, _) = codec::decode_prevlen(&self.buf, last)?;
            last -= prevlen;
        }

        let mut offsets = vec![last];
        let mut lo = last;
        while offsets.len() < count {
            let (prevlen, _) = codec::decode_prevlen(&self.buf, lo)?;
            if prevlen == 0 {
                break;
            }
            lo -= prevlen;
            offsets.push(lo);
        }
        let reached_end = lo == HEADER_SIZE;

        let mut values = Vec::with_capacity(offsets.len());
        for &offset in &offsets {
            let (value, _) = codec::decode_entry(&self.buf, offset)?;
            values.push(value);
        }

        if skip == 0 && reached_end {
            *self = Ziplist::new();
            return Ok(Removed {
                values,
                skipped: 0,
                reached_end: true,
            });
        }

        let end_of_removed = last + codec::entry_size(&self.buf, last)?;
        let at_buffer_end = self.at_end(end_of_removed);
        let pred_size = if lo == HEADER_SIZE {
            0
        } else {
            codec::decode_prevlen(&self.buf, lo)?.0
        };
        let removed_bytes = end_of_removed - lo;

        self.buf.drain(lo..end_of_removed);
        if at_buffer_end {
            // the predecessor of the removed block becomes the tail
            self.set_tail_offset(lo - pred_size);
        } else {
            let tail = self.tail_offset();
            self.set_tail_offset(tail - removed_bytes);
            self.cascade_prevlen(lo, pred_size)?;
        }
        self.sync_total();
        self.drop_count(values.len());
        Ok(Removed {
            values,
            skipped: skip,
            reached_end,
        })
    }

    /// Lazy forward iterator over decoded entries.
    pub fn iter(&self) -> ZiplistIter<'_> {
        ZiplistIter {
            zl: self,
            offset: HEADER_SIZE,
            index: 0,
            done: false,
        }
    }

    /// Splice another list's entries in after this list's tail.
    pub fn merge_back(&mut self, other: &Ziplist) -> ZedisResult<()> {
        if other.is_empty() {
            return Ok(());
        }
        if self.is_empty() {
            self.buf = other.buf.clone();
            return Ok(());
        }

        let tail_size = codec::entry_size(&self.buf, self.tail_offset())?;
        let other_count = other.len();
        let other_tail_rel = other.tail_offset() - HEADER_SIZE;
        let other_entries = &other.buf[HEADER_SIZE..other.buf.len() - END_SIZE];
        let splice_at = self.buf.len() - END_SIZE;

        // other's first entry carried a one-byte zero prevlen; it now
        // records this list's old tail instead
        let boundary = codec::encode_prevlen(tail_size);
        let boundary_size = boundary.len();
        self.buf.truncate(splice_at);
        self.buf.extend_from_slice(&boundary);
        self.buf.extend_from_slice(&other_entries[1..]);
        self.buf.push(END_BYTE);

        let new_tail = if other_tail_rel == 0 {
            splice_at
        } else {
            splice_at + boundary_size + other_tail_rel - 1
        };
        self.set_tail_offset(new_tail);

        let first_size = codec::entry_size(&self.buf, splice_at)?;
        self.cascade_prevlen(splice_at + first_size, first_size)?;
        self.sync_total();
        self.add_count(other_count);
        Ok(())
    }

    /// The exact buffer bytes.
    pub fn serialize(&self) -> Bytes {
        Bytes::copy_from_slice(&self.buf)
    }

    /// Rebuild a list from serialized bytes, validating the whole
    /// structure: header fields, every entry tag, every prevlen, the
    /// tail offset, and the terminator. Any disagreement fails the load.
    pub fn deserialize(data: &[u8]) -> ZedisResult<Ziplist> {
        if data.len() < EMPTY_SIZE {
            return Err(ZedisError::CorruptEncoding(
                "buffer shorter than an empty list".into(),
            ));
        }
        if data[data.len() - 1] != END_BYTE {
            return Err(ZedisError::CorruptEncoding("missing terminator".into()));
        }
        let declared_total = read_u32(data, 0) as usize;
        if declared_total != data.len() {
            return Err(ZedisError::CorruptEncoding(
                "total-bytes field disagrees with buffer length".into(),
            ));
        }

        let end = data.len() - END_SIZE;
        let mut offset = HEADER_SIZE;
        let mut count = 0usize;
        let mut prev_size = 0usize;
        let mut last_start = HEADER_SIZE;
        while offset < end {
            let (stored_prevlen, stored_width) = codec::decode_prevlen(data, offset)?;
            if stored_prevlen != prev_size
                || stored_width != codec::prevlen_field_size(prev_size)
            {
                return Err(ZedisError::CorruptEncoding(format!(
                    "prevlen mismatch at offset {offset}"
                )));
            }
            let size = codec::entry_size(data, offset)?;
            if offset + size > end {
                return Err(ZedisError::CorruptEncoding(
                    "entry overruns the terminator".into(),
                ));
            }
            last_start = offset;
            prev_size = size;
            offset += size;
            count += 1;
        }

        let expected_tail = if count == 0 { HEADER_SIZE } else { last_start };
        if read_u32(data, 4) as usize != expected_tail {
            return Err(ZedisError::CorruptEncoding(
                "tail offset does not point at the last entry".into(),
            ));
        }
        let declared_count = read_u16(data, 8);
        let count_ok = if count < COUNT_SATURATED as usize {
            declared_count as usize == count
        } else {
            declared_count == COUNT_SATURATED
        };
        if !count_ok {
            return Err(ZedisError::CorruptEncoding(
                "entry count disagrees with the buffer".into(),
            ));
        }

        Ok(Ziplist {
            buf: data.to_vec(),
        })
    }

    /// Encoding and payload bytes of the entry at `offset`, prevlen
    /// field excluded.
    pub(crate) fn encoded_value_at(&self, offset: usize) -> ZedisResult<&[u8]> {
        let (_, prevlen_size) = codec::decode_prevlen(&self.buf, offset)?;
        let total = codec::entry_size(&self.buf, offset)?;
        Ok(&self.buf[offset + prevlen_size..offset + total])
    }

    fn offset_of_index(&self, index: usize) -> ZedisResult<Option<usize>> {
        let mut offset = HEADER_SIZE;
        let mut i = 0usize;
        while !self.at_end(offset) {
            if i == index {
                return Ok(Some(offset));
            }
            offset += codec::entry_size(&self.buf, offset)?;
            i += 1;
        }
        Ok(None)
    }

    /// Repair the prevlen chain starting at the entry at `offset`, whose
    /// field must record `prevlen`. Continues forward while field widths
    /// keep changing, holding the tail offset in step. Fields are always
    /// rewritten to their canonical width.
    fn cascade_prevlen(&mut self, mut offset: usize, mut prevlen: usize) -> ZedisResult<()> {
        while !self.at_end(offset) {
            let (stored, stored_width) = codec::decode_prevlen(&self.buf, offset)?;
            let wanted = codec::encode_prevlen(prevlen);
            if stored == prevlen && stored_width == wanted.len() {
                break;
            }
            let delta = wanted.len() as isize - stored_width as isize;
            if delta > 0 {
                self.grow(offset, delta as usize);
            } else if delta < 0 {
                self.buf.drain(offset..offset + (-delta) as usize);
            }
            self.buf[offset..offset + wanted.len()].copy_from_slice(&wanted);
            let tail = self.tail_offset();
            if offset < tail {
                self.set_tail_offset((tail as isize + delta) as usize);
            }
            if delta == 0 {
                break;
            }
            trace!("prevlen width changed at offset {offset}, cascading");
            let size = codec::entry_size(&self.buf, offset)?;
            prevlen = size;
            offset += size;
        }
        Ok(())
    }

    fn scan_len(&self) -> usize {
        let mut offset = HEADER_SIZE;
        let mut n = 0usize;
        while !self.at_end(offset) {
            match codec::entry_size(&self.buf, offset) {
                Ok(size) => {
                    offset += size;
                    n += 1;
                }
                Err(_) => break,
            }
        }
        n
    }

    fn at_end(&self, offset: usize) -> bool {
        self.buf.get(offset).is_none_or(|&b| b == END_BYTE)
    }

    /// Open a `size`-byte gap at `offset`, shifting the rest of the
    /// buffer right.
    fn grow(&mut self, offset: usize, size: usize) {
        let old_len = self.buf.len();
        self.buf.resize(old_len + size, 0);
        self.buf.copy_within(offset..old_len, offset + size);
    }

    fn sync_total(&mut self) {
        let total = self.buf.len();
        self.set_total_bytes(total);
    }

    fn add_count(&mut self, n: usize) {
        let stored = self.stored_count();
        if stored < COUNT_SATURATED {
            let total = (stored as usize + n).min(COUNT_SATURATED as usize);
            self.set_stored_count(total as u16);
        }
    }

    fn drop_count(&mut self, n: usize) {
        let stored = self.stored_count();
        if stored < COUNT_SATURATED {
            self.set_stored_count(stored - n as u16);
        } else {
            // a stored 65535 is a marker, not a count; rescan and store
            // the real count once it fits again
            let real = self.scan_len();
            if real < COUNT_SATURATED as usize {
                trace!("entry count left saturation, storing {real}");
                self.set_stored_count(real as u16);
            }
        }
    }

    fn stored_count(&self) -> u16 {
        read_u16(&self.buf, 8)
    }

    fn set_stored_count(&mut self, count: u16) {
        self.buf[8..10].copy_from_slice(&count.to_le_bytes());
    }

    fn tail_offset(&self) -> usize {
        read_u32(&self.buf, 4) as usize
    }

    fn set_tail_offset(&mut self, offset: usize) {
        self.buf[4..8].copy_from_slice(&(offset as u32).to_le_bytes());
    }

    fn set_total_bytes(&mut self, total: usize) {
        self.buf[0..4].copy_from_slice(&(total as u32).to_le_bytes());
    }
}

impl Default for Ziplist {
    fn default() -> Self {
        Ziplist::new()
    }
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

fn read_u16(buf: &[u8], offset: usize) -> u16 {
    let mut raw = [0u8; 2];
    raw.copy_from_slice(&buf[offset..offset + 2]);
    u16::from_le_bytes(raw)
}

pub struct ZiplistIter<'a> {
    zl: &'a Ziplist,
    offset: usize,
    index: usize,
    done: bool,
}

impl Iterator for ZiplistIter<'_> {
    type Item = ZedisResult<ZiplistEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.zl.at_end(self.offset) {
            return None;
        }
        match codec::decode_entry(&self.zl.buf, self.offset) {
            Ok((value, size)) => {
                let entry = ZiplistEntry {
                    index: self.index,
                    offset: self.offset,
                    value,
                };
                self.offset += size;
                self.index += 1;
                Some(Ok(entry))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(values: &[&[u8]]) -> Ziplist {
        let mut zl = Ziplist::new();
        for value in values {
            zl.push_back(value).unwrap();
        }
        zl
    }

    fn contents(zl: &Ziplist) -> Vec<Vec<u8>> {
        zl.iter().map(|e| e.unwrap().value).collect()
    }

    /// Round-trips through deserialize, which checks every structural
    /// invariant.
    fn check_structure(zl: &Ziplist) {
        let reloaded = Ziplist::deserialize(&zl.serialize()).unwrap();
        assert_eq!(&reloaded, zl);
    }

    #[test]
    fn test_new_is_exact_empty_form() {
        let zl = Ziplist::new();
        assert_eq!(
            zl.serialize().as_ref(),
            &[11, 0, 0, 0, 10, 0, 0, 0, 0, 0, 0xFF]
        );
        assert!(zl.is_empty());
        assert_eq!(zl.len(), 0);
        check_structure(&zl);
    }

    #[test]
    fn test_push_back_exact_bytes() {
        let mut zl = Ziplist::new();
        zl.push_back(b"5").unwrap();
        // prevlen 0, immediate tag 0xF6
        assert_eq!(
            zl.serialize().as_ref(),
            &[13, 0, 0, 0, 10, 0, 0, 0, 1, 0, 0x00, 0xF6, 0xFF]
        );
    }

    #[test]
    fn test_push_back_order_and_index() {
        let zl = filled(&[b"one", b"two", b"three"]);
        assert_eq!(zl.len(), 3);
        assert_eq!(zl.index(0).unwrap().unwrap(), b"one");
        assert_eq!(zl.index(2).unwrap().unwrap(), b"three");
        assert_eq!(zl.index(3).unwrap(), None);
        check_structure(&zl);
    }

    #[test]
    fn test_push_front_order() {
        let mut zl = Ziplist::new();
        zl.push_back(b"b").unwrap();
        zl.push_front(b"a").unwrap();
        assert_eq!(contents(&zl), vec![b"a".to_vec(), b"b".to_vec()]);
        check_structure(&zl);
    }

    #[test]
    fn test_push_front_widens_next_prevlen() {
        let mut zl = Ziplist::new();
        zl.push_back(b"tail").unwrap();
        let big = vec![b'x'; 300];
        zl.push_front(&big).unwrap();
        assert_eq!(zl.index(0).unwrap().unwrap(), big);
        assert_eq!(zl.index(1).unwrap().unwrap(), b"tail");
        check_structure(&zl);
    }

    #[test]
    fn test_integers_round_trip_through_entries() {
        let zl = filled(&[b"0", b"11", b"12", b"-1", b"1000", b"-2000000000"]);
        assert_eq!(
            contents(&zl),
            vec![
                b"0".to_vec(),
                b"11".to_vec(),
                b"12".to_vec(),
                b"-1".to_vec(),
                b"1000".to_vec(),
                b"-2000000000".to_vec(),
            ]
        );
        check_structure(&zl);
    }

    #[test]
    fn test_replace_at_grows_and_shrinks() {
        let mut zl = filled(&[b"aaa", b"bbb", b"ccc"]);
        let big = vec![b'z'; 400];
        zl.replace_at(1, &big).unwrap();
        assert_eq!(zl.index(1).unwrap().unwrap(), big);
        assert_eq!(zl.index(2).unwrap().unwrap(), b"ccc");
        check_structure(&zl);

        zl.replace_at(1, b"tiny").unwrap();
        assert_eq!(
            contents(&zl),
            vec![b"aaa".to_vec(), b"tiny".to_vec(), b"ccc".to_vec()]
        );
        check_structure(&zl);
    }

    #[test]
    fn test_replace_at_tail_and_out_of_range() {
        let mut zl = filled(&[b"a", b"b"]);
        zl.replace_at(1, b"newtail").unwrap();
        assert_eq!(zl.index(1).unwrap().unwrap(), b"newtail");
        check_structure(&zl);

        let err = zl.replace_at(2, b"nope").unwrap_err();
        assert!(matches!(err, ZedisError::IndexOutOfRange));
    }

    #[test]
    fn test_remove_from_head_with_skip() {
        let mut zl = filled(&[b"1", b"2", b"3", b"4", b"5"]);
        let removed = zl.remove_from_head(2, 1).unwrap();
        assert_eq!(removed.values, vec![b"2".to_vec(), b"3".to_vec()]);
        assert_eq!(removed.skipped, 1);
        assert!(!removed.reached_end);
        assert_eq!(
            contents(&zl),
            vec![b"1".to_vec(), b"4".to_vec(), b"5".to_vec()]
        );
        check_structure(&zl);
    }

    #[test]
    fn test_remove_from_tail_with_skip() {
        let mut zl = filled(&[b"1", b"2", b"3", b"4", b"5"]);
        let removed = zl.remove_from_tail(1, 2).unwrap();
        assert_eq!(removed.values, vec![b"3".to_vec()]);
        assert!(!removed.reached_end);
        assert_eq!(
            contents(&zl),
            vec![b"1".to_vec(), b"2".to_vec(), b"4".to_vec(), b"5".to_vec()]
        );
        check_structure(&zl);
    }

    #[test]
    fn test_remove_from_tail_multiple_walks_backward() {
        let mut zl = filled(&[b"1", b"2", b"3", b"4", b"5"]);
        let removed = zl.remove_from_tail(2, 1).unwrap();
        // removal order is tail side first
        assert_eq!(removed.values, vec![b"4".to_vec(), b"3".to_vec()]);
        assert_eq!(contents(&zl), vec![b"1".to_vec(), b"2".to_vec(), b"5".to_vec()]);
        check_structure(&zl);
    }

    #[test]
    fn test_remove_everything_resets_to_empty_form() {
        let mut zl = filled(&[b"a", b"b", b"c"]);
        let removed = zl.remove_from_head(10, 0).unwrap();
        assert_eq!(removed.values.len(), 3);
        assert!(removed.reached_end);
        assert_eq!(zl, Ziplist::new());

        let mut zl = filled(&[b"a", b"b", b"c"]);
        let removed = zl.remove_from_tail(3, 0).unwrap();
        assert_eq!(
            removed.values,
            vec![b"c".to_vec(), b"b".to_vec(), b"a".to_vec()]
        );
        assert!(removed.reached_end);
        assert_eq!(zl, Ziplist::new());
    }

    #[test]
    fn test_remove_skip_past_end() {
        let mut zl = filled(&[b"a", b"b"]);
        let removed = zl.remove_from_head(1, 5).unwrap();
        assert!(removed.values.is_empty());
        assert_eq!(removed.skipped, 2);
        assert!(removed.reached_end);
        assert_eq!(zl.len(), 2);

        let removed = zl.remove_from_tail(1, 2).unwrap();
        assert!(removed.values.is_empty());
        assert_eq!(removed.skipped, 2);
        assert!(removed.reached_end);
    }

    #[test]
    fn test_remove_head_shrinks_survivor_prevlen() {
        let mut zl = Ziplist::new();
        zl.push_back(&[b'x'; 300]).unwrap();
        zl.push_back(b"small").unwrap();
        let removed = zl.remove_from_head(1, 0).unwrap();
        assert_eq!(removed.values.len(), 1);
        assert_eq!(contents(&zl), vec![b"small".to_vec()]);
        check_structure(&zl);
    }

    #[test]
    fn test_remove_tail_repairs_skipped_survivor() {
        let mut zl = Ziplist::new();
        zl.push_back(b"a").unwrap();
        zl.push_back(&[b'y'; 400]).unwrap();
        zl.push_back(b"z").unwrap();
        // removes the 400-byte middle entry; "z" must take a fresh
        // prevlen for "a"
        let removed = zl.remove_from_tail(1, 1).unwrap();
        assert_eq!(removed.values.len(), 1);
        assert_eq!(contents(&zl), vec![b"a".to_vec(), b"z".to_vec()]);
        check_structure(&zl);
    }

    #[test]
    fn test_cascade_ripples_through_chain() {
        // entries sized just under the prevlen escape point, so one
        // large push at the front widens every field downstream
        let mut zl = Ziplist::new();
        for _ in 0..5 {
            zl.push_back(&[b'e'; 250]).unwrap();
        }
        zl.push_front(&[b'f'; 252]).unwrap();
        assert_eq!(zl.len(), 6);
        assert_eq!(zl.index(0).unwrap().unwrap(), vec![b'f'; 252]);
        assert_eq!(zl.index(5).unwrap().unwrap(), vec![b'e'; 250]);
        check_structure(&zl);

        // removing the big head shrinks the fields back down
        zl.remove_from_head(1, 0).unwrap();
        assert_eq!(zl.len(), 5);
        check_structure(&zl);
    }

    #[test]
    fn test_iterator_reports_offsets_and_indices() {
        let zl = filled(&[b"a", b"bb", b"ccc"]);
        let entries: Vec<ZiplistEntry> = zl.iter().map(|e| e.unwrap()).collect();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].index, 0);
        assert_eq!(entries[0].offset, HEADER_SIZE);
        assert!(entries[1].offset > entries[0].offset);
        assert_eq!(entries[2].value, b"ccc");
    }

    #[test]
    fn test_merge_back() {
        let mut front = filled(&[b"1", b"2"]);
        let back = filled(&[b"3", b"4", b"5"]);
        front.merge_back(&back).unwrap();
        assert_eq!(front.len(), 5);
        assert_eq!(
            contents(&front),
            vec![
                b"1".to_vec(),
                b"2".to_vec(),
                b"3".to_vec(),
                b"4".to_vec(),
                b"5".to_vec(),
            ]
        );
        check_structure(&front);
    }

    #[test]
    fn test_merge_back_widens_boundary_prevlen() {
        let mut front = Ziplist::new();
        front.push_back(&[b'x'; 300]).unwrap();
        let back = filled(&[b"a", b"b"]);
        front.merge_back(&back).unwrap();
        assert_eq!(front.len(), 3);
        assert_eq!(front.index(1).unwrap().unwrap(), b"a");
        check_structure(&front);
    }

    #[test]
    fn test_merge_back_empty_cases() {
        let mut zl = filled(&[b"a"]);
        zl.merge_back(&Ziplist::new()).unwrap();
        assert_eq!(zl.len(), 1);

        let mut empty = Ziplist::new();
        let other = filled(&[b"x", b"y"]);
        empty.merge_back(&other).unwrap();
        assert_eq!(empty, other);
    }

    #[test]
    fn test_serialize_deserialize_round_trip() {
        let zl = filled(&[b"hello", b"1000", b"100000000", b""]);
        let bytes = zl.serialize();
        let reloaded = Ziplist::deserialize(&bytes).unwrap();
        assert_eq!(reloaded, zl);
        assert_eq!(contents(&reloaded), contents(&zl));
    }

    #[test]
    fn test_deserialize_rejects_corruption() {
        let zl = filled(&[b"hello", b"world"]);
        let good = zl.serialize().to_vec();

        // truncated
        assert!(Ziplist::deserialize(&good[..good.len() - 2]).is_err());

        // wrong total bytes
        let mut bad = good.clone();
        bad[0] = bad[0].wrapping_add(1);
        assert!(Ziplist::deserialize(&bad).is_err());

        // missing terminator
        let mut bad = good.clone();
        let last = bad.len() - 1;
        bad[last] = 0x00;
        assert!(Ziplist::deserialize(&bad).is_err());

        // wrong tail offset
        let mut bad = good.clone();
        bad[4] = bad[4].wrapping_add(1);
        assert!(Ziplist::deserialize(&bad).is_err());

        // wrong entry count
        let mut bad = good.clone();
        bad[8] = 9;
        assert!(Ziplist::deserialize(&bad).is_err());

        // corrupt entry tag (0xF0 is the unsupported 24-bit form)
        let mut bad = good.clone();
        bad[HEADER_SIZE + 1] = 0xF0;
        assert!(Ziplist::deserialize(&bad).is_err());

        // second entry's prevlen no longer matches its predecessor
        let mut bad = good.clone();
        bad[HEADER_SIZE + 7] = 0;
        assert!(Ziplist::deserialize(&bad).is_err());
    }

    #[test]
    fn test_deserialize_empty() {
        let zl = Ziplist::deserialize(&Ziplist::new().serialize()).unwrap();
        assert!(zl.is_empty());
    }

    #[test]
    fn test_len_saturates_and_rescans() {
        let mut zl = Ziplist::new();
        for _ in 0..70_000 {
            zl.push_back(b"0").unwrap();
        }
        assert_eq!(zl.len(), 70_000);
        zl.remove_from_head(5_000, 0).unwrap();
        assert_eq!(zl.len(), 65_000);
        check_structure(&zl);
    }

    #[test]
    fn test_saturated_count_restored_after_shrink() {
        let mut zl = Ziplist::new();
        for _ in 0..70_000 {
            zl.push_back(b"0").unwrap();
        }
        zl.remove_from_head(1_000, 0).unwrap();
        // count still over the bound, marker unchanged
        assert_eq!(&zl.serialize()[8..10], &COUNT_SATURATED.to_le_bytes());
        zl.remove_from_tail(3_466, 0).unwrap();
        assert_eq!(zl.len(), 65_534);
        let bytes = zl.serialize();
        assert_eq!(&bytes[8..10], &65_534u16.to_le_bytes());
        let reloaded = Ziplist::deserialize(&bytes).unwrap();
        assert_eq!(reloaded.len(), 65_534);
    }
}
