use bytes::Bytes;

use crate::codec;
use crate::error::{ZedisError, ZedisResult};
use crate::ziplist::Ziplist;

/// A small hash stored as alternating key and value entries in one
/// compact buffer. Keys sit at even indices. Lookups compare encoded
/// bytes, so a probe key normalizes exactly the way stored keys did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zipmap {
    zl: Ziplist,
}

struct ZipmapSlot {
    key_index: usize,
    value: Vec<u8>,
}

impl Zipmap {
    pub fn new() -> Self {
        Zipmap { zl: Ziplist::new() }
    }

    /// Number of key/value pairs.
    pub fn len(&self) -> usize {
        self.zl.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.zl.is_empty()
    }

    /// Insert or update a pair. Returns true when the key was newly
    /// added.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> ZedisResult<bool> {
        match self.find(key)? {
            Some(slot) => {
                self.zl.replace_at(slot.key_index + 1, value)?;
                Ok(false)
            }
            None => {
                self.zl.push_back(key)?;
                self.zl.push_back(value)?;
                Ok(true)
            }
        }
    }

    pub fn get(&self, key: &[u8]) -> ZedisResult<Option<Vec<u8>>> {
        Ok(self.find(key)?.map(|slot| slot.value))
    }

    /// Remove a pair. Returns true when the key existed.
    pub fn del(&mut self, key: &[u8]) -> ZedisResult<bool> {
        match self.find(key)? {
            Some(slot) => {
                self.zl.remove_from_head(2, slot.key_index)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn exists(&self, key: &[u8]) -> ZedisResult<bool> {
        Ok(self.find(key)?.is_some())
    }

    /// Key/value pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = ZedisResult<(Vec<u8>, Vec<u8>)>> + '_ {
        let mut entries = self.zl.iter();
        std::iter::from_fn(move || {
            let key = match entries.next() {
                Some(Ok(entry)) => entry.value,
                Some(Err(e)) => return Some(Err(e)),
                None => return None,
            };
            match entries.next() {
                Some(Ok(entry)) => Some(Ok((key, entry.value))),
                Some(Err(e)) => Some(Err(e)),
                None => Some(Err(ZedisError::CorruptEncoding(
                    "key entry without a value".into(),
                ))),
            }
        })
    }

    pub fn serialize(&self) -> Bytes {
        self.zl.serialize()
    }

    /// Rebuild from serialized bytes. The buffer must validate as a
    /// compact list and hold an even number of entries.
    pub fn deserialize(data: &[u8]) -> ZedisResult<Zipmap> {
        let zl = Ziplist::deserialize(data)?;
        if zl.len() % 2 != 0 {
            return Err(ZedisError::CorruptEncoding(
                "odd entry count in hash encoding".into(),
            ));
        }
        Ok(Zipmap { zl })
    }

    /// Walk key entries, comparing encoded bytes against the encoded
    /// probe. Capturing the value entry here spares `get` a second
    /// walk.
    fn find(&self, key: &[u8]) -> ZedisResult<Option<ZipmapSlot>> {
        let probe = codec::encode_value(key);
        let mut entries = self.zl.iter();
        while let Some(entry) = entries.next() {
            let key_entry = entry?;
            let value_entry = match entries.next() {
                Some(value_entry) => value_entry?,
                None => {
                    return Err(ZedisError::CorruptEncoding(
                        "key entry without a value".into(),
                    ));
                }
            };
            if self.zl.encoded_value_at(key_entry.offset)? == probe.as_slice() {
                return Ok(Some(ZipmapSlot {
                    key_index: key_entry.index,
                    value: value_entry.value,
                }));
            }
        }
        Ok(None)
    }
}

impl Default for Zipmap {
    fn default() -> Self {
        Zipmap::new()
    }
}
