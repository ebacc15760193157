//! Pending data chunks handed out by id.
//!
//! Data replies carry their payload out of band: the bytes are parked here
//! under a fresh id and the receiver collects them once with
//! `receive_chunk_data`.

use std::collections::BTreeMap;

pub type ChunkId = u32;

/// Requested representation of a stored chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkType {
    #[default]
    Octet,
    String,
}

impl ChunkType {
    /// Parses the host's chunk type name; anything but `string` is `octet`.
    pub fn parse(value: &str) -> Self {
        match value {
            "string" => Self::String,
            _ => Self::Octet,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Octet => "octet",
            Self::String => "string",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkData {
    Octet(Vec<u8>),
    Text(String),
}

/// Id-keyed chunk storage. Ids start at 1 and are never reused.
#[derive(Debug)]
pub struct ChunkStore {
    next_id: ChunkId,
    chunks: BTreeMap<ChunkId, Vec<u8>>,
}

impl Default for ChunkStore {
    fn default() -> Self {
        Self {
            next_id: 1,
            chunks: BTreeMap::new(),
        }
    }
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a non-empty chunk and returns its id. Empty chunks are not
    /// stored.
    pub fn store(&mut self, bytes: Vec<u8>) -> Option<ChunkId> {
        if bytes.is_empty() {
            return None;
        }
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.chunks.insert(id, bytes);
        Some(id)
    }

    /// Removes and returns a chunk in the requested representation.
    pub fn take(&mut self, id: ChunkId, chunk_type: ChunkType) -> Option<ChunkData> {
        let bytes = self.chunks.remove(&id)?;
        Some(match chunk_type {
            ChunkType::Octet => ChunkData::Octet(bytes),
            ChunkType::String => ChunkData::Text(String::from_utf8_lossy(&bytes).into_owned()),
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{ChunkData, ChunkStore, ChunkType};

    #[test]
    fn ids_start_at_one_and_increase() {
        let mut store = ChunkStore::new();
        assert_eq!(store.store(vec![1]), Some(1));
        assert_eq!(store.store(vec![2]), Some(2));
        assert_eq!(store.store(Vec::new()), None);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn take_removes_chunk_in_requested_form() {
        let mut store = ChunkStore::new();
        let id = store.store(b"hello".to_vec()).expect("stored");

        assert_eq!(
            store.take(id, ChunkType::String),
            Some(ChunkData::Text("hello".to_string()))
        );
        assert_eq!(store.take(id, ChunkType::Octet), None);
        assert!(store.is_empty());
    }

    #[test]
    fn unknown_chunk_type_names_default_to_octet() {
        assert_eq!(ChunkType::parse("string"), ChunkType::String);
        assert_eq!(ChunkType::parse("octet"), ChunkType::Octet);
        assert_eq!(ChunkType::parse("blob"), ChunkType::Octet);
    }
}
