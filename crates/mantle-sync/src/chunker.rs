//! Chunking and reassembly of asset content.

use bytes::{Bytes, BytesMut};

/// One bounded slice of an asset's content.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub index: u32,
    pub total: u32,
    pub payload: Bytes,
}

/// Number of chunks needed for `len` bytes at `max_chunk_size` each.
pub fn total_chunks(len: usize, max_chunk_size: usize) -> u32 {
    len.div_ceil(max_chunk_size) as u32
}

/// Split a buffer into ordered chunks of at most `max_chunk_size` bytes.
/// The final chunk carries the remainder, `len - (total - 1) * max`.
/// Slices share the input buffer; nothing is copied.
pub fn split(data: &Bytes, max_chunk_size: usize) -> Vec<Chunk> {
    assert!(max_chunk_size > 0, "max_chunk_size must be positive");

    let total = total_chunks(data.len(), max_chunk_size);
    let mut chunks = Vec::with_capacity(total as usize);
    for index in 0..total {
        let start = index as usize * max_chunk_size;
        let end = (start + max_chunk_size).min(data.len());
        chunks.push(Chunk {
            index,
            total,
            payload: data.slice(start..end),
        });
    }
    chunks
}

/// Extract the chunk at `index`, or `None` past the end of the buffer.
/// The sender uses `None` to emit the terminal end-of-stream packet.
pub fn chunk_at(data: &Bytes, max_chunk_size: usize, index: u32) -> Option<Chunk> {
    assert!(max_chunk_size > 0, "max_chunk_size must be positive");

    let total = total_chunks(data.len(), max_chunk_size);
    if index >= total {
        return None;
    }
    let start = index as usize * max_chunk_size;
    let end = (start + max_chunk_size).min(data.len());
    Some(Chunk {
        index,
        total,
        payload: data.slice(start..end),
    })
}

/// Reassemble received chunks into the original buffer.
///
/// The receiver's pull protocol delivers chunks in order, but assembly
/// sorts by index anyway so a reordering transport cannot corrupt the
/// result.
pub fn assemble(mut chunks: Vec<Chunk>) -> Bytes {
    chunks.sort_by_key(|c| c.index);

    let len: usize = chunks.iter().map(|c| c.payload.len()).sum();
    let mut out = BytesMut::with_capacity(len);
    for chunk in &chunks {
        out.extend_from_slice(&chunk.payload);
    }
    out.freeze()
}
