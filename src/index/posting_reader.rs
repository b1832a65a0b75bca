use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::codec::varbyte;
use crate::config::{BLOCK_LEN_BYTES, CHUNK_HEADER_BYTES};
use crate::error::{EngineError, Result};
use crate::index::lexicon::LexiconEntry;
use crate::utils::posting::Posting;

/// Block header as stored on disk: three parallel per-chunk arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub last_doc_ids: Vec<u32>,
    pub doc_id_sizes: Vec<u32>,
    pub freq_sizes: Vec<u32>,
}

impl BlockHeader {
    pub fn chunk_count(&self) -> usize {
        self.last_doc_ids.len()
    }

    pub fn header_bytes(&self) -> u64 {
        (BLOCK_LEN_BYTES + CHUNK_HEADER_BYTES * self.chunk_count()) as u64
    }

    pub fn payload_bytes(&self) -> u64 {
        self.doc_id_sizes
            .iter()
            .chain(self.freq_sizes.iter())
            .map(|&s| s as u64)
            .sum()
    }

    pub fn total_bytes(&self) -> u64 {
        self.header_bytes() + self.payload_bytes()
    }

    /// The lastDocId array is strictly increasing, so its maximum is
    /// its final element.
    pub fn max_last_doc_id(&self) -> u32 {
        *self.last_doc_ids.last().unwrap_or(&0)
    }

    /// Byte offsets (docId stream, freq stream) of one chunk relative
    /// to the payload start.
    pub fn chunk_offsets(&self, chunk_index: usize) -> (u64, u64) {
        let mut offset = 0u64;
        for i in 0..chunk_index {
            offset += (self.doc_id_sizes[i] + self.freq_sizes[i]) as u64;
        }
        (offset, offset + self.doc_id_sizes[chunk_index] as u64)
    }
}

/// Read-only view over the final index file. The file is mapped once
/// and every access is pure offset arithmetic over the mapping,
/// bounds-checked against the real file length.
pub struct IndexReader {
    map: Mmap,
    len: u64,
    max_meta_size: usize,
}

impl IndexReader {
    pub fn open(path: &Path, max_meta_size: usize) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        // a zero-length file cannot be mapped; substitute an anonymous
        // page, every read is bounds-checked against `len` anyway
        let map = if len == 0 {
            memmap2::MmapOptions::new().len(1).map_anon()?.make_read_only()?
        } else {
            unsafe { Mmap::map(&file)? }
        };
        Ok(IndexReader {
            map,
            len,
            max_meta_size,
        })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn slice(&self, pos: u64, len: u64) -> Result<&[u8]> {
        let end = pos.checked_add(len).ok_or_else(|| {
            EngineError::corrupt(format!("offset overflow at {}+{}", pos, len))
        })?;
        if end > self.len {
            return Err(EngineError::corrupt(format!(
                "read of [{}, {}) past end of index ({} bytes)",
                pos, end, self.len
            )));
        }
        Ok(&self.map[pos as usize..end as usize])
    }

    fn read_u32(&self, pos: u64) -> Result<u32> {
        let bytes = self.slice(pos, 4)?;
        Ok(u32::from_le_bytes(bytes.try_into().expect("4-byte slice")))
    }

    /// Parses the block header at `pos`.
    pub fn read_block_header(&self, pos: u64) -> Result<BlockHeader> {
        let chunk_count = self.read_u32(pos)? as usize;
        let header_bytes = BLOCK_LEN_BYTES + CHUNK_HEADER_BYTES * chunk_count;
        if chunk_count == 0 || header_bytes > self.max_meta_size {
            return Err(EngineError::corrupt(format!(
                "implausible chunk count {} at {}",
                chunk_count, pos
            )));
        }
        let mut cursor = pos + BLOCK_LEN_BYTES as u64;
        let mut read_array = |this: &Self| -> Result<Vec<u32>> {
            let mut values = Vec::with_capacity(chunk_count);
            for _ in 0..chunk_count {
                values.push(this.read_u32(cursor)?);
                cursor += 4;
            }
            Ok(values)
        };
        let last_doc_ids = read_array(self)?;
        let doc_id_sizes = read_array(self)?;
        let freq_sizes = read_array(self)?;
        if !last_doc_ids.windows(2).all(|w| w[0] < w[1]) {
            return Err(EngineError::corrupt(format!(
                "lastDocId array not increasing at {}",
                pos
            )));
        }
        Ok(BlockHeader {
            last_doc_ids,
            doc_id_sizes,
            freq_sizes,
        })
    }

    /// Varbyte-decodes `len` bytes starting at `pos`.
    pub fn decode_chunk(&self, pos: u64, len: u32) -> Result<Vec<u32>> {
        varbyte::decode_all(self.slice(pos, len as u64)?)
    }

    /// Decodes one chunk's postings: gap docIds prefix-summed back to
    /// absolute ids, paired with raw frequencies.
    pub fn decode_chunk_postings(
        &self,
        header: &BlockHeader,
        payload_pos: u64,
        chunk_index: usize,
    ) -> Result<(Vec<u32>, Vec<u32>)> {
        let (doc_id_off, freq_off) = header.chunk_offsets(chunk_index);
        let mut doc_ids =
            self.decode_chunk(payload_pos + doc_id_off, header.doc_id_sizes[chunk_index])?;
        let freqs = self.decode_chunk(payload_pos + freq_off, header.freq_sizes[chunk_index])?;
        if doc_ids.len() != freqs.len() {
            return Err(EngineError::corrupt(format!(
                "chunk {}: {} docIds but {} freqs",
                chunk_index,
                doc_ids.len(),
                freqs.len()
            )));
        }
        let mut prev = 0u32;
        for doc_id in doc_ids.iter_mut() {
            prev = prev.wrapping_add(*doc_id);
            *doc_id = prev;
        }
        if doc_ids.last().copied().unwrap_or(0) != header.last_doc_ids[chunk_index] {
            return Err(EngineError::corrupt(format!(
                "chunk {}: decoded last docId {} != header {}",
                chunk_index,
                doc_ids.last().copied().unwrap_or(0),
                header.last_doc_ids[chunk_index]
            )));
        }
        Ok((doc_ids, freqs))
    }
}

/// Walks a term's blocks across `[begin_pos, end_pos)`. Iterating
/// exactly `block_count` blocks must land on `end_pos`; anything else
/// is corruption.
pub struct BlockCursor<'a> {
    reader: &'a IndexReader,
    pos: u64,
    end: u64,
    blocks_left: u32,
}

impl<'a> BlockCursor<'a> {
    pub fn new(reader: &'a IndexReader, entry: &LexiconEntry) -> Self {
        BlockCursor {
            reader,
            pos: entry.begin_pos,
            end: entry.end_pos,
            blocks_left: entry.block_count,
        }
    }

    /// Next block header plus the position of its payload.
    pub fn next_block(&mut self) -> Result<Option<(BlockHeader, u64)>> {
        if self.blocks_left == 0 {
            if self.pos != self.end {
                return Err(EngineError::corrupt(format!(
                    "block walk ended at {} instead of {}",
                    self.pos, self.end
                )));
            }
            return Ok(None);
        }
        if self.pos >= self.end {
            return Err(EngineError::corrupt(format!(
                "{} blocks left but cursor at {} >= {}",
                self.blocks_left, self.pos, self.end
            )));
        }
        let header = self.reader.read_block_header(self.pos)?;
        let payload_pos = self.pos + header.header_bytes();
        self.pos += header.total_bytes();
        self.blocks_left -= 1;
        Ok(Some((header, payload_pos)))
    }
}

/// Decodes a term's entire posting list.
pub fn full_postings(reader: &IndexReader, entry: &LexiconEntry) -> Result<Vec<Posting>> {
    let mut postings = Vec::with_capacity(entry.doc_freq as usize);
    let mut cursor = BlockCursor::new(reader, entry);
    while let Some((header, payload_pos)) = cursor.next_block()? {
        for chunk_index in 0..header.chunk_count() {
            let (doc_ids, freqs) = reader.decode_chunk_postings(&header, payload_pos, chunk_index)?;
            postings.extend(
                doc_ids
                    .into_iter()
                    .zip(freqs)
                    .map(|(doc_id, freq)| Posting::new(doc_id, freq)),
            );
        }
    }
    if postings.len() as u32 != entry.doc_freq {
        return Err(EngineError::corrupt(format!(
            "decoded {} postings, lexicon says {}",
            postings.len(),
            entry.doc_freq
        )));
    }
    Ok(postings)
}
