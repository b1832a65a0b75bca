use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use log::{debug, info};

use crate::codec::varbyte;
use crate::config::{BLOCK_LEN_BYTES, BLOCK_SIZE, CHUNK_HEADER_BYTES, POSTINGS_PER_CHUNK};
use crate::index::lexicon::{Lexicon, LexiconEntry};
use crate::indexer::run_merger::RunReader;
use crate::utils::posting::Posting;

// Final index layout, per term: a run of blocks, each at most
// BLOCK_SIZE bytes. A block is
//   u32 chunkCount            (little-endian, like every u32 below)
//   chunkCount x u32          last docId per chunk
//   chunkCount x u32          docId byte size per chunk
//   chunkCount x u32          freq byte size per chunk
//   per chunk: varbyte docId gaps, then varbyte freqs
// Gap state resets at every chunk boundary so a chunk decodes on its
// own given the header.

struct EncodedChunk {
    last_doc_id: u32,
    doc_id_bytes: Vec<u8>,
    freq_bytes: Vec<u8>,
}

impl EncodedChunk {
    fn cost(&self) -> usize {
        CHUNK_HEADER_BYTES + self.doc_id_bytes.len() + self.freq_bytes.len()
    }
}

fn encode_chunks(postings: &[Posting]) -> io::Result<Vec<EncodedChunk>> {
    let mut chunks = Vec::with_capacity(postings.len().div_ceil(POSTINGS_PER_CHUNK));
    for group in postings.chunks(POSTINGS_PER_CHUNK) {
        let mut doc_id_bytes = Vec::new();
        let mut freq_bytes = Vec::new();
        let mut prev_doc_id = 0u32;
        for posting in group {
            let gap = posting.doc_id.checked_sub(prev_doc_id).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("docIds out of order at {}", posting.doc_id),
                )
            })?;
            if gap == 0 && prev_doc_id != 0 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("duplicate docId {} in merged postings", posting.doc_id),
                ));
            }
            varbyte::encode_into(gap, &mut doc_id_bytes);
            varbyte::encode_into(posting.freq, &mut freq_bytes);
            prev_doc_id = posting.doc_id;
        }
        chunks.push(EncodedChunk {
            last_doc_id: prev_doc_id,
            doc_id_bytes,
            freq_bytes,
        });
    }
    Ok(chunks)
}

/// Appends one term's postings as packed blocks and returns the block
/// count. Blocks take whole chunks greedily while header plus payload
/// stays within BLOCK_SIZE; a chunk is never split.
pub fn encode_posting_list(postings: &[Posting], out: &mut Vec<u8>) -> io::Result<u32> {
    let chunks = encode_chunks(postings)?;
    let mut block_count = 0u32;
    let mut next = 0;
    while next < chunks.len() {
        let start = next;
        let mut block_bytes = BLOCK_LEN_BYTES;
        while next < chunks.len() {
            let cost = chunks[next].cost();
            if next > start && block_bytes + cost > BLOCK_SIZE {
                break;
            }
            block_bytes += cost;
            next += 1;
        }

        let in_block = &chunks[start..next];
        out.extend_from_slice(&(in_block.len() as u32).to_le_bytes());
        for chunk in in_block {
            out.extend_from_slice(&chunk.last_doc_id.to_le_bytes());
        }
        for chunk in in_block {
            out.extend_from_slice(&(chunk.doc_id_bytes.len() as u32).to_le_bytes());
        }
        for chunk in in_block {
            out.extend_from_slice(&(chunk.freq_bytes.len() as u32).to_le_bytes());
        }
        for chunk in in_block {
            out.extend_from_slice(&chunk.doc_id_bytes);
            out.extend_from_slice(&chunk.freq_bytes);
        }
        block_count += 1;
    }
    Ok(block_count)
}

/// Re-encodes the merged postings stream into the final index file,
/// recording every term's byte range into the lexicon.
pub fn build_final_index(
    merged_path: &Path,
    index_path: &Path,
    lexicon: &mut Lexicon,
) -> io::Result<()> {
    let mut reader = RunReader::open(merged_path)?;
    let file = File::create(index_path)?;
    let mut writer = BufWriter::new(file);

    let mut begin_pos = 0u64;
    let mut buffer = Vec::new();
    while let Some((term, postings)) = reader.take_and_advance()? {
        buffer.clear();
        let block_count = encode_posting_list(&postings, &mut buffer)?;
        writer.write_all(&buffer)?;
        let end_pos = begin_pos + buffer.len() as u64;
        if block_count > 1 {
            debug!(
                "term {:?}: {} postings across {} blocks",
                term,
                postings.len(),
                block_count
            );
        }
        lexicon.insert(
            &term,
            LexiconEntry {
                begin_pos,
                end_pos,
                doc_freq: postings.len() as u32,
                block_count,
            },
        );
        begin_pos = end_pos;
    }
    writer.flush()?;
    info!(
        "encoded final index: {} terms, {} bytes",
        lexicon.len(),
        begin_pos
    );
    Ok(())
}
