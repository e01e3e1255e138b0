//! Record-aware CSV re-chunking that never splits a record.
//!
//! Uses the `csv` crate to properly handle embedded commas and newlines within
//! quoted fields. Records are re-serialized into an in-memory buffer; every
//! time the buffer reaches the configured byte threshold it is emitted as a
//! completed chunk and a fresh buffer is started.

use std::io::Read;

use csv::{ByteRecord, Reader, ReaderBuilder, Terminator, WriterBuilder};

use crate::error::AppError;

/// Default chunk size threshold: 100 MB.
pub const DEFAULT_CHUNK_BYTES: usize = 100 * 1024 * 1024;

/// Lazy, forward-only sequence of size-bounded CSV chunks.
///
/// Every chunk except possibly the last is at least `chunk_bytes` long. The
/// trailing buffer is always emitted once after input exhaustion, even when it
/// is below threshold or empty, so the sequence yields exactly one (possibly
/// empty) chunk for empty input.
///
/// Rows are treated uniformly: there is no header handling, and ragged rows
/// pass through unchanged.
pub struct ChunkEncoder<R: Read> {
    reader: Reader<R>,
    chunk_bytes: usize,
    buf: Vec<u8>,
    record: ByteRecord,
    finished: bool,
}

impl<R: Read> ChunkEncoder<R> {
    /// Creates an encoder over `input` that rotates chunks at `chunk_bytes`.
    pub fn new(input: R, chunk_bytes: usize) -> Self {
        let reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(input);

        Self {
            reader,
            chunk_bytes,
            buf: Vec::new(),
            record: ByteRecord::new(),
            finished: false,
        }
    }
}

impl<R: Read> Iterator for ChunkEncoder<R> {
    type Item = Result<Vec<u8>, AppError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            match self.reader.read_byte_record(&mut self.record) {
                Ok(true) => {
                    if let Err(e) = serialize_record_into(&self.record, &mut self.buf) {
                        self.finished = true;
                        return Some(Err(e));
                    }
                    if self.buf.len() >= self.chunk_bytes {
                        return Some(Ok(std::mem::take(&mut self.buf)));
                    }
                }
                Ok(false) => {
                    // Input exhausted: the trailing buffer is always emitted.
                    self.finished = true;
                    return Some(Ok(std::mem::take(&mut self.buf)));
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(AppError::CsvChunk(format!(
                        "Failed to read CSV record: {}",
                        e
                    ))));
                }
            }
        }
    }
}

/// Serializes a ByteRecord into an existing buffer using CRLF terminator.
fn serialize_record_into(record: &ByteRecord, buf: &mut Vec<u8>) -> Result<(), AppError> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .terminator(Terminator::CRLF)
        .flexible(true)
        .from_writer(buf);

    writer
        .write_byte_record(record)
        .map_err(|e| AppError::CsvChunk(format!("Failed to serialize record: {}", e)))?;

    writer
        .flush()
        .map_err(|e| AppError::CsvChunk(format!("Failed to flush writer: {}", e)))?;

    Ok(())
}
