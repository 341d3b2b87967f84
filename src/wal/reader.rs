//! WAL Reader
//!
//! Sequential frame reader over a WAL file, distinguishing clean EOF, a
//! torn tail and complete-but-corrupt records.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::Result;

use super::entry::{FRAME_HEADER_SIZE, MAX_FRAME_SIZE};
use super::LogRecord;

/// Result of reading one frame
#[derive(Debug)]
pub enum ReadOutcome {
    /// A complete record whose checksum verified; `offset` is its frame start
    Record { offset: u64, record: LogRecord },

    /// A complete frame that failed to decode or verify
    Corrupt { offset: u64, reason: String },

    /// No further frames. `torn` is set when trailing bytes form an
    /// incomplete frame; `offset` is where the last complete frame ended.
    End { offset: u64, torn: bool },
}

/// Raw frame read, before decoding
pub(crate) enum Frame {
    Payload(Vec<u8>),
    End,
    Torn,
}

/// Read one `[len][payload]` frame, given how many bytes remain in the file
pub(crate) fn read_frame<R: Read>(reader: &mut R, remaining: u64) -> Result<Frame> {
    if remaining == 0 {
        return Ok(Frame::End);
    }
    if remaining < FRAME_HEADER_SIZE {
        return Ok(Frame::Torn);
    }

    let mut len_buf = [0u8; FRAME_HEADER_SIZE as usize];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf);

    if len > MAX_FRAME_SIZE || u64::from(len) > remaining - FRAME_HEADER_SIZE {
        return Ok(Frame::Torn);
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    Ok(Frame::Payload(payload))
}

/// Reads records from a WAL file in append order
pub struct WalReader {
    reader: BufReader<File>,
    /// Start of the next frame
    offset: u64,
    file_len: u64,
    done: bool,
}

impl WalReader {
    /// Open a WAL file for reading from the beginning
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_at(path, 0)
    }

    /// Open a WAL file positioned at `offset` (must be a frame boundary,
    /// e.g. an LSN)
    pub fn open_at(path: &Path, offset: u64) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let offset = offset.min(file_len);
        file.seek(SeekFrom::Start(offset))?;

        Ok(Self {
            reader: BufReader::new(file),
            offset,
            file_len,
            done: false,
        })
    }

    /// Offset of the next frame to be read
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// Read the next frame
    pub fn next_outcome(&mut self) -> Result<ReadOutcome> {
        if self.done {
            return Ok(ReadOutcome::End {
                offset: self.offset,
                torn: false,
            });
        }

        let start = self.offset;
        let payload = match read_frame(&mut self.reader, self.file_len - start)? {
            Frame::Payload(payload) => payload,
            Frame::End => {
                self.done = true;
                return Ok(ReadOutcome::End {
                    offset: start,
                    torn: false,
                });
            }
            Frame::Torn => {
                self.done = true;
                return Ok(ReadOutcome::End {
                    offset: start,
                    torn: true,
                });
            }
        };
        self.offset = start + FRAME_HEADER_SIZE + payload.len() as u64;

        let record = match LogRecord::decode(&payload) {
            Ok(record) => record,
            Err(e) => {
                return Ok(ReadOutcome::Corrupt {
                    offset: start,
                    reason: e.to_string(),
                })
            }
        };

        if let Err(e) = record.verify() {
            return Ok(ReadOutcome::Corrupt {
                offset: start,
                reason: e.to_string(),
            });
        }

        Ok(ReadOutcome::Record {
            offset: start,
            record,
        })
    }
}

impl Iterator for WalReader {
    /// Valid records only; corrupt frames are skipped, a torn tail ends
    /// iteration
    type Item = Result<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.next_outcome() {
                Ok(ReadOutcome::Record { record, .. }) => return Some(Ok(record)),
                Ok(ReadOutcome::Corrupt { .. }) => continue,
                Ok(ReadOutcome::End { .. }) => return None,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
