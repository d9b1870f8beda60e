//! Line framing over a non-blocking byte stream.

use std::io::{self, Read};

use super::errors::ReaderError;

/// Outcome of one [`CommandReader::fill`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// New bytes were buffered.
    Data,
    /// Nothing was available yet.
    Idle,
    /// The stream reached end of file.
    Closed,
}

/// Frames a byte stream into newline-terminated records.
///
/// Bytes after the last newline are kept for the next read. The buffer is
/// bounded; a line longer than the bound is an error.
#[derive(Debug)]
pub struct CommandReader<R> {
    source: R,
    buffer: Vec<u8>,
    capacity: usize,
    scanned: usize,
}

impl<R: Read> CommandReader<R> {
    /// Creates a reader holding at most `capacity` unframed bytes.
    pub fn new(source: R, capacity: usize) -> Self {
        Self {
            source,
            buffer: Vec::new(),
            capacity,
            scanned: 0,
        }
    }

    /// Reads whatever the source has available.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::CommandTooLong`] when the buffer is already
    /// full, or [`ReaderError::Read`] when the source fails. A source that
    /// would block is not an error.
    pub fn fill(&mut self) -> Result<ReadStatus, ReaderError> {
        if self.buffer.len() >= self.capacity {
            self.check_overflow()?;
            return Ok(ReadStatus::Idle);
        }
        let start = self.buffer.len();
        self.buffer.resize(self.capacity, 0);

        let result = loop {
            match self
                .source
                .read(self.buffer.get_mut(start..).unwrap_or_default())
            {
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                other => break other,
            }
        };

        match result {
            Ok(0) => {
                self.buffer.truncate(start);
                Ok(ReadStatus::Closed)
            }
            Ok(read) => {
                self.buffer.truncate(start + read);
                Ok(ReadStatus::Data)
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                self.buffer.truncate(start);
                Ok(ReadStatus::Idle)
            }
            Err(source) => {
                self.buffer.truncate(start);
                Err(ReaderError::Read { source })
            }
        }
    }

    /// Removes and returns the next complete record, without its newline.
    pub fn next_record(&mut self) -> Option<Vec<u8>> {
        let Some(offset) = self
            .buffer
            .get(self.scanned..)
            .unwrap_or_default()
            .iter()
            .position(|byte| *byte == b'\n')
        else {
            self.scanned = self.buffer.len();
            return None;
        };

        let end = self.scanned + offset;
        let mut record: Vec<u8> = self.buffer.drain(..=end).collect();
        record.pop();
        self.scanned = 0;
        Some(record)
    }

    /// Fails when the buffer is full and holds no complete record.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::CommandTooLong`] on overflow.
    pub fn check_overflow(&self) -> Result<(), ReaderError> {
        if self.buffer.len() >= self.capacity && !self.buffer.contains(&b'\n') {
            return Err(ReaderError::CommandTooLong {
                limit: self.capacity,
            });
        }
        Ok(())
    }

    /// Drops any unterminated bytes, returning how many were dropped.
    pub fn discard_partial(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        self.scanned = 0;
        dropped
    }

    /// Number of bytes buffered but not yet framed.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// The underlying source.
    pub fn source(&self) -> &R {
        &self.source
    }
}
