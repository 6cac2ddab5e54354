//! Bounds-checked reader over datagram bytes.

use crate::errors::PipelineError;

/// Forward-only position within a byte slice.
///
/// Every access is checked against the slice length; reading or advancing
/// past the end yields [`PipelineError::FieldUnderrun`].
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn underrun(&self, needed: usize) -> PipelineError {
        PipelineError::FieldUnderrun {
            offset: self.pos,
            needed,
            len: self.data.len(),
        }
    }

    /// Byte `ahead` positions past the cursor, without moving.
    pub fn peek(&self, ahead: usize) -> Result<u8, PipelineError> {
        self.pos
            .checked_add(ahead)
            .and_then(|i| self.data.get(i).copied())
            .ok_or_else(|| self.underrun(ahead.saturating_add(1)))
    }

    pub fn advance(&mut self, n: usize) -> Result<(), PipelineError> {
        if n > self.remaining() {
            return Err(self.underrun(n));
        }
        self.pos += n;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, PipelineError> {
        let b = self.peek(0)?;
        self.pos += 1;
        Ok(b)
    }

    /// Take `n` bytes and move past them.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], PipelineError> {
        if n > self.remaining() {
            return Err(self.underrun(n));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }
}
