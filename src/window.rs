//! Bounded view over an immutable byte buffer.
//!
//! Cache files are laid out from both ends: headers at the front, EOF records and
//! digests at the back. `ByteWindow` keeps a `start..end` range into the original
//! buffer and narrows it from either side without copying.

use crate::error::FormatError;
use zerocopy::FromBytes;

#[derive(Clone, Copy, Debug)]
pub struct ByteWindow<'a> {
    buf: &'a [u8],
    start: usize,
    end: usize,
}

impl<'a> ByteWindow<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        ByteWindow { buf, start: 0, end: buf.len() }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Offset of the window start within the original buffer.
    pub fn offset(&self) -> usize {
        self.start
    }

    pub fn as_slice(&self) -> &'a [u8] {
        &self.buf[self.start..self.end]
    }

    /// Consume `n` bytes from the front.
    pub fn take_front(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], FormatError> {
        self.check(n, what)?;
        let taken = &self.buf[self.start..self.start + n];
        self.start += n;
        Ok(taken)
    }

    /// Consume `n` bytes from the back.
    pub fn take_back(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], FormatError> {
        self.check(n, what)?;
        let taken = &self.buf[self.end - n..self.end];
        self.end -= n;
        Ok(taken)
    }

    pub fn read_front<T: FromBytes>(&mut self, what: &'static str) -> Result<T, FormatError> {
        let bytes = self.take_front(std::mem::size_of::<T>(), what)?;
        Ok(read_record(bytes))
    }

    pub fn read_back<T: FromBytes>(&mut self, what: &'static str) -> Result<T, FormatError> {
        let bytes = self.take_back(std::mem::size_of::<T>(), what)?;
        Ok(read_record(bytes))
    }

    fn check(&self, n: usize, what: &'static str) -> Result<(), FormatError> {
        if n > self.len() {
            return Err(FormatError::Truncated { what, needed: n, available: self.len() });
        }
        Ok(())
    }
}

// Callers always pass exactly size_of::<T>() bytes, so `read_from` cannot fail.
fn read_record<T: FromBytes>(bytes: &[u8]) -> T {
    match T::read_from(bytes) {
        Some(record) => record,
        None => unreachable!("record slice sized to its type"),
    }
}
