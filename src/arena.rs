// Copyright (c) 2013-2015 Sandstorm Development Group, Inc. and contributors
// Licensed under the MIT License:
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.


//! Destination storage for copied values.

use crate::pointer::{ElementSize, WirePointer};
use crate::private::units::*;
use crate::{Error, ErrorKind, Result};

/// Growable storage that a copy writes into. Offsets are in bytes from the start of the
/// segment and stay valid for as long as the arena is alive: allocation only ever appends.
///
/// Both allocation methods zero-fill the region they reserve, so pointer slots that a copy
/// never visits read back as null. The `pos` they write a pointer to must be a word-aligned
/// slot that was allocated earlier; otherwise nothing is reserved and the call fails with
/// `ErrorKind::InvalidPointerSlot`.
pub trait BuilderArena {
    /// Reserves a struct with the given section sizes, writes a struct pointer to it at
    /// `pos`, and returns the offset of the struct's data section. The returned offset,
    /// not `pos`, locates the struct.
    fn alloc_struct(
        &mut self,
        pos: ByteCount,
        data_size: WordCount16,
        ptr_count: WirePointerCount16,
    ) -> Result<ByteCount>;

    /// Reserves a list body of `body_length` bytes, writes a list pointer to it at `pos`,
    /// and returns the offset of the body. For `InlineComposite` lists, `element_count`
    /// is the word count and `body_length` includes the tag word.
    fn alloc_list(
        &mut self,
        pos: ByteCount,
        element_size: ElementSize,
        element_count: ElementCount32,
        body_length: ByteCount,
    ) -> Result<ByteCount>;

    /// Copies `bytes` verbatim to `pos`, which must lie within an allocated region.
    fn write_bytes(&mut self, pos: ByteCount, bytes: &[u8]);

    /// Reads the word stored at `pos`.
    fn read_u64(&self, pos: ByteCount) -> u64;
}

/// A single append-only segment backed by a `Vec<u8>`.
#[derive(Debug, Default, Clone)]
pub struct SegmentBuilder {
    buf: Vec<u8>,
}

impl SegmentBuilder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Creates an empty segment with room for at least `bytes` bytes before reallocating.
    pub fn with_capacity(bytes: ByteCount) -> Self {
        Self {
            buf: Vec::with_capacity(bytes),
        }
    }

    /// Number of bytes allocated so far. Always a multiple of eight.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Appends `length` zeroed bytes, padded up to a whole number of words, and returns the
    /// offset of the first one.
    pub fn allocate(&mut self, length: ByteCount) -> ByteCount {
        let pos = self.buf.len();
        let words = round_bytes_up_to_words(length);
        self.buf.resize(pos + words * BYTES_PER_WORD, 0);
        pos
    }

    pub fn write_u64(&mut self, pos: ByteCount, value: u64) {
        self.buf[pos..pos + BYTES_PER_WORD].copy_from_slice(&value.to_le_bytes());
    }

    pub fn read_u64(&self, pos: ByteCount) -> u64 {
        let mut bytes = [0u8; BYTES_PER_WORD];
        bytes.copy_from_slice(&self.buf[pos..pos + BYTES_PER_WORD]);
        u64::from_le_bytes(bytes)
    }

    /// Fails unless `pos` is a word-aligned slot inside the allocated part of the segment.
    fn check_slot(&self, pos: ByteCount) -> Result<()> {
        if pos % BYTES_PER_WORD != 0 || pos.saturating_add(BYTES_PER_WORD) > self.buf.len() {
            return Err(Error::new(
                ErrorKind::InvalidPointerSlot,
                format!("position {pos} in a segment of {} bytes", self.buf.len()),
            ));
        }
        Ok(())
    }

    /// Offset in words from the end of a pointer stored at `pos` to `target`.
    fn relative_offset(pos: ByteCount, target: ByteCount) -> Result<i32> {
        let offset = (target as i64 - (pos + BYTES_PER_WORD) as i64) / BYTES_PER_WORD as i64;
        if offset.abs() > MAX_POINTER_OFFSET_IN_WORDS {
            return Err(Error::from_kind(ErrorKind::MessageTooLarge(target)));
        }
        Ok(offset as i32)
    }

    /// Allocates a byte list holding `value` and points the word at `pos` to it.
    pub fn alloc_data(&mut self, pos: ByteCount, value: &[u8]) -> Result<ByteCount> {
        let count = u32::try_from(value.len())
            .ok()
            .filter(|count| *count <= MAX_LIST_COUNT)
            .ok_or_else(|| Error::from_kind(ErrorKind::MessageTooLarge(value.len())))?;
        let body = self.alloc_list(pos, ElementSize::Byte, count, value.len())?;
        self.write_bytes(body, value);
        Ok(body)
    }

    /// Like `alloc_data()`, but appends the NUL terminator that text fields carry.
    pub fn alloc_text(&mut self, pos: ByteCount, value: &str) -> Result<ByteCount> {
        let mut bytes = Vec::with_capacity(value.len() + 1);
        bytes.extend_from_slice(value.as_bytes());
        bytes.push(0);
        self.alloc_data(pos, &bytes)
    }
}

impl BuilderArena for SegmentBuilder {
    fn alloc_struct(
        &mut self,
        pos: ByteCount,
        data_size: WordCount16,
        ptr_count: WirePointerCount16,
    ) -> Result<ByteCount> {
        self.check_slot(pos)?;
        let words = usize::from(data_size) + usize::from(ptr_count) * WORDS_PER_POINTER;
        let target = self.allocate(words * BYTES_PER_WORD);
        let pointer = if words == 0 {
            WirePointer::new_empty_struct()
        } else {
            WirePointer::new_struct(Self::relative_offset(pos, target)?, data_size, ptr_count)
        };
        self.write_u64(pos, pointer.raw());
        Ok(target)
    }

    fn alloc_list(
        &mut self,
        pos: ByteCount,
        element_size: ElementSize,
        element_count: ElementCount32,
        body_length: ByteCount,
    ) -> Result<ByteCount> {
        self.check_slot(pos)?;
        let target = self.allocate(body_length);
        let pointer =
            WirePointer::new_list(Self::relative_offset(pos, target)?, element_size, element_count);
        self.write_u64(pos, pointer.raw());
        Ok(target)
    }

    fn write_bytes(&mut self, pos: ByteCount, bytes: &[u8]) {
        self.buf[pos..pos + bytes.len()].copy_from_slice(bytes);
    }

    fn read_u64(&self, pos: ByteCount) -> u64 {
        SegmentBuilder::read_u64(self, pos)
    }
}
