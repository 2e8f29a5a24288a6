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


//! Measuring the data reachable from a pointer without copying it.

use core::cell::Cell;

use crate::message::CopyOptions;
use crate::pointer::{ElementSize, PointerShape, WirePointer, WirePointerKind};
use crate::private::bounds::bounds_check;
use crate::private::read_limiter::ReadLimiter;
use crate::private::units::*;
use crate::{Error, ErrorKind, MessageSize, Result};

/// Counts the words reachable from `pointer`, stored at `src_pos` of `src`, not including
/// the pointer itself. This is exactly the number of words that a copy of the same pointer
/// appends to a destination.
///
/// The walk applies the same bounds checks and limits as a copy, and fails in the same
/// places.
pub fn total_size(
    src: &[u8],
    pointer: u64,
    src_pos: ByteCount,
    options: CopyOptions,
) -> Result<MessageSize> {
    let pointer = WirePointer::from(pointer);
    let walker = Walker::start(src, pointer, src_pos, &options)?;
    let word_count = walker.total_size(pointer, src_pos as i64, options.nesting_limit)?;
    Ok(MessageSize {
        word_count,
        cap_count: 0,
    })
}

/// Whether the objects reachable from `pointer` already sit back to back, in the order a copy
/// would lay them out, starting at the pointer's target. Copying a compact value reproduces
/// the same bytes, so there is nothing to gain from it.
///
/// Zero-sized objects take no space and may point anywhere. A null pointer is compact.
pub fn is_compact(
    src: &[u8],
    pointer: u64,
    src_pos: ByteCount,
    options: CopyOptions,
) -> Result<bool> {
    let pointer = WirePointer::from(pointer);
    let walker = Walker::start(src, pointer, src_pos, &options)?;
    walker.total_size(pointer, src_pos as i64, options.nesting_limit)?;
    Ok(walker.compact.get())
}

struct Walker<'a> {
    src: &'a [u8],
    read_limiter: ReadLimiter,
    /// Where the next non-empty object has to start for the layout to be compact.
    next: Cell<i64>,
    compact: Cell<bool>,
}

impl<'a> Walker<'a> {
    fn start(
        src: &'a [u8],
        pointer: WirePointer,
        src_pos: ByteCount,
        options: &CopyOptions,
    ) -> Result<Self> {
        let src_pos = i64::try_from(src_pos).unwrap_or(i64::MAX);
        bounds_check(src_pos, 0, src.len())?;
        Ok(Self {
            src,
            read_limiter: ReadLimiter::new(options.traversal_limit_in_words),
            next: Cell::new(pointer.deref(src_pos)),
            compact: Cell::new(true),
        })
    }

    fn check_read(&self, pos: i64, length: ByteCount) -> Result<()> {
        bounds_check(pos, length, self.src.len())?;
        self.read_limiter.can_read(round_bytes_up_to_words(length))
    }

    /// Records an object of `words` words at `pos`.
    fn place(&self, pos: i64, words: WordCount) {
        if words == 0 {
            return;
        }
        if pos != self.next.get() {
            self.compact.set(false);
        }
        self.next.set(pos + (words * BYTES_PER_WORD) as i64);
    }

    fn read_pointer(&self, pos: ByteCount) -> WirePointer {
        let mut bytes = [0u8; BYTES_PER_WORD];
        bytes.copy_from_slice(&self.src[pos..pos + BYTES_PER_WORD]);
        WirePointer::from_le_bytes(bytes)
    }

    fn total_size(&self, pointer: WirePointer, src_pos: i64, nesting_limit: i32) -> Result<u64> {
        let shape = pointer.shape();
        match shape {
            PointerShape::Null => return Ok(0),
            PointerShape::Far { .. } => {
                return Err(Error::from_kind(ErrorKind::FarPointersNotSupported))
            }
            PointerShape::Other { .. } => {
                return Err(Error::from_kind(ErrorKind::UnsupportedPointerKind))
            }
            PointerShape::Struct { .. } | PointerShape::List { .. } => {}
        }
        if nesting_limit <= 0 {
            return Err(Error::from_kind(ErrorKind::NestingLimitExceeded));
        }
        let pos = pointer.deref(src_pos);

        match shape {
            PointerShape::Struct {
                data_size,
                ptr_count,
                ..
            } => {
                let words = pointer.struct_word_size() as usize;
                self.check_read(pos, words * BYTES_PER_WORD)?;
                self.place(pos, words);
                let data_bytes = usize::from(data_size) * BYTES_PER_WORD;
                let children = self.pointers_size(
                    usize::from(ptr_count),
                    pos + data_bytes as i64,
                    nesting_limit - 1,
                )?;
                Ok(words as u64 + children)
            }
            PointerShape::List {
                element_size: ElementSize::InlineComposite,
                element_count: word_count,
                ..
            } => self.struct_list_size(word_count, pos, nesting_limit),
            PointerShape::List {
                element_size: ElementSize::Pointer,
                element_count,
                ..
            } => {
                let count = element_count as usize;
                self.check_read(pos, count * BYTES_PER_POINTER)?;
                self.place(pos, count);
                let children = self.pointers_size(count, pos, nesting_limit - 1)?;
                Ok(count as u64 + children)
            }
            PointerShape::List {
                element_size,
                element_count,
                ..
            } => {
                let body_length = element_size.body_length_in_bytes(element_count);
                self.check_read(pos, body_length)?;
                if element_size == ElementSize::Void {
                    self.read_limiter.can_read(element_count as usize)?;
                }
                let words = round_bytes_up_to_words(body_length);
                self.place(pos, words);
                Ok(words as u64)
            }
            PointerShape::Null | PointerShape::Far { .. } | PointerShape::Other { .. } => {
                unreachable!()
            }
        }
    }

    /// Counts the declared word count plus the tag, so that the result matches what a
    /// copy reproduces even when the tag describes fewer elements than the list has room for.
    fn struct_list_size(
        &self,
        word_count: WordCount32,
        pos: i64,
        nesting_limit: i32,
    ) -> Result<u64> {
        let body_length = ElementSize::InlineComposite.body_length_in_bytes(word_count);
        self.check_read(pos, body_length)?;

        let tag = self.read_pointer(pos as usize);
        if tag.kind() != WirePointerKind::Struct {
            return Err(Error::from_kind(
                ErrorKind::InlineCompositeListWithNonStructElementsNotSupported,
            ));
        }
        let element_count = tag.inline_composite_list_element_count();
        let words_per_element = tag.struct_word_size();
        if u64::from(words_per_element) * u64::from(element_count) > u64::from(word_count) {
            return Err(Error::from_kind(
                ErrorKind::InlineCompositeListOverrunsItsWordCount,
            ));
        }
        if words_per_element == 0 {
            self.read_limiter.can_read(element_count as usize)?;
        }
        self.place(pos, body_length / BYTES_PER_WORD);

        let mut result = u64::from(word_count) + POINTER_SIZE_IN_WORDS as u64;
        let ptr_count = usize::from(tag.struct_ptr_count());
        if ptr_count > 0 {
            let item_length = words_per_element as usize * BYTES_PER_WORD;
            let data_bytes = usize::from(tag.struct_data_size()) * BYTES_PER_WORD;
            for i in 0..element_count as usize {
                let offset = BYTES_PER_WORD + item_length * i + data_bytes;
                result += self.pointers_size(ptr_count, pos + offset as i64, nesting_limit - 1)?;
            }
        }
        Ok(result)
    }

    fn pointers_size(
        &self,
        count: WirePointerCount,
        src_pos: i64,
        nesting_limit: i32,
    ) -> Result<u64> {
        bounds_check(src_pos, count * BYTES_PER_POINTER, self.src.len())?;
        let start = src_pos as usize;
        let mut result = 0;
        for i in 0..count {
            let offset = i * BYTES_PER_POINTER;
            let pointer = self.read_pointer(start + offset);
            if !pointer.is_null() {
                result += self.total_size(pointer, src_pos + offset as i64, nesting_limit)?;
            }
        }
        Ok(result)
    }
}
