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


//! Options for a copy, and helpers that copy a whole single-segment message.

use crate::arena::SegmentBuilder;
use crate::copy::{copy_pointer_with_options, Copier};
use crate::pointer::WirePointer;
use crate::private::bounds::bounds_check;
use crate::private::units::*;
use crate::Result;

/// Options controlling how much of the source a copy is allowed to traverse.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CopyOptions {
    /// Limits how many total words of data are allowed to be traversed. Every struct and
    /// list body read from the source counts against it, as does the element count of a
    /// list whose elements take up no space.
    ///
    /// This limit exists for security reasons. It is possible for an attacker to construct a
    /// message in which multiple pointers point at the same location. This is technically
    /// invalid, but hard to detect. Using such a message, an attacker could cause a message
    /// which is small on the wire to produce a much larger copy, possibly exhausting memory.
    pub traversal_limit_in_words: u64,

    /// Limits how deeply nested a message structure can be, e.g. structs containing other
    /// structs or lists of structs.
    ///
    /// The copy recurses once per level of nesting, so an attacker could otherwise cause a
    /// stack overflow by sending a very deeply nested message. Pointers are resolved relative
    /// to their own location, so a hostile message can also loop back on itself; this limit
    /// bounds such a loop too.
    pub nesting_limit: i32,
}

pub const DEFAULT_COPY_OPTIONS: CopyOptions = CopyOptions {
    traversal_limit_in_words: 8 * 1024 * 1024,
    nesting_limit: 64,
};

impl Default for CopyOptions {
    fn default() -> Self {
        DEFAULT_COPY_OPTIONS
    }
}

impl CopyOptions {
    pub fn new() -> Self {
        DEFAULT_COPY_OPTIONS
    }

    pub fn nesting_limit(&mut self, value: i32) -> &mut Self {
        self.nesting_limit = value;
        self
    }

    pub fn traversal_limit_in_words(&mut self, value: u64) -> &mut Self {
        self.traversal_limit_in_words = value;
        self
    }
}

/// Copies the message whose root pointer is the first word of `src` into a fresh segment.
///
/// The result starts with the new root pointer and holds every reachable object exactly
/// once, in depth-first order, with nothing in between.
pub fn copy_message(src: &[u8], options: CopyOptions) -> Result<Vec<u8>> {
    bounds_check(0, BYTES_PER_WORD, src.len())?;
    let mut root = [0u8; BYTES_PER_WORD];
    root.copy_from_slice(&src[..BYTES_PER_WORD]);

    let mut dst = SegmentBuilder::with_capacity(src.len());
    let root_pos = dst.allocate(BYTES_PER_WORD);
    copy_pointer_with_options(
        src,
        u64::from_le_bytes(root),
        0,
        &mut dst,
        root_pos,
        options,
    )?;
    Ok(dst.into_bytes())
}

/// Copies the struct whose data section starts at `data_offset` of `src` into a fresh
/// segment, as the root of a new message.
pub fn compact_struct(
    src: &[u8],
    data_offset: ByteCount,
    data_size: WordCount16,
    ptr_count: WirePointerCount16,
    options: CopyOptions,
) -> Result<Vec<u8>> {
    bounds_check(
        i64::try_from(data_offset).unwrap_or(i64::MAX),
        0,
        src.len(),
    )?;

    // A pointer with offset -1 stored at `data_offset` resolves to `data_offset` and,
    // unlike offset 0, is never null.
    let pointer = WirePointer::new_struct(-1, data_size, ptr_count);
    log::debug!("compacting {data_size}+{ptr_count}-word struct at {data_offset}");

    let mut dst = SegmentBuilder::new();
    let root_pos = dst.allocate(BYTES_PER_WORD);
    Copier::new(src, &mut dst, &options).copy(
        pointer,
        data_offset as i64,
        root_pos,
        options.nesting_limit,
    )?;
    Ok(dst.into_bytes())
}
