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


//! Deep copy of a pointer's target from a flat source buffer into a [`BuilderArena`].

use crate::arena::BuilderArena;
use crate::message::CopyOptions;
use crate::pointer::{ElementSize, PointerShape, WirePointer, WirePointerKind};
use crate::private::bounds::bounds_check;
use crate::private::read_limiter::ReadLimiter;
use crate::private::units::*;
use crate::{Error, ErrorKind, Result};

/// Copies the value addressed by `pointer`, which is stored at byte offset `src_pos` of
/// `src`, into `dst`. A pointer to the copy is written at `dst_pos`, which must be a
/// word-aligned slot that `dst` has already allocated, and is also returned. Any other
/// `dst_pos` fails with `ErrorKind::InvalidPointerSlot` before anything is written.
///
/// A null `pointer` copies nothing and returns zero. On error, `dst` may hold a partial
/// copy and should be discarded.
pub fn copy_pointer<B>(
    src: &[u8],
    pointer: u64,
    src_pos: ByteCount,
    dst: &mut B,
    dst_pos: ByteCount,
) -> Result<u64>
where
    B: BuilderArena + ?Sized,
{
    copy_pointer_with_options(src, pointer, src_pos, dst, dst_pos, CopyOptions::new())
}

/// Like [`copy_pointer`], with explicit nesting and traversal limits.
pub fn copy_pointer_with_options<B>(
    src: &[u8],
    pointer: u64,
    src_pos: ByteCount,
    dst: &mut B,
    dst_pos: ByteCount,
    options: CopyOptions,
) -> Result<u64>
where
    B: BuilderArena + ?Sized,
{
    log::debug!(
        "copying pointer {pointer:#018x} stored at {src_pos} of a {}-byte source to {dst_pos}",
        src.len()
    );
    let pointer = WirePointer::from(pointer);
    if pointer.is_null() {
        return Ok(0);
    }
    // A storage position past the end of the source cannot resolve to anything valid.
    bounds_check(i64::try_from(src_pos).unwrap_or(i64::MAX), 0, src.len())?;
    let src_pos = src_pos as i64;
    let mut copier = Copier::new(src, dst, &options);
    copier.copy(pointer, src_pos, dst_pos, options.nesting_limit)?;
    Ok(copier.dst.read_u64(dst_pos))
}

/// State shared by every step of one top-level copy.
pub(crate) struct Copier<'a, B: ?Sized> {
    src: &'a [u8],
    dst: &'a mut B,
    read_limiter: ReadLimiter,
}

impl<'a, B> Copier<'a, B>
where
    B: BuilderArena + ?Sized,
{
    pub(crate) fn new(src: &'a [u8], dst: &'a mut B, options: &CopyOptions) -> Self {
        Self {
            src,
            dst,
            read_limiter: ReadLimiter::new(options.traversal_limit_in_words),
        }
    }

    /// Bounds-checks `[pos, pos + length)` and charges it against the traversal limit.
    #[inline]
    fn check_read(&self, pos: i64, length: ByteCount) -> Result<()> {
        bounds_check(pos, length, self.src.len())?;
        self.read_limiter.can_read(round_bytes_up_to_words(length))
    }

    /// Reads the word at `pos`. The caller must already have bounds-checked it.
    #[inline]
    fn read_pointer(&self, pos: ByteCount) -> WirePointer {
        let mut bytes = [0u8; BYTES_PER_WORD];
        bytes.copy_from_slice(&self.src[pos..pos + BYTES_PER_WORD]);
        WirePointer::from_le_bytes(bytes)
    }

    /// Copies the target of the non-null `pointer` stored at `src_pos`, writing the new
    /// pointer at `dst_pos`.
    pub(crate) fn copy(
        &mut self,
        pointer: WirePointer,
        src_pos: i64,
        dst_pos: ByteCount,
        nesting_limit: i32,
    ) -> Result<()> {
        log::trace!(
            "copy {:?} pointer at {src_pos} -> {dst_pos}, nesting budget {nesting_limit}",
            pointer.kind()
        );
        match pointer.shape() {
            PointerShape::Null => Ok(()),
            PointerShape::Struct { .. } => {
                check_nesting(nesting_limit)?;
                self.copy_struct(pointer, src_pos, dst_pos, nesting_limit)
            }
            PointerShape::List { element_size, .. } => {
                check_nesting(nesting_limit)?;
                match element_size {
                    ElementSize::InlineComposite => {
                        self.copy_struct_list(pointer, src_pos, dst_pos, nesting_limit)
                    }
                    ElementSize::Pointer => {
                        self.copy_pointer_list(pointer, src_pos, dst_pos, nesting_limit)
                    }
                    ElementSize::Void
                    | ElementSize::Bit
                    | ElementSize::Byte
                    | ElementSize::TwoBytes
                    | ElementSize::FourBytes
                    | ElementSize::EightBytes => {
                        self.copy_primitive_list(pointer, src_pos, dst_pos)
                    }
                }
            }
            PointerShape::Far { .. } => {
                Err(Error::from_kind(ErrorKind::FarPointersNotSupported))
            }
            PointerShape::Other { .. } => {
                Err(Error::from_kind(ErrorKind::UnsupportedPointerKind))
            }
        }
    }

    fn copy_struct(
        &mut self,
        pointer: WirePointer,
        src_pos: i64,
        dst_pos: ByteCount,
        nesting_limit: i32,
    ) -> Result<()> {
        let src_pos = pointer.deref(src_pos);
        let data_size = pointer.struct_data_size();
        let ptr_count = pointer.struct_ptr_count();
        let data_bytes = usize::from(data_size) * BYTES_PER_WORD;

        self.check_read(src_pos, pointer.struct_word_size() as usize * BYTES_PER_WORD)?;
        let dst_pos = self.dst.alloc_struct(dst_pos, data_size, ptr_count)?;

        let start = src_pos as usize;
        self.dst.write_bytes(dst_pos, &self.src[start..start + data_bytes]);
        self.copy_pointers(
            usize::from(ptr_count),
            src_pos + data_bytes as i64,
            dst_pos + data_bytes,
            nesting_limit - 1,
        )
    }

    fn copy_primitive_list(
        &mut self,
        pointer: WirePointer,
        src_pos: i64,
        dst_pos: ByteCount,
    ) -> Result<()> {
        let src_pos = pointer.deref(src_pos);
        let element_size = pointer.list_element_size();
        let element_count = pointer.list_element_count();
        let body_length = element_size.body_length_in_bytes(element_count);

        self.check_read(src_pos, body_length)?;
        if element_size == ElementSize::Void {
            // Watch out for lists of void, which can claim to be arbitrarily large
            // without having sent actual data.
            self.read_limiter.can_read(element_count as usize)?;
        }

        let dst_pos = self
            .dst
            .alloc_list(dst_pos, element_size, element_count, body_length)?;
        let start = src_pos as usize;
        self.dst.write_bytes(dst_pos, &self.src[start..start + body_length]);
        Ok(())
    }

    fn copy_pointer_list(
        &mut self,
        pointer: WirePointer,
        src_pos: i64,
        dst_pos: ByteCount,
        nesting_limit: i32,
    ) -> Result<()> {
        let src_pos = pointer.deref(src_pos);
        let element_count = pointer.list_element_count();
        let body_length = ElementSize::Pointer.body_length_in_bytes(element_count);

        self.check_read(src_pos, body_length)?;
        let dst_pos = self
            .dst
            .alloc_list(dst_pos, ElementSize::Pointer, element_count, body_length)?;
        self.copy_pointers(element_count as usize, src_pos, dst_pos, nesting_limit - 1)
    }

    fn copy_struct_list(
        &mut self,
        pointer: WirePointer,
        src_pos: i64,
        dst_pos: ByteCount,
        nesting_limit: i32,
    ) -> Result<()> {
        let src_pos = pointer.deref(src_pos);
        let word_count = pointer.list_inline_composite_word_count();
        let body_length = ElementSize::InlineComposite.body_length_in_bytes(word_count);

        // One check covers the tag and every element.
        self.check_read(src_pos, body_length)?;
        let start = src_pos as usize;

        let tag = self.read_pointer(start);
        if tag.kind() != WirePointerKind::Struct {
            return Err(Error::from_kind(
                ErrorKind::InlineCompositeListWithNonStructElementsNotSupported,
            ));
        }
        let element_count = tag.inline_composite_list_element_count();
        let data_size = tag.struct_data_size();
        let ptr_count = tag.struct_ptr_count();
        let words_per_element = tag.struct_word_size();

        if u64::from(words_per_element) * u64::from(element_count) > u64::from(word_count) {
            return Err(Error::from_kind(
                ErrorKind::InlineCompositeListOverrunsItsWordCount,
            ));
        }
        if words_per_element == 0 {
            // Watch out for lists of zero-sized structs, which can claim to be
            // arbitrarily large without having sent actual data.
            self.read_limiter.can_read(element_count as usize)?;
        }

        let dst_pos = self.dst.alloc_list(
            dst_pos,
            ElementSize::InlineComposite,
            word_count,
            body_length,
        )?;

        // Data sections need no relocation, so the whole body goes across in one pass.
        // The pointer sections copied this way are still source-relative and get
        // overwritten below.
        self.dst.write_bytes(dst_pos, &self.src[start..start + body_length]);

        if ptr_count == 0 {
            return Ok(());
        }
        let item_length = words_per_element as usize * BYTES_PER_WORD;
        let data_bytes = usize::from(data_size) * BYTES_PER_WORD;
        for i in 0..element_count as usize {
            let offset = BYTES_PER_WORD + item_length * i + data_bytes;
            self.copy_pointers(
                usize::from(ptr_count),
                src_pos + offset as i64,
                dst_pos + offset,
                nesting_limit - 1,
            )?;
        }
        Ok(())
    }

    /// Copies `count` consecutive pointer slots starting at `src_pos` into the parallel
    /// slots starting at `dst_pos`. Null slots are left alone: the destination already
    /// holds zero there.
    fn copy_pointers(
        &mut self,
        count: WirePointerCount,
        src_pos: i64,
        dst_pos: ByteCount,
        nesting_limit: i32,
    ) -> Result<()> {
        bounds_check(src_pos, count * BYTES_PER_POINTER, self.src.len())?;
        let start = src_pos as usize;
        for i in 0..count {
            let offset = i * BYTES_PER_POINTER;
            let pointer = self.read_pointer(start + offset);
            if pointer.is_null() {
                continue;
            }
            self.copy(
                pointer,
                src_pos + offset as i64,
                dst_pos + offset,
                nesting_limit,
            )?;
        }
        Ok(())
    }
}

#[inline]
fn check_nesting(nesting_limit: i32) -> Result<()> {
    if nesting_limit <= 0 {
        Err(Error::from_kind(ErrorKind::NestingLimitExceeded))
    } else {
        Ok(())
    }
}
