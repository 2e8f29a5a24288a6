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


//! Decoding of the 64-bit pointer words that make up the Cap'n Proto wire format.
//!
//! ```text
//!  lsb                      pointer word                       msb
//! +-+-----------------------------+-------------------------------+
//! |A|             B               |               C               |
//! +-+-----------------------------+-------------------------------+
//!
//! A (2 bits)  = kind: 0 struct, 1 list, 2 far, 3 other
//! B (30 bits) = signed offset, in words, from the end of the pointer to the target
//! C (32 bits) = struct: data section words (16 bits), pointer section words (16 bits)
//!               list:   element size tag (3 bits), element or word count (29 bits)
//! ```

use crate::private::units::*;

pub use self::ElementSize::{
    Bit, Byte, EightBytes, FourBytes, InlineComposite, Pointer, TwoBytes, Void,
};

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementSize {
    Void = 0,
    Bit = 1,
    Byte = 2,
    TwoBytes = 3,
    FourBytes = 4,
    EightBytes = 5,
    Pointer = 6,
    InlineComposite = 7,
}

impl ElementSize {
    fn from(val: u8) -> Self {
        match val & 7 {
            0 => Self::Void,
            1 => Self::Bit,
            2 => Self::Byte,
            3 => Self::TwoBytes,
            4 => Self::FourBytes,
            5 => Self::EightBytes,
            6 => Self::Pointer,
            7 => Self::InlineComposite,
            _ => unreachable!("illegal element size: {val}"),
        }
    }

    pub fn data_bits_per_element(self) -> BitCount32 {
        match self {
            Void => 0,
            Bit => 1,
            Byte => 8,
            TwoBytes => 16,
            FourBytes => 32,
            EightBytes => 64,
            Pointer => 0,
            InlineComposite => 0,
        }
    }

    pub fn pointers_per_element(self) -> u32 {
        match self {
            Pointer => 1,
            _ => 0,
        }
    }

    /// Length in bytes of the body of a list with `count` elements.
    ///
    /// For `InlineComposite`, `count` is the word count stored in the list pointer and the
    /// result includes the tag word that precedes the elements.
    pub fn body_length_in_bytes(self, count: ElementCount32) -> ByteCount {
        match self {
            InlineComposite => (count as usize + POINTER_SIZE_IN_WORDS) * BYTES_PER_WORD,
            Bit => round_bits_up_to_bytes(u64::from(count)),
            _ => {
                let step = self.data_bits_per_element() as usize
                    + self.pointers_per_element() as usize * BITS_PER_POINTER;
                count as usize * step / BITS_PER_BYTE
            }
        }
    }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WirePointerKind {
    Struct = 0,
    List = 1,
    Far = 2,
    Other = 3,
}

impl WirePointerKind {
    fn from(val: u8) -> Self {
        match val & 3 {
            0 => Self::Struct,
            1 => Self::List,
            2 => Self::Far,
            3 => Self::Other,
            _ => unreachable!("illegal pointer kind: {val}"),
        }
    }
}

/// The decoded form of a pointer word. Every raw value maps to exactly one variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerShape {
    Null,
    Struct {
        offset: i32,
        data_size: WordCount16,
        ptr_count: WirePointerCount16,
    },
    /// For `InlineComposite` lists, `element_count` is the number of words in the body,
    /// not counting the tag.
    List {
        offset: i32,
        element_size: ElementSize,
        element_count: ElementCount32,
    },
    Far {
        double_far: bool,
        landing_pad: WordCount32,
        segment_id: u32,
    },
    /// A capability pointer, or a reserved pointer kind.
    Other { raw: u64 },
}

/// A pointer word, as stored little-endian on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct WirePointer {
    raw: u64,
}

impl From<u64> for WirePointer {
    fn from(raw: u64) -> Self {
        Self { raw }
    }
}

impl From<WirePointer> for u64 {
    fn from(pointer: WirePointer) -> Self {
        pointer.raw
    }
}

impl WirePointer {
    #[inline]
    pub fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Self {
            raw: u64::from_le_bytes(bytes),
        }
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.raw
    }

    #[inline]
    fn offset_and_kind(self) -> u32 {
        self.raw as u32
    }

    #[inline]
    fn upper32bits(self) -> u32 {
        (self.raw >> 32) as u32
    }

    #[inline]
    pub fn kind(self) -> WirePointerKind {
        WirePointerKind::from(self.offset_and_kind() as u8)
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.raw == 0
    }

    /// Signed offset in words from the end of this pointer to its target.
    #[inline]
    pub fn offset(self) -> i32 {
        (self.offset_and_kind() as i32) >> 2
    }

    /// Given the byte position at which this pointer is stored, returns the byte position
    /// of its target.
    #[inline]
    pub fn deref(self, storage_pos: i64) -> i64 {
        storage_pos + (1 + i64::from(self.offset())) * BYTES_PER_WORD as i64
    }

    #[inline]
    pub fn inline_composite_list_element_count(self) -> ElementCount32 {
        self.offset_and_kind() >> 2
    }

    #[inline]
    pub fn far_position_in_segment(self) -> WordCount32 {
        self.offset_and_kind() >> 3
    }

    #[inline]
    pub fn is_double_far(self) -> bool {
        ((self.offset_and_kind() >> 2) & 1) != 0
    }

    #[inline]
    pub fn far_segment_id(self) -> u32 {
        self.upper32bits()
    }

    #[inline]
    pub fn struct_data_size(self) -> WordCount16 {
        (self.upper32bits() & 0xffff) as WordCount16
    }

    #[inline]
    pub fn struct_ptr_count(self) -> WirePointerCount16 {
        (self.upper32bits() >> 16) as WirePointerCount16
    }

    #[inline]
    pub fn struct_word_size(self) -> WordCount32 {
        u32::from(self.struct_data_size())
            + u32::from(self.struct_ptr_count()) * WORDS_PER_POINTER as u32
    }

    #[inline]
    pub fn list_element_size(self) -> ElementSize {
        ElementSize::from(self.upper32bits() as u8)
    }

    #[inline]
    pub fn list_element_count(self) -> ElementCount32 {
        self.upper32bits() >> 3
    }

    #[inline]
    pub fn list_inline_composite_word_count(self) -> WordCount32 {
        self.list_element_count()
    }

    pub fn shape(self) -> PointerShape {
        if self.is_null() {
            return PointerShape::Null;
        }
        match self.kind() {
            WirePointerKind::Struct => PointerShape::Struct {
                offset: self.offset(),
                data_size: self.struct_data_size(),
                ptr_count: self.struct_ptr_count(),
            },
            WirePointerKind::List => PointerShape::List {
                offset: self.offset(),
                element_size: self.list_element_size(),
                element_count: self.list_element_count(),
            },
            WirePointerKind::Far => PointerShape::Far {
                double_far: self.is_double_far(),
                landing_pad: self.far_position_in_segment(),
                segment_id: self.far_segment_id(),
            },
            WirePointerKind::Other => PointerShape::Other { raw: self.raw },
        }
    }

    #[inline]
    fn from_parts(offset_and_kind: u32, upper32bits: u32) -> Self {
        Self {
            raw: u64::from(offset_and_kind) | (u64::from(upper32bits) << 32),
        }
    }

    pub fn new_struct(offset: i32, data_size: WordCount16, ptr_count: WirePointerCount16) -> Self {
        Self::from_parts(
            ((offset << 2) as u32) | WirePointerKind::Struct as u32,
            u32::from(data_size) | (u32::from(ptr_count) << 16),
        )
    }

    /// A pointer to a zero-sized struct.
    ///
    /// The target may be placed anywhere, but an offset of zero would make the whole word
    /// zero, i.e. null. So we use an offset of -1, as if the struct were allocated
    /// immediately before this pointer.
    pub fn new_empty_struct() -> Self {
        Self::new_struct(-1, 0, 0)
    }

    pub fn new_list(offset: i32, element_size: ElementSize, element_count: ElementCount32) -> Self {
        debug_assert!(
            element_count <= MAX_LIST_COUNT,
            "Lists are limited to 2**29 elements"
        );
        Self::from_parts(
            ((offset << 2) as u32) | WirePointerKind::List as u32,
            (element_count << 3) | element_size as u32,
        )
    }
}
