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


//! # Cap'n Proto pointer copy
//!
//! Deep copy of a single [Cap'n Proto](https://capnproto.org) value from a flat,
//! read-only byte buffer into a growable destination segment. Given a pointer word
//! and the byte offset at which that word is stored, the value it addresses (a struct,
//! a primitive list, a pointer list or an inline-composite list) is rebuilt in the
//! destination and every nested pointer is rewritten to be destination-relative.
//!
//! Far pointers and capability pointers are not supported: messages are expected to
//! consist of a single segment.
//!
//! ```
//! use capnp_copy::arena::SegmentBuilder;
//!
//! // A struct with one data word, stored right after its root pointer.
//! let src: &[capnp_copy::Word] = &[
//!     capnp_copy::word(0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00),
//!     capnp_copy::word(0x2a, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
//! ];
//! let src = capnp_copy::Word::words_to_bytes(src);
//!
//! let mut dst = SegmentBuilder::new();
//! let root = dst.allocate(8);
//! let pointer = u64::from_le_bytes(src[0..8].try_into().unwrap());
//! capnp_copy::copy_pointer(src, pointer, 0, &mut dst, root).unwrap();
//! assert_eq!(dst.as_bytes(), src);
//! ```

pub mod arena;
pub mod copy;
pub mod message;
pub mod pointer;
pub mod visit;

mod private;

#[cfg(test)]
mod copy_test;

pub use crate::copy::{copy_pointer, copy_pointer_with_options};
pub use crate::message::{CopyOptions, DEFAULT_COPY_OPTIONS};

/// Eight bytes of memory with opaque interior.
///
/// This type is used to ensure that the data of a message is properly aligned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, align(8))]
pub struct Word {
    raw_content: [u8; 8],
}

/// Constructs a word with the given bytes.
#[allow(clippy::too_many_arguments)]
pub const fn word(b0: u8, b1: u8, b2: u8, b3: u8, b4: u8, b5: u8, b6: u8, b7: u8) -> Word {
    Word {
        raw_content: [b0, b1, b2, b3, b4, b5, b6, b7],
    }
}

impl Word {
    /// Converts a slice of words into a slice of bytes.
    pub fn words_to_bytes(words: &[Self]) -> &[u8] {
        unsafe {
            core::slice::from_raw_parts(words.as_ptr() as *const u8, core::mem::size_of_val(words))
        }
    }
}

/// Size of a message, as computed by [`visit::total_size`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageSize {
    pub word_count: u64,

    /// Always zero here: capability pointers are never copied.
    pub cap_count: u32,
}

/// Because source buffers are untrusted, every operation that follows a pointer returns a Result.
pub type Result<T> = ::core::result::Result<T, Error>;

/// Describes an arbitrary error that prevented an operation from completing.
#[derive(Debug, Clone)]
pub struct Error {
    /// The general kind of the error.
    pub kind: ErrorKind,

    /// Extra context about error
    pub extra: String,
}

/// The general nature of an error. The purpose of this enum is not to describe the error itself,
/// but rather to describe how the client might want to respond to the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A pointer resolved to a span that does not lie within the source buffer.
    OutOfBounds {
        /// First byte of the attempted read. May be negative for backwards pointers.
        offset: i64,
        /// One past the last byte of the attempted read.
        end: i64,
        /// Length of the source buffer.
        buffer_len: usize,
    },

    /// Far pointers are not supported; messages must consist of a single segment.
    FarPointersNotSupported,

    /// Capability pointers (and any other pointer of kind OTHER) cannot be copied.
    UnsupportedPointerKind,

    /// InlineComposite list with non-STRUCT elements not supported.
    InlineCompositeListWithNonStructElementsNotSupported,

    /// InlineComposite list's elements overrun its word count.
    InlineCompositeListOverrunsItsWordCount,

    /// Message is too deeply nested.
    NestingLimitExceeded,

    /// Read limit exceeded
    ReadLimitExceeded,

    /// Destination segment grew beyond what a pointer offset can address.
    MessageTooLarge(usize),

    /// The destination position for a pointer is not a word-aligned, already allocated slot.
    InvalidPointerSlot,
}

impl Error {
    pub fn new(kind: ErrorKind, extra: String) -> Self {
        Self { kind, extra }
    }

    pub fn from_kind(kind: ErrorKind) -> Self {
        Self {
            extra: String::new(),
            kind,
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::OutOfBounds {
                offset,
                end,
                buffer_len,
            } => write!(
                formatter,
                "Out of bounds: [{offset}, {end}) exceeds a buffer of {buffer_len} bytes"
            ),
            Self::FarPointersNotSupported => write!(formatter, "Far pointers are not supported"),
            Self::UnsupportedPointerKind => {
                write!(formatter, "Unsupported pointer kind (capability or unknown)")
            }
            Self::InlineCompositeListWithNonStructElementsNotSupported => write!(
                formatter,
                "InlineComposite list with non-STRUCT elements not supported."
            ),
            Self::InlineCompositeListOverrunsItsWordCount => write!(
                formatter,
                "InlineComposite list's elements overrun its word count."
            ),
            Self::NestingLimitExceeded => write!(
                formatter,
                "Message is too deeply nested. See CopyOptions."
            ),
            Self::ReadLimitExceeded => write!(formatter, "Read limit exceeded"),
            Self::MessageTooLarge(val) => write!(
                formatter,
                "Destination segment is too large: offset {val} cannot be encoded in a pointer"
            ),
            Self::InvalidPointerSlot => write!(formatter, "Invalid pointer slot"),
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::fmt::Result {
        if self.extra.is_empty() {
            write!(fmt, "{}", self.kind)
        } else {
            write!(fmt, "{}: {}", self.kind, self.extra)
        }
    }
}

impl std::error::Error for Error {}
