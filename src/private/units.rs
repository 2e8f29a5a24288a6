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


pub type BitCount32 = u32;
pub type BitCount64 = u64;

pub type ByteCount = usize;

pub type WordCount = usize;
pub type WordCount16 = u16;
pub type WordCount32 = u32;

pub type ElementCount32 = u32;

pub type WirePointerCount = usize;
pub type WirePointerCount16 = u16;

pub const BITS_PER_BYTE: usize = 8;
pub const BYTES_PER_WORD: ByteCount = 8;

pub const BITS_PER_POINTER: usize = 64;
pub const BYTES_PER_POINTER: ByteCount = 8;
pub const WORDS_PER_POINTER: WordCount = 1;

pub const POINTER_SIZE_IN_WORDS: WordCount = 1;

/// Largest word count or element count that fits in the 29-bit count field of a list pointer.
pub const MAX_LIST_COUNT: u32 = (1 << 29) - 1;

/// Largest forward offset, in words, that fits in the 30-bit signed offset field.
pub const MAX_POINTER_OFFSET_IN_WORDS: i64 = (1 << 29) - 1;

#[inline]
pub fn round_bytes_up_to_words(bytes: ByteCount) -> WordCount {
    //# This code assumes 64-bit words.
    bytes.div_ceil(BYTES_PER_WORD)
}

#[inline]
pub fn round_bits_up_to_bytes(bits: BitCount64) -> ByteCount {
    bits.div_ceil(BITS_PER_BYTE as u64) as ByteCount
}
