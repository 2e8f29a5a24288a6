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


//! Bounds checking against the source buffer.
//!
//! `bounds_check()` runs on every step of a copy, so the in-bounds path is a single
//! comparison. Building the diagnostic lives in `out_of_bounds()`, which is kept out of line.

use crate::{Error, ErrorKind, Result};

/// Succeeds iff `[offset, offset + length)` lies within a buffer of `buffer_len` bytes.
#[inline(always)]
pub fn bounds_check(offset: i64, length: usize, buffer_len: usize) -> Result<()> {
    // Widened so that the sum cannot overflow.
    let end = offset as i128 + length as i128;
    if offset < 0 || end > buffer_len as i128 {
        Err(out_of_bounds(offset, length, buffer_len))
    } else {
        Ok(())
    }
}

#[cold]
#[inline(never)]
fn out_of_bounds(offset: i64, length: usize, buffer_len: usize) -> Error {
    let end = offset.saturating_add(i64::try_from(length).unwrap_or(i64::MAX));
    log::debug!("read of [{offset}, {end}) escapes a source buffer of {buffer_len} bytes");
    Error::from_kind(ErrorKind::OutOfBounds {
        offset,
        end,
        buffer_len,
    })
}
