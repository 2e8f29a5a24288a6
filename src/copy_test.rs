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


use crate::arena::{BuilderArena, SegmentBuilder};
use crate::pointer::{ElementSize, WirePointer};
use crate::{copy_pointer, copy_pointer_with_options, word, CopyOptions, ErrorKind, Word};

fn root_of(src: &[u8]) -> u64 {
    u64::from_le_bytes(src[0..8].try_into().unwrap())
}

/// Copies the root pointer of `src` into a fresh segment.
fn copy_root(src: &[u8]) -> (u64, SegmentBuilder) {
    let mut dst = SegmentBuilder::new();
    let pos = dst.allocate(8);
    let pointer = copy_pointer(src, root_of(src), 0, &mut dst, pos).unwrap();
    (pointer, dst)
}

#[test]
fn simple_raw_data_struct() {
    let data: &[Word] = &[
        word(0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00),
        word(0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef),
    ];
    let src = Word::words_to_bytes(data);

    let (pointer, dst) = copy_root(src);
    assert_eq!(pointer, root_of(src));
    assert_eq!(dst.as_bytes(), src);
}

#[test]
fn nested_struct_is_relocated() {
    let data: &[Word] = &[
        // root: struct one word ahead, 1 data word, 1 pointer
        word(0x04, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00),
        // garbage
        word(0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff),
        // data section
        word(0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef),
        // pointer section: byte list of 3 elements, one word ahead
        word(0x05, 0x00, 0x00, 0x00, 0x1a, 0x00, 0x00, 0x00),
        // garbage
        word(0xee, 0xee, 0xee, 0xee, 0xee, 0xee, 0xee, 0xee),
        word(7, 8, 9, 0x00, 0x00, 0x00, 0x00, 0x00),
    ];
    let src = Word::words_to_bytes(data);

    let (pointer, dst) = copy_root(src);

    let expected: &[Word] = &[
        word(0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00),
        word(0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef),
        word(0x01, 0x00, 0x00, 0x00, 0x1a, 0x00, 0x00, 0x00),
        word(7, 8, 9, 0x00, 0x00, 0x00, 0x00, 0x00),
    ];
    assert_eq!(dst.as_bytes(), Word::words_to_bytes(expected));
    assert_eq!(pointer, WirePointer::new_struct(0, 1, 1).raw());
}

#[test]
fn bool_list_copies_only_its_body() {
    // [true, false, true, false, true, true, true, false, false]
    let data: &[Word] = &[
        word(0x01, 0x00, 0x00, 0x00, 0x49, 0x00, 0x00, 0x00),
        word(0x75, 0x00, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa),
    ];
    let src = Word::words_to_bytes(data);

    let (_, dst) = copy_root(src);

    let expected: &[Word] = &[
        word(0x01, 0x00, 0x00, 0x00, 0x49, 0x00, 0x00, 0x00),
        word(0x75, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
    ];
    assert_eq!(dst.as_bytes(), Word::words_to_bytes(expected));
}

#[test]
fn struct_list_with_pointers() {
    let data: &[Word] = &[
        // inline-composite list, 4 words plus the tag
        word(0x01, 0x00, 0x00, 0x00, 0x27, 0x00, 0x00, 0x00),
        // tag: 2 elements, 1 data word, 1 pointer
        word(0x08, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00),
        word(0x11, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
        // byte list of 1 element, two words ahead
        word(0x09, 0x00, 0x00, 0x00, 0x0a, 0x00, 0x00, 0x00),
        word(0x22, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
        word(0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
        word(0x33, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
    ];
    let src = Word::words_to_bytes(data);

    let (pointer, dst) = copy_root(src);
    assert_eq!(pointer, root_of(src));
    assert_eq!(dst.as_bytes(), src);
}

#[test]
fn struct_list_pointers_are_rewritten() {
    let data: &[Word] = &[
        // inline-composite list, 2 words plus the tag
        word(0x01, 0x00, 0x00, 0x00, 0x17, 0x00, 0x00, 0x00),
        // tag: 2 elements, no data, 1 pointer
        word(0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00),
        // element 0: byte list of 1 element, two words ahead
        word(0x09, 0x00, 0x00, 0x00, 0x0a, 0x00, 0x00, 0x00),
        // element 1: byte list of 1 element, right after the list
        word(0x01, 0x00, 0x00, 0x00, 0x0a, 0x00, 0x00, 0x00),
        word(0x55, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
        word(0x44, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
    ];
    let src = Word::words_to_bytes(data);

    let (_, dst) = copy_root(src);

    // Targets are laid out in slot order, whatever their order in the source.
    let expected: &[Word] = &[
        word(0x01, 0x00, 0x00, 0x00, 0x17, 0x00, 0x00, 0x00),
        word(0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00),
        word(0x05, 0x00, 0x00, 0x00, 0x0a, 0x00, 0x00, 0x00),
        word(0x05, 0x00, 0x00, 0x00, 0x0a, 0x00, 0x00, 0x00),
        word(0x44, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
        word(0x55, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
    ];
    assert_eq!(dst.as_bytes(), Word::words_to_bytes(expected));
}

#[test]
fn empty_struct() {
    let data: &[Word] = &[word(0xfc, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00)];
    let src = Word::words_to_bytes(data);

    let (pointer, dst) = copy_root(src);
    assert_eq!(pointer, WirePointer::new_empty_struct().raw());
    assert_eq!(dst.len(), 8);
}

#[test]
fn null_pointer_copies_nothing() {
    let data = [word(0, 0, 0, 0, 0, 0, 0, 0)];
    let src = Word::words_to_bytes(&data);
    let (pointer, dst) = copy_root(src);
    assert_eq!(pointer, 0);
    assert_eq!(dst.as_bytes(), &[0; 8]);
}

#[test]
fn backwards_pointer() {
    let data: &[Word] = &[
        word(0x2a, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
        // struct two words back: offset -2, 1 data word
        word(0xf8, 0xff, 0xff, 0xff, 0x01, 0x00, 0x00, 0x00),
    ];
    let src = Word::words_to_bytes(data);

    let mut dst = SegmentBuilder::new();
    let pos = dst.allocate(8);
    let pointer = u64::from_le_bytes(src[8..16].try_into().unwrap());
    copy_pointer(src, pointer, 8, &mut dst, pos).unwrap();

    let expected: &[Word] = &[
        word(0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00),
        word(0x2a, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
    ];
    assert_eq!(dst.as_bytes(), Word::words_to_bytes(expected));
}

#[test]
fn pointer_list_of_text() {
    let mut src = SegmentBuilder::new();
    let root = src.allocate(8);
    let body = src.alloc_list(root, ElementSize::Pointer, 3, 24).unwrap();
    src.alloc_text(body, "foo").unwrap();
    src.alloc_text(body + 16, "quux").unwrap();
    let src = src.into_bytes();

    let (pointer, dst) = copy_root(&src);
    assert_eq!(pointer, root_of(&src));
    assert_eq!(dst.as_bytes(), &src[..]);
    assert_eq!(dst.read_u64(body + 8), 0);
}

#[test]
fn far_pointer_fails_before_allocating() {
    let data: &[Word] = &[word(0x02, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00)];
    let src = Word::words_to_bytes(data);

    let mut dst = SegmentBuilder::new();
    let pos = dst.allocate(8);
    let err = copy_pointer(src, root_of(src), 0, &mut dst, pos).unwrap_err();
    assert_eq!(err.kind, ErrorKind::FarPointersNotSupported);
    assert_eq!(dst.as_bytes(), &[0; 8]);
}

#[test]
fn capability_pointer_is_unsupported() {
    let data: &[Word] = &[word(0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00)];
    let src = Word::words_to_bytes(data);

    let mut dst = SegmentBuilder::new();
    let pos = dst.allocate(8);
    let err = copy_pointer(src, root_of(src), 0, &mut dst, pos).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnsupportedPointerKind);
}

#[test]
fn nested_far_pointer() {
    let data: &[Word] = &[
        word(0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00),
        word(0x02, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00),
    ];
    let src = Word::words_to_bytes(data);

    let mut dst = SegmentBuilder::new();
    let pos = dst.allocate(8);
    let err = copy_pointer(src, root_of(src), 0, &mut dst, pos).unwrap_err();
    assert_eq!(err.kind, ErrorKind::FarPointersNotSupported);
}

#[test]
fn struct_out_of_bounds() {
    let data: &[Word] = &[
        // struct with 2 data words, but only one follows
        word(0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00),
        word(0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
    ];
    let src = Word::words_to_bytes(data);

    let mut dst = SegmentBuilder::new();
    let pos = dst.allocate(8);
    let err = copy_pointer(src, root_of(src), 0, &mut dst, pos).unwrap_err();
    assert_eq!(
        err.kind,
        ErrorKind::OutOfBounds {
            offset: 8,
            end: 24,
            buffer_len: 16
        }
    );
}

#[test]
fn list_body_ending_exactly_at_buffer_end() {
    // 8 one-byte elements fill the second word exactly
    let data: &[Word] = &[
        word(0x01, 0x00, 0x00, 0x00, 0x42, 0x00, 0x00, 0x00),
        word(1, 2, 3, 4, 5, 6, 7, 8),
    ];
    let src = Word::words_to_bytes(data);
    let (_, dst) = copy_root(src);
    assert_eq!(dst.as_bytes(), src);

    // one more element and the body overruns by one byte
    let data: &[Word] = &[
        word(0x01, 0x00, 0x00, 0x00, 0x4a, 0x00, 0x00, 0x00),
        word(1, 2, 3, 4, 5, 6, 7, 8),
    ];
    let src = Word::words_to_bytes(data);
    let mut dst = SegmentBuilder::new();
    let pos = dst.allocate(8);
    let err = copy_pointer(src, root_of(src), 0, &mut dst, pos).unwrap_err();
    assert_eq!(
        err.kind,
        ErrorKind::OutOfBounds {
            offset: 8,
            end: 17,
            buffer_len: 16
        }
    );
}

#[test]
fn self_referencing_struct() {
    let data: &[Word] = &[
        // root: struct with one pointer, right after
        word(0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00),
        // the struct's only pointer points back at the struct itself
        word(0xfc, 0xff, 0xff, 0xff, 0x00, 0x00, 0x01, 0x00),
    ];
    let src = Word::words_to_bytes(data);

    let mut dst = SegmentBuilder::new();
    let pos = dst.allocate(8);
    let err = copy_pointer(src, root_of(src), 0, &mut dst, pos).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NestingLimitExceeded);

    let mut dst = SegmentBuilder::new();
    let pos = dst.allocate(8);
    let options = *CopyOptions::new().traversal_limit_in_words(10);
    let err = copy_pointer_with_options(src, root_of(src), 0, &mut dst, pos, options).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ReadLimitExceeded);
}

#[test]
fn nesting_limit_is_exact() {
    // root -> struct -> byte list: two levels
    let data: &[Word] = &[
        word(0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00),
        word(0x01, 0x00, 0x00, 0x00, 0x0a, 0x00, 0x00, 0x00),
        word(0x07, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
    ];
    let src = Word::words_to_bytes(data);

    let mut dst = SegmentBuilder::new();
    let pos = dst.allocate(8);
    let options = *CopyOptions::new().nesting_limit(2);
    copy_pointer_with_options(src, root_of(src), 0, &mut dst, pos, options).unwrap();
    assert_eq!(dst.as_bytes(), src);

    let mut dst = SegmentBuilder::new();
    let pos = dst.allocate(8);
    let options = *CopyOptions::new().nesting_limit(1);
    let err = copy_pointer_with_options(src, root_of(src), 0, &mut dst, pos, options).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NestingLimitExceeded);
}

#[test]
fn huge_void_list() {
    // a list of 2**29 - 1 voids takes no space on the wire
    let data: &[Word] = &[word(0x01, 0x00, 0x00, 0x00, 0xf8, 0xff, 0xff, 0xff)];
    let src = Word::words_to_bytes(data);

    let mut dst = SegmentBuilder::new();
    let pos = dst.allocate(8);
    let err = copy_pointer(src, root_of(src), 0, &mut dst, pos).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ReadLimitExceeded);

    let mut dst = SegmentBuilder::new();
    let pos = dst.allocate(8);
    let options = *CopyOptions::new().traversal_limit_in_words(1 << 30);
    copy_pointer_with_options(src, root_of(src), 0, &mut dst, pos, options).unwrap();
    assert_eq!(dst.as_bytes(), src);
}

#[test]
fn struct_list_with_list_tag() {
    let data: &[Word] = &[
        word(0x01, 0x00, 0x00, 0x00, 0x0f, 0x00, 0x00, 0x00),
        // tag with kind LIST
        word(0x05, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00),
        word(0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
    ];
    let src = Word::words_to_bytes(data);

    let mut dst = SegmentBuilder::new();
    let pos = dst.allocate(8);
    let err = copy_pointer(src, root_of(src), 0, &mut dst, pos).unwrap_err();
    assert_eq!(
        err.kind,
        ErrorKind::InlineCompositeListWithNonStructElementsNotSupported
    );
}

#[test]
fn struct_list_overruns_word_count() {
    let data: &[Word] = &[
        // 1 word plus the tag
        word(0x01, 0x00, 0x00, 0x00, 0x0f, 0x00, 0x00, 0x00),
        // tag claims 2 one-word elements
        word(0x08, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00),
        word(0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
        word(0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
    ];
    let src = Word::words_to_bytes(data);

    let mut dst = SegmentBuilder::new();
    let pos = dst.allocate(8);
    let err = copy_pointer(src, root_of(src), 0, &mut dst, pos).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InlineCompositeListOverrunsItsWordCount);
}

#[test]
fn copy_into_a_builder_slot() {
    // the destination already holds a struct; copy into its second pointer slot
    let data: &[Word] = &[
        word(0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00),
        word(0x2a, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
    ];
    let src = Word::words_to_bytes(data);

    let mut dst = SegmentBuilder::new();
    let root = dst.allocate(8);
    let outer = dst.alloc_struct(root, 0, 2).unwrap();
    let pointer = copy_pointer(src, root_of(src), 0, &mut dst, outer + 8).unwrap();

    assert_eq!(dst.read_u64(outer), 0);
    assert_eq!(pointer, dst.read_u64(outer + 8));
    let copied = WirePointer::from(pointer);
    assert_eq!(copied.struct_data_size(), 1);
    assert_eq!(dst.as_bytes()[copied.deref(outer as i64 + 8) as usize], 0x2a);
}

#[test]
fn storage_position_past_the_end() {
    let data: &[Word] = &[word(0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00)];
    let src = Word::words_to_bytes(data);

    let mut dst = SegmentBuilder::new();
    let pos = dst.allocate(8);
    let err = copy_pointer(src, root_of(src), 100, &mut dst, pos).unwrap_err();
    assert_eq!(
        err.kind,
        ErrorKind::OutOfBounds {
            offset: 100,
            end: 100,
            buffer_len: 8
        }
    );
}

#[test]
fn destination_slot_must_be_aligned_and_allocated() {
    let data: &[Word] = &[
        word(0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00),
        word(0x2a, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
    ];
    let src = Word::words_to_bytes(data);

    // misaligned
    let mut dst = SegmentBuilder::new();
    dst.allocate(16);
    let err = copy_pointer(src, root_of(src), 0, &mut dst, 4).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidPointerSlot);
    assert_eq!(dst.as_bytes(), &[0; 16]);

    // never allocated
    let mut dst = SegmentBuilder::new();
    let err = copy_pointer(src, root_of(src), 0, &mut dst, 0).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidPointerSlot);
    assert!(dst.is_empty());

    // the same copy succeeds once the slot exists
    let pos = dst.allocate(8);
    copy_pointer(src, root_of(src), 0, &mut dst, pos).unwrap();
    assert_eq!(dst.as_bytes(), src);
}
