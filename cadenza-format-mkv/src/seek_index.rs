// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;

use log::debug;

use crate::schema::SeekHeadElement;

/// Maps top-level element ids to byte offsets, resolved from SeekHead elements, and
/// memoizes the offset of every scanned tag.
///
/// All stored seek positions are relative to the segment content start; converting to
/// an absolute stream offset happens here.
#[derive(Debug, Default)]
pub struct SeekIndex {
    /// Absolute offset of the segment's first content byte.
    content_start_offset: u64,
    seek_heads: Vec<SeekHeadElement>,
    /// Start offset of every scanned tag, mapped to its index in the scanned-tag list.
    /// Append-only; safe to interleave with in-flight seeks.
    offset_memo: HashMap<u64, usize>,
}

impl SeekIndex {
    pub fn new(content_start_offset: u64) -> SeekIndex {
        SeekIndex { content_start_offset, ..SeekIndex::default() }
    }

    /// Record a resolved SeekHead. Multiple SeekHeads may be chained; the first one
    /// recorded stays authoritative.
    pub fn add_seek_head(&mut self, seek_head: SeekHeadElement) {
        if !self.seek_heads.is_empty() {
            debug!("mkv: retaining first seek head as authoritative");
        }
        self.seek_heads.push(seek_head);
    }

    /// Memoize a scanned tag's start offset. First write wins.
    pub fn memo_offset(&mut self, start_offset: u64, tag_index: usize) {
        self.offset_memo.entry(start_offset).or_insert(tag_index);
    }

    /// Convert a segment-relative seek position to an absolute stream offset.
    pub fn offset_from_seek_position(&self, position: u64) -> u64 {
        position + self.content_start_offset
    }

    /// Absolute offset of the element with the given id, per the authoritative
    /// SeekHead.
    pub fn seek_offset_by_id(&self, element_id: u32) -> Option<u64> {
        self.seek_heads
            .first()?
            .entries
            .iter()
            .find(|entry| entry.seek_id == element_id)
            .map(|entry| self.offset_from_seek_position(entry.seek_position))
    }

    /// Index of the already-scanned tag starting at the given absolute offset.
    pub fn tag_index_by_start_offset(&self, start_offset: u64) -> Option<usize> {
        self.offset_memo.get(&start_offset).copied()
    }

    /// Index of the already-scanned tag for the given element id, if the SeekHead
    /// points at it and it was seen locally.
    pub fn tag_index_by_seek_id(&self, element_id: u32) -> Option<usize> {
        self.seek_offset_by_id(element_id)
            .and_then(|offset| self.tag_index_by_start_offset(offset))
    }
}

#[cfg(test)]
mod tests {
    use super::SeekIndex;
    use crate::element_ids::ids;
    use crate::schema::{SeekEntryElement, SeekHeadElement};

    fn seek_head(entries: Vec<(u32, u64)>) -> SeekHeadElement {
        SeekHeadElement {
            entries: entries
                .into_iter()
                .map(|(seek_id, seek_position)| SeekEntryElement { seek_id, seek_position })
                .collect(),
        }
    }

    #[test]
    fn verify_offset_resolution() {
        let mut index = SeekIndex::new(100);
        index.add_seek_head(seek_head(vec![(ids::CUES, 4000), (ids::TRACKS, 200)]));

        assert_eq!(index.seek_offset_by_id(ids::CUES), Some(4100));
        assert_eq!(index.seek_offset_by_id(ids::TRACKS), Some(300));
        assert_eq!(index.seek_offset_by_id(ids::TAGS), None);
    }

    #[test]
    fn verify_first_seek_head_is_authoritative() {
        let mut index = SeekIndex::new(0);
        index.add_seek_head(seek_head(vec![(ids::CUES, 1000)]));
        index.add_seek_head(seek_head(vec![(ids::CUES, 9000)]));

        assert_eq!(index.seek_offset_by_id(ids::CUES), Some(1000));
    }

    #[test]
    fn verify_memo_is_append_only() {
        let mut index = SeekIndex::new(0);
        index.memo_offset(500, 3);
        index.memo_offset(500, 7);

        assert_eq!(index.tag_index_by_start_offset(500), Some(3));
        assert_eq!(index.tag_index_by_start_offset(501), None);
    }

    #[test]
    fn verify_tag_index_by_seek_id() {
        let mut index = SeekIndex::new(100);
        index.add_seek_head(seek_head(vec![(ids::INFO, 50)]));
        index.memo_offset(150, 2);

        assert_eq!(index.tag_index_by_seek_id(ids::INFO), Some(2));
        assert_eq!(index.tag_index_by_seek_id(ids::CUES), None);
    }
}
