// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The segment object model and the metadata-completion state machine.

use log::debug;

use cadenza_core::codecs::DecoderSupport;
use cadenza_core::errors::{unreachable_error, Result};

use crate::block::Block;
use crate::cues::CueIndex;
use crate::ebml::{EbmlTag, TagPosition};
use crate::element_ids::ElementType;
use crate::schema::{
    parse_block_group, CuesElement, Element, InfoElement, SeekHeadElement, TagElement,
    TagsElement, TracksElement,
};
use crate::seek_index::SeekIndex;
use crate::tracks::TrackRegistry;

/// Progress of metadata resolution. Transitions are monotone; the state never moves
/// backwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum MetaState {
    /// Consuming top-level elements ahead of the first cluster.
    Scanning,
    /// The first cluster was reached and all locally available metadata is parsed.
    LocallyResolved,
    /// Track configurations are built; the segment is ready for playback.
    Complete,
}

/// Everything known about one Matroska segment, filled in as the scan progresses.
pub struct SegmentModel {
    start_offset: u64,
    header_len: u64,
    /// Top-level metadata tags in scan order, indexed by the seek index memo.
    meta_tags: Vec<EbmlTag>,
    first_cluster_offset: Option<u64>,
    segment_ended: bool,
    locally_resolved: bool,
    seek_index: SeekIndex,
    info: Option<InfoElement>,
    tracks: TrackRegistry,
    cues: CueIndex,
    tags: Vec<TagElement>,
    state: MetaState,
}

impl SegmentModel {
    /// Create the model from the Segment element's start tag geometry.
    pub fn new(start_offset: u64, header_len: u64) -> SegmentModel {
        SegmentModel {
            start_offset,
            header_len,
            meta_tags: Vec::new(),
            first_cluster_offset: None,
            segment_ended: false,
            locally_resolved: false,
            seek_index: SeekIndex::new(start_offset + header_len),
            info: None,
            tracks: TrackRegistry::default(),
            cues: CueIndex::default(),
            tags: Vec::new(),
            state: MetaState::Scanning,
        }
    }

    pub fn start_offset(&self) -> u64 {
        self.start_offset
    }

    /// Absolute offset of the segment's first content byte.
    pub fn content_start_offset(&self) -> u64 {
        self.start_offset + self.header_len
    }

    pub fn state(&self) -> MetaState {
        self.state
    }

    pub fn info(&self) -> Option<&InfoElement> {
        self.info.as_ref()
    }

    /// Nanoseconds per timestamp unit.
    pub fn timestamp_scale(&self) -> u64 {
        self.info.as_ref().map(|info| info.timestamp_scale).unwrap_or(1_000_000)
    }

    pub fn tracks(&self) -> &TrackRegistry {
        &self.tracks
    }

    pub fn tracks_mut(&mut self) -> &mut TrackRegistry {
        &mut self.tracks
    }

    pub fn cues(&self) -> &CueIndex {
        &self.cues
    }

    pub fn tags(&self) -> &[TagElement] {
        &self.tags
    }

    pub fn seek_index(&self) -> &SeekIndex {
        &self.seek_index
    }

    /// A scanned metadata tag by its memoized index.
    pub fn meta_tag(&self, index: usize) -> Option<&EbmlTag> {
        self.meta_tags.get(index)
    }

    /// Load a remotely fetched Cues element into the cue index.
    pub fn prepare_cues(&mut self, cues: CuesElement) {
        self.cues.prepare(cues);
    }

    /// Append remotely fetched metadata tags.
    pub fn append_tags(&mut self, tags: TagsElement) {
        self.tags.extend(tags.tags);
    }

    pub fn first_cluster_offset(&self) -> Result<u64> {
        match self.first_cluster_offset {
            Some(offset) => Ok(offset),
            None => unreachable_error("mkv: first cluster offset not recorded"),
        }
    }

    pub fn has_clusters(&self) -> bool {
        self.first_cluster_offset.is_some()
    }

    /// Consume one scanned tag.
    ///
    /// Ahead of the first cluster this records and parses top-level metadata. The first
    /// cluster start resolves everything seen so far. Past that point only keyframe
    /// candidates for tracks that still need one are inspected.
    pub fn scan_meta(&mut self, tag: EbmlTag) -> Result<()> {
        if self.state == MetaState::Complete {
            return Ok(());
        }

        match (tag.element_type, tag.position) {
            (ElementType::Segment, TagPosition::End) => {
                self.segment_ended = true;
                return Ok(());
            }
            (ElementType::Cluster, TagPosition::Start) => {
                if self.first_cluster_offset.is_none() {
                    self.first_cluster_offset = Some(tag.start_offset);
                    self.resolve_local()?;
                    self.state = MetaState::LocallyResolved;
                }
                return Ok(());
            }
            _ => {}
        }

        if self.state == MetaState::LocallyResolved {
            self.scan_keyframe_candidate(&tag)?;
            return Ok(());
        }

        if tag.is_end() && tag.element_type.is_top_level() {
            if tag.element_type == ElementType::SeekHead {
                self.seek_index.add_seek_head(SeekHeadElement::parse(&tag)?);
            }
            self.seek_index.memo_offset(tag.start_offset, self.meta_tags.len());
            self.meta_tags.push(tag);
        }

        Ok(())
    }

    /// True when scanning may stop and `complete_meta` is allowed.
    ///
    /// A segment without clusters completes at its end tag; otherwise the first cluster
    /// must be found and every track must be able to derive its configuration.
    pub fn can_complete_meta(&self) -> bool {
        if self.state == MetaState::Complete {
            return true;
        }
        if self.segment_ended {
            return true;
        }
        self.first_cluster_offset.is_some() && self.tracks.ready_to_configure_all()
    }

    /// Finish metadata resolution and build the track configurations.
    ///
    /// The state moves to `Complete` even when some tracks fail; the returned aggregate
    /// error lists the failures while the remaining tracks stay configured and usable.
    pub fn complete_meta(&mut self, support: &dyn DecoderSupport) -> Result<()> {
        self.resolve_local()?;

        let result = self.tracks.build_configurations(support);
        self.state = MetaState::Complete;
        result
    }

    /// Parse the recorded metadata tags into the typed stores. Runs once.
    fn resolve_local(&mut self) -> Result<()> {
        if self.locally_resolved {
            return Ok(());
        }
        self.locally_resolved = true;

        for tag in &self.meta_tags {
            match tag.element_type {
                ElementType::Info => {
                    if self.info.is_none() {
                        self.info = Some(InfoElement::parse(tag)?);
                    }
                }
                ElementType::Tracks => {
                    self.tracks.prepare(TracksElement::parse(tag)?);
                }
                ElementType::Cues => {
                    if !self.cues.prepared() {
                        self.cues.prepare(CuesElement::parse(tag)?);
                    }
                }
                ElementType::Tags => {
                    self.tags.extend(TagsElement::parse(tag)?.tags);
                }
                ElementType::SeekHead => {}
                other => {
                    debug!("mkv: no typed store for metadata element {:?}", other);
                }
            }
        }

        Ok(())
    }

    /// Offer in-cluster block payloads to tracks that still need a keyframe peek.
    fn scan_keyframe_candidate(&mut self, tag: &EbmlTag) -> Result<()> {
        if self.tracks.ready_to_configure_all() {
            return Ok(());
        }

        match tag.element_type {
            ElementType::SimpleBlock => {
                if let Some(payload) = tag.as_binary() {
                    let block = Block::read(payload, true)?;
                    if let Some(frame) = block.frames.first() {
                        self.tracks.try_peek_keyframe(block.track, block.keyframe, frame);
                    }
                }
            }
            ElementType::BlockGroup if tag.is_end() => {
                let group = parse_block_group(tag)?;
                if let Some(frame) = group.block.frames.first() {
                    self.tracks.try_peek_keyframe(group.block.track, group.keyframe(), frame);
                }
            }
            _ => {}
        }

        Ok(())
    }
}
