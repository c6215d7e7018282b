// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A streaming Matroska and WebM demuxer.
//!
//! The reader consumes tokenized EBML tags from a reopenable [`ebml::TagSource`],
//! builds a [`segment::SegmentModel`] of the file's metadata, derives per-track
//! decoder configurations, and yields decoder-ready [`demuxer::EncodedChunk`]s with
//! timing in microseconds. Cues and metadata tags stored behind the media data are
//! fetched on demand through the segment's seek head.

pub mod block;
pub mod codecs;
pub mod cues;
pub mod demuxer;
pub mod ebml;
pub mod element_ids;
pub mod schema;
pub mod seek_index;
pub mod segment;
pub mod tracks;

pub use demuxer::{Clusters, EncodedChunk, MkvReader, SegmentEvent};
pub use segment::{MetaState, SegmentModel};
