// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed views over consumed master tags.
//!
//! Each element struct validates its tag and applies the Matroska defaults as plain
//! field initializers.

use log::debug;

use cadenza_core::errors::{decode_error, Error, Result};

use crate::block::{Block, BlockGroup};
use crate::ebml::EbmlTag;
use crate::element_ids::ElementType;

/// A typed element parsed from a consumed master tag.
pub trait Element: Sized {
    const ID: ElementType;

    fn parse(tag: &EbmlTag) -> Result<Self>;
}

/// Parse every child of the given element type into `T`.
pub fn parse_children<T: Element>(tag: &EbmlTag) -> Result<Vec<T>> {
    tag.children_of(T::ID).map(T::parse).collect()
}

/// Checks the tag carries the expected element type before field extraction.
fn expect_tag(tag: &EbmlTag, id: ElementType) -> Result<()> {
    if tag.element_type != id {
        return decode_error("mkv: element parsed from mismatched tag");
    }
    Ok(())
}

/// The Info element: global properties of the segment.
#[derive(Clone, Debug)]
pub struct InfoElement {
    /// Nanoseconds per timestamp unit.
    pub timestamp_scale: u64,
    /// Segment duration in timestamp units.
    pub duration: Option<f64>,
    pub title: Option<String>,
    pub muxing_app: Option<String>,
    pub writing_app: Option<String>,
}

impl Element for InfoElement {
    const ID: ElementType = ElementType::Info;

    fn parse(tag: &EbmlTag) -> Result<Self> {
        expect_tag(tag, Self::ID)?;
        Ok(InfoElement {
            timestamp_scale: tag.child_unsigned(ElementType::TimestampScale).unwrap_or(1_000_000),
            duration: tag.child_float(ElementType::Duration),
            title: tag.child_string(ElementType::Title),
            muxing_app: tag.child_string(ElementType::MuxingApp),
            writing_app: tag.child_string(ElementType::WritingApp),
        })
    }
}

/// One entry of a SeekHead: an element id and its position relative to the segment
/// content start.
#[derive(Clone, Debug)]
pub struct SeekEntryElement {
    pub seek_id: u32,
    pub seek_position: u64,
}

impl Element for SeekEntryElement {
    const ID: ElementType = ElementType::Seek;

    fn parse(tag: &EbmlTag) -> Result<Self> {
        expect_tag(tag, Self::ID)?;

        let seek_id = tag
            .find_child(ElementType::SeekId)
            .and_then(EbmlTag::as_binary)
            .map(|bytes| bytes.iter().fold(0u32, |id, &byte| (id << 8) | u32::from(byte)))
            .ok_or(Error::DecodeError("mkv: missing seek id"))?;

        let seek_position = tag
            .child_unsigned(ElementType::SeekPosition)
            .ok_or(Error::DecodeError("mkv: missing seek position"))?;

        Ok(SeekEntryElement { seek_id, seek_position })
    }
}

#[derive(Clone, Debug)]
pub struct SeekHeadElement {
    pub entries: Vec<SeekEntryElement>,
}

impl Element for SeekHeadElement {
    const ID: ElementType = ElementType::SeekHead;

    fn parse(tag: &EbmlTag) -> Result<Self> {
        expect_tag(tag, Self::ID)?;
        Ok(SeekHeadElement { entries: parse_children(tag)? })
    }
}

/// Matroska track types of interest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackType {
    Video,
    Audio,
    Subtitle,
    Other,
}

impl TrackType {
    fn from_unsigned(value: u64) -> TrackType {
        match value {
            1 => TrackType::Video,
            2 => TrackType::Audio,
            17 => TrackType::Subtitle,
            _ => TrackType::Other,
        }
    }
}

#[derive(Clone, Debug)]
pub struct VideoElement {
    pub pixel_width: u64,
    pub pixel_height: u64,
    pub display_width: Option<u64>,
    pub display_height: Option<u64>,
}

impl Element for VideoElement {
    const ID: ElementType = ElementType::Video;

    fn parse(tag: &EbmlTag) -> Result<Self> {
        expect_tag(tag, Self::ID)?;
        Ok(VideoElement {
            pixel_width: tag
                .child_unsigned(ElementType::PixelWidth)
                .ok_or(Error::DecodeError("mkv: missing pixel width"))?,
            pixel_height: tag
                .child_unsigned(ElementType::PixelHeight)
                .ok_or(Error::DecodeError("mkv: missing pixel height"))?,
            display_width: tag.child_unsigned(ElementType::DisplayWidth),
            display_height: tag.child_unsigned(ElementType::DisplayHeight),
        })
    }
}

#[derive(Clone, Debug)]
pub struct AudioElement {
    pub sampling_frequency: f64,
    pub output_sampling_frequency: Option<f64>,
    pub channels: u64,
    pub bit_depth: Option<u64>,
}

impl Element for AudioElement {
    const ID: ElementType = ElementType::Audio;

    fn parse(tag: &EbmlTag) -> Result<Self> {
        expect_tag(tag, Self::ID)?;
        Ok(AudioElement {
            sampling_frequency: tag.child_float(ElementType::SamplingFrequency).unwrap_or(8000.0),
            output_sampling_frequency: tag.child_float(ElementType::OutputSamplingFrequency),
            channels: tag.child_unsigned(ElementType::Channels).unwrap_or(1),
            bit_depth: tag.child_unsigned(ElementType::BitDepth),
        })
    }
}

/// One TrackEntry: immutable once parsed from a Tracks element.
#[derive(Clone, Debug)]
pub struct TrackEntryElement {
    pub number: u64,
    pub uid: Option<u64>,
    pub track_type: TrackType,
    pub flag_enabled: bool,
    pub flag_default: bool,
    pub flag_forced: bool,
    pub flag_lacing: bool,
    /// Declared frame duration in nanoseconds.
    pub default_duration: Option<u64>,
    pub language: Option<String>,
    pub name: Option<String>,
    pub codec_id: String,
    pub codec_private: Option<Box<[u8]>>,
    pub video: Option<VideoElement>,
    pub audio: Option<AudioElement>,
}

impl Element for TrackEntryElement {
    const ID: ElementType = ElementType::TrackEntry;

    fn parse(tag: &EbmlTag) -> Result<Self> {
        expect_tag(tag, Self::ID)?;

        let number = tag
            .child_unsigned(ElementType::TrackNumber)
            .ok_or(Error::DecodeError("mkv: missing track number"))?;
        if number == 0 {
            return decode_error("mkv: track number must be non-zero");
        }

        let track_type = tag
            .child_unsigned(ElementType::TrackType)
            .map(TrackType::from_unsigned)
            .ok_or(Error::DecodeError("mkv: missing track type"))?;

        let codec_id = tag
            .child_string(ElementType::CodecId)
            .ok_or(Error::DecodeError("mkv: missing codec id"))?;

        let video = tag.find_child(ElementType::Video).map(VideoElement::parse).transpose()?;
        let audio = tag.find_child(ElementType::Audio).map(AudioElement::parse).transpose()?;

        Ok(TrackEntryElement {
            number,
            uid: tag.child_unsigned(ElementType::TrackUid),
            track_type,
            flag_enabled: tag.child_unsigned(ElementType::FlagEnabled).unwrap_or(1) != 0,
            flag_default: tag.child_unsigned(ElementType::FlagDefault).unwrap_or(1) != 0,
            flag_forced: tag.child_unsigned(ElementType::FlagForced).unwrap_or(0) != 0,
            flag_lacing: tag.child_unsigned(ElementType::FlagLacing).unwrap_or(1) != 0,
            default_duration: tag.child_unsigned(ElementType::DefaultDuration),
            language: tag.child_string(ElementType::Language),
            name: tag.child_string(ElementType::Name),
            codec_id,
            codec_private: tag.child_binary(ElementType::CodecPrivate),
            video,
            audio,
        })
    }
}

#[derive(Clone, Debug)]
pub struct TracksElement {
    pub tracks: Vec<TrackEntryElement>,
}

impl Element for TracksElement {
    const ID: ElementType = ElementType::Tracks;

    fn parse(tag: &EbmlTag) -> Result<Self> {
        expect_tag(tag, Self::ID)?;
        Ok(TracksElement { tracks: parse_children(tag)? })
    }
}

/// Byte positions of one track within a cue point.
#[derive(Clone, Debug)]
pub struct CueTrackPositionsElement {
    pub track: u64,
    /// Position of the cluster, relative to the segment content start.
    pub cluster_position: u64,
    /// Position of the block inside the cluster.
    pub relative_position: Option<u64>,
    pub duration: Option<u64>,
}

impl Element for CueTrackPositionsElement {
    const ID: ElementType = ElementType::CueTrackPositions;

    fn parse(tag: &EbmlTag) -> Result<Self> {
        expect_tag(tag, Self::ID)?;
        Ok(CueTrackPositionsElement {
            track: tag
                .child_unsigned(ElementType::CueTrack)
                .ok_or(Error::DecodeError("mkv: missing cue track"))?,
            cluster_position: tag
                .child_unsigned(ElementType::CueClusterPosition)
                .ok_or(Error::DecodeError("mkv: missing cue cluster position"))?,
            relative_position: tag.child_unsigned(ElementType::CueRelativePosition),
            duration: tag.child_unsigned(ElementType::CueDuration),
        })
    }
}

#[derive(Clone, Debug)]
pub struct CuePointElement {
    /// Presentation timestamp in timestamp units.
    pub time: u64,
    pub track_positions: Vec<CueTrackPositionsElement>,
}

impl Element for CuePointElement {
    const ID: ElementType = ElementType::CuePoint;

    fn parse(tag: &EbmlTag) -> Result<Self> {
        expect_tag(tag, Self::ID)?;

        let time = tag
            .child_unsigned(ElementType::CueTime)
            .ok_or(Error::DecodeError("mkv: missing cue time"))?;

        let track_positions: Vec<CueTrackPositionsElement> = parse_children(tag)?;
        if track_positions.is_empty() {
            return decode_error("mkv: cue point without track positions");
        }

        Ok(CuePointElement { time, track_positions })
    }
}

#[derive(Clone, Debug)]
pub struct CuesElement {
    pub points: Vec<CuePointElement>,
}

impl Element for CuesElement {
    const ID: ElementType = ElementType::Cues;

    fn parse(tag: &EbmlTag) -> Result<Self> {
        expect_tag(tag, Self::ID)?;
        Ok(CuesElement { points: parse_children(tag)? })
    }
}

#[derive(Clone, Debug)]
pub struct SimpleTagElement {
    pub name: String,
    pub language: Option<String>,
    pub default: bool,
    pub value: Option<String>,
}

impl Element for SimpleTagElement {
    const ID: ElementType = ElementType::SimpleTag;

    fn parse(tag: &EbmlTag) -> Result<Self> {
        expect_tag(tag, Self::ID)?;
        Ok(SimpleTagElement {
            name: tag
                .child_string(ElementType::TagName)
                .ok_or(Error::DecodeError("mkv: missing tag name"))?,
            language: tag.child_string(ElementType::TagLanguage),
            default: tag.child_unsigned(ElementType::TagDefault).unwrap_or(1) != 0,
            value: tag.child_string(ElementType::TagString),
        })
    }
}

/// What a metadata tag applies to.
#[derive(Clone, Debug, Default)]
pub struct TagTargets {
    pub target_type: Option<String>,
    pub target_type_value: Option<u64>,
    pub track_uids: Vec<u64>,
}

#[derive(Clone, Debug)]
pub struct TagElement {
    pub targets: TagTargets,
    pub simple_tags: Vec<SimpleTagElement>,
}

impl Element for TagElement {
    const ID: ElementType = ElementType::Tag;

    fn parse(tag: &EbmlTag) -> Result<Self> {
        expect_tag(tag, Self::ID)?;

        let targets = match tag.find_child(ElementType::Targets) {
            Some(targets) => TagTargets {
                target_type: targets.child_string(ElementType::TargetType),
                target_type_value: targets.child_unsigned(ElementType::TargetTypeValue),
                track_uids: targets
                    .children_of(ElementType::TagTrackUid)
                    .filter_map(EbmlTag::as_unsigned)
                    .collect(),
            },
            None => TagTargets::default(),
        };

        Ok(TagElement { targets, simple_tags: parse_children(tag)? })
    }
}

#[derive(Clone, Debug)]
pub struct TagsElement {
    pub tags: Vec<TagElement>,
}

impl Element for TagsElement {
    const ID: ElementType = ElementType::Tags;

    fn parse(tag: &EbmlTag) -> Result<Self> {
        expect_tag(tag, Self::ID)?;
        Ok(TagsElement { tags: parse_children(tag)? })
    }
}

/// A time-coded group of compressed frames in both block representations.
#[derive(Clone, Debug)]
pub struct ClusterElement {
    /// Cluster timestamp in timestamp units.
    pub timestamp: u64,
    pub simple_blocks: Vec<Block>,
    pub block_groups: Vec<BlockGroup>,
}

impl Element for ClusterElement {
    const ID: ElementType = ElementType::Cluster;

    fn parse(tag: &EbmlTag) -> Result<Self> {
        expect_tag(tag, Self::ID)?;

        let mut cluster =
            ClusterElement { timestamp: 0, simple_blocks: Vec::new(), block_groups: Vec::new() };

        for child in tag.children() {
            match child.element_type {
                ElementType::Timestamp => {
                    cluster.timestamp = child.as_unsigned().unwrap_or(0);
                }
                ElementType::SimpleBlock => {
                    if let Some(payload) = child.as_binary() {
                        cluster.simple_blocks.push(Block::read(payload, true)?);
                    }
                }
                ElementType::BlockGroup => {
                    cluster.block_groups.push(parse_block_group(child)?);
                }
                other => {
                    debug!("mkv: ignoring cluster child {:?}", other);
                }
            }
        }

        Ok(cluster)
    }
}

pub fn parse_block_group(tag: &EbmlTag) -> Result<BlockGroup> {
    expect_tag(tag, ElementType::BlockGroup)?;

    let payload = tag
        .find_child(ElementType::Block)
        .and_then(EbmlTag::as_binary)
        .ok_or(Error::DecodeError("mkv: block group without block"))?;

    Ok(BlockGroup {
        block: Block::read(payload, false)?,
        reference_block: tag.find_child(ElementType::ReferenceBlock).and_then(EbmlTag::as_signed),
        duration: tag.child_unsigned(ElementType::BlockDuration),
    })
}

#[cfg(test)]
mod tests {
    use super::{
        ClusterElement, CuePointElement, Element, InfoElement, SeekHeadElement, TrackEntryElement,
    };
    use crate::ebml::{EbmlTag, TagData};

    #[test]
    fn verify_info_defaults() {
        let tag = EbmlTag::master_end(0x1549A966, 0, 5, Vec::new());
        let info = InfoElement::parse(&tag).unwrap();
        assert_eq!(info.timestamp_scale, 1_000_000);
        assert!(info.duration.is_none());
    }

    #[test]
    fn verify_seek_head() {
        let seek = EbmlTag::master_end(
            0x4DBB,
            10,
            2,
            vec![
                EbmlTag::leaf(
                    0x53AB,
                    12,
                    3,
                    TagData::Binary(Box::from(&[0x1c, 0x53, 0xbb, 0x6b][..])),
                ),
                EbmlTag::leaf(0x53AC, 19, 3, TagData::Unsigned(4096)),
            ],
        );
        let tag = EbmlTag::master_end(0x114D9B74, 5, 5, vec![seek]);

        let seek_head = SeekHeadElement::parse(&tag).unwrap();
        assert_eq!(seek_head.entries.len(), 1);
        assert_eq!(seek_head.entries[0].seek_id, 0x1C53BB6B);
        assert_eq!(seek_head.entries[0].seek_position, 4096);
    }

    #[test]
    fn verify_track_entry_flags_default() {
        let tag = EbmlTag::master_end(
            0xAE,
            0,
            2,
            vec![
                EbmlTag::leaf(0xD7, 2, 2, TagData::Unsigned(1)),
                EbmlTag::leaf(0x83, 4, 2, TagData::Unsigned(2)),
                EbmlTag::leaf(0x86, 6, 2, TagData::String("A_OPUS".into())),
            ],
        );

        let entry = TrackEntryElement::parse(&tag).unwrap();
        assert_eq!(entry.number, 1);
        assert!(entry.flag_enabled);
        assert!(entry.flag_default);
        assert!(!entry.flag_forced);
        assert_eq!(entry.codec_id, "A_OPUS");
    }

    #[test]
    fn verify_track_number_zero_is_error() {
        let tag = EbmlTag::master_end(
            0xAE,
            0,
            2,
            vec![
                EbmlTag::leaf(0xD7, 2, 2, TagData::Unsigned(0)),
                EbmlTag::leaf(0x83, 4, 2, TagData::Unsigned(2)),
                EbmlTag::leaf(0x86, 6, 2, TagData::String("A_OPUS".into())),
            ],
        );
        assert!(TrackEntryElement::parse(&tag).is_err());
    }

    #[test]
    fn verify_cue_point_requires_positions() {
        let tag = EbmlTag::master_end(
            0xBB,
            0,
            2,
            vec![EbmlTag::leaf(0xB3, 2, 2, TagData::Unsigned(1000))],
        );
        assert!(CuePointElement::parse(&tag).is_err());
    }

    #[test]
    fn verify_cluster_parse() {
        let tag = EbmlTag::master_end(
            0x1F43B675,
            0,
            6,
            vec![
                EbmlTag::leaf(0xE7, 6, 2, TagData::Unsigned(500)),
                EbmlTag::leaf(
                    0xA3,
                    10,
                    2,
                    TagData::Binary(Box::from(&[0x81, 0x00, 0x10, 0x80, 0xaa][..])),
                ),
                EbmlTag::master_end(
                    0xA0,
                    20,
                    2,
                    vec![
                        EbmlTag::leaf(
                            0xA1,
                            22,
                            2,
                            TagData::Binary(Box::from(&[0x81, 0x00, 0x20, 0x00, 0xbb][..])),
                        ),
                        EbmlTag::leaf(0xFB, 30, 2, TagData::Signed(-16)),
                    ],
                ),
            ],
        );

        let cluster = ClusterElement::parse(&tag).unwrap();
        assert_eq!(cluster.timestamp, 500);
        assert_eq!(cluster.simple_blocks.len(), 1);
        assert!(cluster.simple_blocks[0].keyframe);
        assert_eq!(cluster.block_groups.len(), 1);
        assert_eq!(cluster.block_groups[0].reference_block, Some(-16));
        assert!(!cluster.block_groups[0].keyframe());
    }
}
