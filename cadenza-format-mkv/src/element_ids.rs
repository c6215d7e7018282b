// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use phf::phf_map;

/// The payload data type of an EBML element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Type {
    Master,
    Unsigned,
    Signed,
    Float,
    String,
    Binary,
    Date,
}

/// Element types of interest, a subset of the Matroska schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    Ebml,
    Crc32,
    Void,
    Segment,
    SeekHead,
    Seek,
    SeekId,
    SeekPosition,
    Info,
    TimestampScale,
    Duration,
    Title,
    MuxingApp,
    WritingApp,
    Cluster,
    Timestamp,
    SimpleBlock,
    BlockGroup,
    Block,
    BlockDuration,
    ReferenceBlock,
    Tracks,
    TrackEntry,
    TrackNumber,
    TrackUid,
    TrackType,
    FlagEnabled,
    FlagDefault,
    FlagForced,
    FlagLacing,
    DefaultDuration,
    Name,
    Language,
    CodecId,
    CodecPrivate,
    CodecName,
    Video,
    PixelWidth,
    PixelHeight,
    DisplayWidth,
    DisplayHeight,
    Audio,
    SamplingFrequency,
    OutputSamplingFrequency,
    Channels,
    BitDepth,
    Cues,
    CuePoint,
    CueTime,
    CueTrackPositions,
    CueTrack,
    CueClusterPosition,
    CueRelativePosition,
    CueDuration,
    Tags,
    Tag,
    Targets,
    TargetType,
    TargetTypeValue,
    TagTrackUid,
    SimpleTag,
    TagName,
    TagLanguage,
    TagDefault,
    TagString,
    TagBinary,
    Unknown,
}

impl ElementType {
    /// True for elements that appear as direct children of the Segment.
    pub fn is_top_level(&self) -> bool {
        matches!(
            self,
            ElementType::Cluster
                | ElementType::Cues
                | ElementType::Info
                | ElementType::SeekHead
                | ElementType::Tags
                | ElementType::Tracks
        )
    }
}

/// Maps a raw element id to its payload type and element type.
pub fn lookup(id: u32) -> (Type, ElementType) {
    match ELEMENTS.get(&id) {
        Some(&entry) => entry,
        None => (Type::Binary, ElementType::Unknown),
    }
}

static ELEMENTS: phf::Map<u32, (Type, ElementType)> = phf_map! {
    0x1A45DFA3u32 => (Type::Master, ElementType::Ebml),
    0xBFu32 => (Type::Binary, ElementType::Crc32),
    0xECu32 => (Type::Binary, ElementType::Void),
    0x18538067u32 => (Type::Master, ElementType::Segment),
    0x114D9B74u32 => (Type::Master, ElementType::SeekHead),
    0x4DBBu32 => (Type::Master, ElementType::Seek),
    0x53ABu32 => (Type::Binary, ElementType::SeekId),
    0x53ACu32 => (Type::Unsigned, ElementType::SeekPosition),
    0x1549A966u32 => (Type::Master, ElementType::Info),
    0x2AD7B1u32 => (Type::Unsigned, ElementType::TimestampScale),
    0x4489u32 => (Type::Float, ElementType::Duration),
    0x7BA9u32 => (Type::String, ElementType::Title),
    0x4D80u32 => (Type::String, ElementType::MuxingApp),
    0x5741u32 => (Type::String, ElementType::WritingApp),
    0x1F43B675u32 => (Type::Master, ElementType::Cluster),
    0xE7u32 => (Type::Unsigned, ElementType::Timestamp),
    0xA3u32 => (Type::Binary, ElementType::SimpleBlock),
    0xA0u32 => (Type::Master, ElementType::BlockGroup),
    0xA1u32 => (Type::Binary, ElementType::Block),
    0x9Bu32 => (Type::Unsigned, ElementType::BlockDuration),
    0xFBu32 => (Type::Signed, ElementType::ReferenceBlock),
    0x1654AE6Bu32 => (Type::Master, ElementType::Tracks),
    0xAEu32 => (Type::Master, ElementType::TrackEntry),
    0xD7u32 => (Type::Unsigned, ElementType::TrackNumber),
    0x73C5u32 => (Type::Unsigned, ElementType::TrackUid),
    0x83u32 => (Type::Unsigned, ElementType::TrackType),
    0xB9u32 => (Type::Unsigned, ElementType::FlagEnabled),
    0x88u32 => (Type::Unsigned, ElementType::FlagDefault),
    0x55AAu32 => (Type::Unsigned, ElementType::FlagForced),
    0x9Cu32 => (Type::Unsigned, ElementType::FlagLacing),
    0x23E383u32 => (Type::Unsigned, ElementType::DefaultDuration),
    0x536Eu32 => (Type::String, ElementType::Name),
    0x22B59Cu32 => (Type::String, ElementType::Language),
    0x86u32 => (Type::String, ElementType::CodecId),
    0x63A2u32 => (Type::Binary, ElementType::CodecPrivate),
    0x258688u32 => (Type::String, ElementType::CodecName),
    0xE0u32 => (Type::Master, ElementType::Video),
    0xB0u32 => (Type::Unsigned, ElementType::PixelWidth),
    0xBAu32 => (Type::Unsigned, ElementType::PixelHeight),
    0x54B0u32 => (Type::Unsigned, ElementType::DisplayWidth),
    0x54BAu32 => (Type::Unsigned, ElementType::DisplayHeight),
    0xE1u32 => (Type::Master, ElementType::Audio),
    0xB5u32 => (Type::Float, ElementType::SamplingFrequency),
    0x78B5u32 => (Type::Float, ElementType::OutputSamplingFrequency),
    0x9Fu32 => (Type::Unsigned, ElementType::Channels),
    0x6264u32 => (Type::Unsigned, ElementType::BitDepth),
    0x1C53BB6Bu32 => (Type::Master, ElementType::Cues),
    0xBBu32 => (Type::Master, ElementType::CuePoint),
    0xB3u32 => (Type::Unsigned, ElementType::CueTime),
    0xB7u32 => (Type::Master, ElementType::CueTrackPositions),
    0xF7u32 => (Type::Unsigned, ElementType::CueTrack),
    0xF1u32 => (Type::Unsigned, ElementType::CueClusterPosition),
    0xF0u32 => (Type::Unsigned, ElementType::CueRelativePosition),
    0xB2u32 => (Type::Unsigned, ElementType::CueDuration),
    0x1254C367u32 => (Type::Master, ElementType::Tags),
    0x7373u32 => (Type::Master, ElementType::Tag),
    0x63C0u32 => (Type::Master, ElementType::Targets),
    0x63CAu32 => (Type::String, ElementType::TargetType),
    0x68CAu32 => (Type::Unsigned, ElementType::TargetTypeValue),
    0x63C5u32 => (Type::Unsigned, ElementType::TagTrackUid),
    0x67C8u32 => (Type::Master, ElementType::SimpleTag),
    0x45A3u32 => (Type::String, ElementType::TagName),
    0x447Au32 => (Type::String, ElementType::TagLanguage),
    0x4484u32 => (Type::Unsigned, ElementType::TagDefault),
    0x4487u32 => (Type::String, ElementType::TagString),
    0x4485u32 => (Type::Binary, ElementType::TagBinary),
};

/// Raw element ids referenced directly by the seek and segment machinery.
pub mod ids {
    pub const SEGMENT: u32 = 0x1853_8067;
    pub const SEEK_HEAD: u32 = 0x114D_9B74;
    pub const INFO: u32 = 0x1549_A966;
    pub const TRACKS: u32 = 0x1654_AE6B;
    pub const CUES: u32 = 0x1C53_BB6B;
    pub const TAGS: u32 = 0x1254_C367;
    pub const CLUSTER: u32 = 0x1F43_B675;
}
