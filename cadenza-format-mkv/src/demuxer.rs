// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The streaming demuxer: drives the segment scan over a tag source, resolves remote
//! metadata, seeks, and yields decoder-ready chunks.

use std::collections::VecDeque;

use log::debug;

use cadenza_core::codecs::DecoderSupport;
use cadenza_core::errors::{decode_error, Result};

use crate::block::enumerate_blocks;
use crate::ebml::{TagPosition, TagSource, TagStream};
use crate::element_ids::{ids, ElementType};
use crate::schema::{ClusterElement, CuesElement, Element, TagsElement, TrackType};
use crate::segment::SegmentModel;
use crate::tracks::{standard_track_predicate, standard_track_priority};

/// One-shot notifications raised while metadata resolves. Each fires at most once per
/// reader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentEvent {
    /// Track configurations are built; playback may start.
    MetadataLoaded,
    /// Cue index resolution finished, locally or remotely. The index may still be
    /// empty when the segment carries no cues.
    CuesLoaded,
    /// Metadata tag resolution finished.
    TagsLoaded,
}

/// A compressed frame with its derived timing, in microseconds.
#[derive(Clone, Debug)]
pub struct EncodedChunk {
    pub track: u64,
    pub keyframe: bool,
    pub timestamp: u64,
    pub duration: Option<u64>,
    pub data: Box<[u8]>,
}

/// A pull iterator over the clusters of one opened stream.
///
/// Dropping the iterator abandons the underlying stream, which aborts the request on
/// sources backed by range fetches.
pub struct Clusters<T: TagStream> {
    stream: T,
    buffered: VecDeque<ClusterElement>,
    done: bool,
}

impl<T: TagStream> Clusters<T> {
    fn new(stream: T) -> Clusters<T> {
        Clusters { stream, buffered: VecDeque::new(), done: false }
    }

    pub fn next_cluster(&mut self) -> Result<Option<ClusterElement>> {
        if let Some(cluster) = self.buffered.pop_front() {
            return Ok(Some(cluster));
        }
        if self.done {
            return Ok(None);
        }

        loop {
            let tag = match self.stream.next_tag()? {
                Some(tag) => tag,
                None => {
                    self.done = true;
                    return Ok(None);
                }
            };

            match (tag.element_type, tag.position) {
                (ElementType::Cluster, TagPosition::End) => {
                    return ClusterElement::parse(&tag).map(Some);
                }
                (ElementType::Segment, TagPosition::End) => {
                    self.done = true;
                    return Ok(None);
                }
                _ => {}
            }
        }
    }
}

/// The Matroska reader: a scanned segment model over a reopenable tag source.
pub struct MkvReader<S: TagSource> {
    source: S,
    segment: SegmentModel,
    events: VecDeque<SegmentEvent>,
    cues_event_fired: bool,
    tags_event_fired: bool,
}

impl<S: TagSource> MkvReader<S> {
    /// Open the source, scan to metadata completion, and build track configurations.
    ///
    /// Opening succeeds as long as at least one track configured; per-track failures
    /// are logged and the affected tracks stay unconfigured.
    pub fn open(source: S, support: &dyn DecoderSupport) -> Result<MkvReader<S>> {
        let mut stream = source.open(0)?;

        let mut segment: Option<SegmentModel> = None;

        while let Some(tag) = stream.next_tag()? {
            match &mut segment {
                None => {
                    if tag.element_type == ElementType::Segment
                        && tag.position == TagPosition::Start
                    {
                        segment = Some(SegmentModel::new(tag.start_offset, tag.header_len));
                    }
                }
                Some(segment) => {
                    segment.scan_meta(tag)?;
                    if segment.can_complete_meta() {
                        break;
                    }
                }
            }
        }

        let mut segment = match segment {
            Some(segment) => segment,
            None => return decode_error("mkv: no segment element found"),
        };

        if let Err(err) = segment.complete_meta(support) {
            let any_configured =
                segment.tracks().contexts().any(|context| context.configuration().is_some());
            if !any_configured {
                return Err(err);
            }
            debug!("mkv: continuing with partially configured tracks: {}", err);
        }

        let mut events = VecDeque::new();
        events.push_back(SegmentEvent::MetadataLoaded);

        let mut reader = MkvReader {
            source,
            segment,
            events,
            cues_event_fired: false,
            tags_event_fired: false,
        };

        if reader.segment.cues().prepared() {
            reader.fire_cues_event();
        }
        if !reader.segment.tags().is_empty() {
            reader.fire_tags_event();
        }

        Ok(reader)
    }

    pub fn segment(&self) -> &SegmentModel {
        &self.segment
    }

    /// The next pending one-shot event, if any.
    pub fn next_event(&mut self) -> Option<SegmentEvent> {
        self.events.pop_front()
    }

    fn fire_cues_event(&mut self) {
        if !self.cues_event_fired {
            self.cues_event_fired = true;
            self.events.push_back(SegmentEvent::CuesLoaded);
        }
    }

    fn fire_tags_event(&mut self) {
        if !self.tags_event_fired {
            self.tags_event_fired = true;
            self.events.push_back(SegmentEvent::TagsLoaded);
        }
    }

    /// Make the cue index available, fetching the Cues element through the seek head
    /// when it was not scanned locally. Returns whether the index is usable.
    pub fn ensure_cues(&mut self) -> Result<bool> {
        if self.segment.cues().prepared() {
            self.fire_cues_event();
            return Ok(true);
        }

        // The element may have been scanned but deferred, e.g. cues stored ahead of
        // the first cluster in a file that completed early.
        let local = match self
            .segment
            .seek_index()
            .tag_index_by_seek_id(ids::CUES)
            .and_then(|index| self.segment.meta_tag(index))
        {
            Some(tag) => Some(CuesElement::parse(tag)?),
            None => None,
        };

        if let Some(cues) = local {
            self.segment.prepare_cues(cues);
        }
        else if let Some(offset) = self.segment.seek_index().seek_offset_by_id(ids::CUES) {
            if let Some(cues) = self.fetch_remote::<CuesElement>(offset)? {
                self.segment.prepare_cues(cues);
            }
        }

        self.fire_cues_event();
        Ok(self.segment.cues().prepared())
    }

    /// Make the metadata tags available, fetching the Tags element through the seek
    /// head when it was not scanned locally. Returns whether any tags are present.
    pub fn ensure_tags(&mut self) -> Result<bool> {
        if self.segment.tags().is_empty() && !self.tags_event_fired {
            if let Some(offset) = self.segment.seek_index().seek_offset_by_id(ids::TAGS) {
                if let Some(tags) = self.fetch_remote::<TagsElement>(offset)? {
                    self.segment.append_tags(tags);
                }
            }
        }

        self.fire_tags_event();
        Ok(!self.segment.tags().is_empty())
    }

    /// Open a stream at `offset` and parse the first matching top-level element.
    fn fetch_remote<T: Element>(&self, offset: u64) -> Result<Option<T>> {
        let mut stream = self.source.open(offset)?;

        while let Some(tag) = stream.next_tag()? {
            if tag.element_type == T::ID && tag.is_end() {
                return T::parse(&tag).map(Some);
            }
            // Ran into media data without finding the element.
            if tag.element_type == ElementType::Cluster {
                break;
            }
        }

        debug!("mkv: remote element {:?} not found at offset {}", T::ID, offset);
        Ok(None)
    }

    /// Position a cluster stream at the given presentation time, in microseconds.
    ///
    /// With a cue index the closest cue wins. Without one the clusters are scanned
    /// linearly with a two-cluster window, so playback starts at the cluster preceding
    /// the target.
    pub fn seek(&mut self, time: u64) -> Result<Clusters<S::Stream>> {
        let units = time.saturating_mul(1000) / self.segment.timestamp_scale();

        if time == 0 {
            return self.clusters_from(self.segment.first_cluster_offset()?);
        }

        if self.ensure_cues()? {
            let offset = {
                let cues = self.segment.cues();
                cues.find_closest_cue(units).map(|cue| {
                    let positions = cues.cue_track_positions(cue, None);
                    self.segment
                        .seek_index()
                        .offset_from_seek_position(positions.cluster_position)
                })
            };
            if let Some(offset) = offset {
                return self.clusters_from(offset);
            }
        }

        self.seek_without_cues(units)
    }

    fn seek_without_cues(&mut self, units: u64) -> Result<Clusters<S::Stream>> {
        let mut clusters = self.clusters_from(self.segment.first_cluster_offset()?)?;
        let mut previous: Option<ClusterElement> = None;

        while let Some(next) = clusters.next_cluster()? {
            if next.timestamp > units {
                clusters.buffered.push_front(next);
                if let Some(previous) = previous {
                    clusters.buffered.push_front(previous);
                }
                return Ok(clusters);
            }
            previous = Some(next);
        }

        // Target past the last cluster: replay the final one.
        if let Some(previous) = previous {
            clusters.buffered.push_front(previous);
        }
        Ok(clusters)
    }

    fn clusters_from(&self, offset: u64) -> Result<Clusters<S::Stream>> {
        Ok(Clusters::new(self.source.open(offset)?))
    }

    /// All chunks of `track` in a cluster, in presentation order with derived timing.
    ///
    /// Laced frames share the block's predicted duration and advance the timestamp by
    /// it, frame over frame.
    pub fn track_chunks(&mut self, cluster: &ClusterElement, track: u64) -> Vec<EncodedChunk> {
        let scale = self.segment.timestamp_scale();
        let mut chunks = Vec::new();

        for view in enumerate_blocks(cluster, track) {
            let units = cluster.timestamp as i64 + i64::from(view.rel_time);
            let block_time = units.max(0) as u64 * scale / 1000;

            let duration = self
                .segment
                .tracks_mut()
                .get_mut(track)
                .and_then(|context| context.predict_block_duration(block_time));

            for (index, frame) in view.frames.iter().enumerate() {
                chunks.push(EncodedChunk {
                    track,
                    keyframe: view.keyframe,
                    timestamp: block_time + duration.unwrap_or(0) * index as u64,
                    duration,
                    data: frame.clone(),
                });
            }
        }

        chunks
    }

    /// Chunks of the standard video track: the highest-priority enabled video track,
    /// forced over default over the rest.
    pub fn video_track_chunks(&mut self, cluster: &ClusterElement) -> Vec<EncodedChunk> {
        self.standard_track_chunks(cluster, TrackType::Video)
    }

    /// Chunks of the standard audio track, selected like the video counterpart.
    pub fn audio_track_chunks(&mut self, cluster: &ClusterElement) -> Vec<EncodedChunk> {
        self.standard_track_chunks(cluster, TrackType::Audio)
    }

    fn standard_track_chunks(
        &mut self,
        cluster: &ClusterElement,
        track_type: TrackType,
    ) -> Vec<EncodedChunk> {
        let track = self.segment.tracks().get_track_context(
            track_type,
            standard_track_predicate,
            standard_track_priority,
        );

        match track.map(|context| context.number()) {
            Some(number) => self.track_chunks(cluster, number),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MkvReader, SegmentEvent};
    use crate::ebml::{EbmlTag, TagData, VecTagSource};
    use crate::element_ids::ids;
    use cadenza_core::codecs::AcceptAll;

    fn info_tag(start_offset: u64) -> EbmlTag {
        EbmlTag::master_end(
            ids::INFO,
            start_offset,
            5,
            vec![EbmlTag::leaf(0x2AD7B1, start_offset + 5, 4, TagData::Unsigned(1_000_000))],
        )
    }

    fn opus_tracks_tag(start_offset: u64, default_duration: Option<u64>) -> EbmlTag {
        let mut children = vec![
            EbmlTag::leaf(0xD7, start_offset + 4, 2, TagData::Unsigned(1)),
            EbmlTag::leaf(0x83, start_offset + 6, 2, TagData::Unsigned(2)),
            EbmlTag::leaf(0x86, start_offset + 8, 2, TagData::String("A_OPUS".into())),
        ];
        if let Some(duration) = default_duration {
            children.push(EbmlTag::leaf(
                0x23E383,
                start_offset + 16,
                4,
                TagData::Unsigned(duration),
            ));
        }
        EbmlTag::master_end(
            ids::TRACKS,
            start_offset,
            5,
            vec![EbmlTag::master_end(0xAE, start_offset + 2, 2, children)],
        )
    }

    fn seek_head_tag(start_offset: u64, entries: Vec<(&[u8], u64)>) -> EbmlTag {
        let seeks = entries
            .into_iter()
            .map(|(id, position)| {
                EbmlTag::master_end(
                    0x4DBB,
                    start_offset + 5,
                    2,
                    vec![
                        EbmlTag::leaf(0x53AB, start_offset + 7, 3, TagData::Binary(id.into())),
                        EbmlTag::leaf(0x53AC, start_offset + 14, 3, TagData::Unsigned(position)),
                    ],
                )
            })
            .collect();
        EbmlTag::master_end(ids::SEEK_HEAD, start_offset, 5, seeks)
    }

    fn cluster_tags(start_offset: u64, timestamp: u64, payloads: &[&[u8]]) -> Vec<EbmlTag> {
        let mut children =
            vec![EbmlTag::leaf(0xE7, start_offset + 8, 2, TagData::Unsigned(timestamp))];
        for (index, payload) in payloads.iter().enumerate() {
            children.push(EbmlTag::leaf(
                0xA3,
                start_offset + 12 + index as u64 * 10,
                2,
                TagData::Binary((*payload).into()),
            ));
        }
        vec![
            EbmlTag::master_start(ids::CLUSTER, start_offset, 8),
            EbmlTag::master_end(ids::CLUSTER, start_offset, 8, children),
        ]
    }

    fn keyed_block(rel_time: i16, data: &[u8]) -> Vec<u8> {
        let time = rel_time.to_be_bytes();
        let mut payload = vec![0x81, time[0], time[1], 0x80];
        payload.extend_from_slice(data);
        payload
    }

    fn basic_source(with_seek_head: bool) -> VecTagSource {
        let mut tags = vec![EbmlTag::master_start(ids::SEGMENT, 0, 12)];
        if with_seek_head {
            tags.push(seek_head_tag(
                12,
                vec![(&[0x1c, 0x53, 0xbb, 0x6b][..], 4000), (&[0x12, 0x54, 0xc3, 0x67][..], 5000)],
            ));
        }
        tags.push(info_tag(40));
        tags.push(opus_tracks_tag(80, Some(20_000_000)));
        tags.extend(cluster_tags(300, 0, &[&keyed_block(0, &[0xaa]), &keyed_block(20, &[0xbb])]));
        tags.extend(cluster_tags(400, 100, &[&keyed_block(0, &[0xcc])]));
        tags.extend(cluster_tags(500, 200, &[&keyed_block(0, &[0xdd])]));

        if with_seek_head {
            // Remote Cues at segment-relative 4000, Tags at 5000.
            let cue_point = |time: u64, position: u64| {
                EbmlTag::master_end(
                    0xBB,
                    4020,
                    2,
                    vec![
                        EbmlTag::leaf(0xB3, 4022, 2, TagData::Unsigned(time)),
                        EbmlTag::master_end(
                            0xB7,
                            4026,
                            2,
                            vec![
                                EbmlTag::leaf(0xF7, 4028, 2, TagData::Unsigned(1)),
                                EbmlTag::leaf(0xF1, 4031, 2, TagData::Unsigned(position)),
                            ],
                        ),
                    ],
                )
            };
            tags.push(EbmlTag::master_end(
                ids::CUES,
                4012,
                5,
                vec![cue_point(0, 288), cue_point(100, 388), cue_point(200, 488)],
            ));
            tags.push(EbmlTag::master_end(
                ids::TAGS,
                5012,
                5,
                vec![EbmlTag::master_end(
                    0x7373,
                    5020,
                    2,
                    vec![EbmlTag::master_end(
                        0x67C8,
                        5030,
                        2,
                        vec![
                            EbmlTag::leaf(0x45A3, 5032, 2, TagData::String("TITLE".into())),
                            EbmlTag::leaf(0x4487, 5040, 2, TagData::String("demo".into())),
                        ],
                    )],
                )],
            ));
        }

        VecTagSource::new(tags)
    }

    #[test]
    fn verify_open_completes_metadata() {
        let mut reader = MkvReader::open(basic_source(false), &AcceptAll).unwrap();

        assert_eq!(reader.next_event(), Some(SegmentEvent::MetadataLoaded));
        assert_eq!(reader.next_event(), None);
        assert!(reader.segment().tracks().get(1).unwrap().configuration().is_some());
    }

    #[test]
    fn verify_seek_to_zero_starts_at_first_cluster() {
        let mut reader = MkvReader::open(basic_source(false), &AcceptAll).unwrap();

        let mut clusters = reader.seek(0).unwrap();
        assert_eq!(clusters.next_cluster().unwrap().unwrap().timestamp, 0);
        assert_eq!(clusters.next_cluster().unwrap().unwrap().timestamp, 100);
        assert_eq!(clusters.next_cluster().unwrap().unwrap().timestamp, 200);
        assert!(clusters.next_cluster().unwrap().is_none());
    }

    #[test]
    fn verify_seek_through_remote_cues() {
        let mut reader = MkvReader::open(basic_source(true), &AcceptAll).unwrap();
        assert_eq!(reader.next_event(), Some(SegmentEvent::MetadataLoaded));

        // 120 ms sits between the 100 and 200 unit cues; the closer cue at 100 wins
        // and its cluster position resolves to the second cluster.
        let mut clusters = reader.seek(120_000).unwrap();
        assert_eq!(reader.next_event(), Some(SegmentEvent::CuesLoaded));
        assert_eq!(clusters.next_cluster().unwrap().unwrap().timestamp, 100);
        assert_eq!(clusters.next_cluster().unwrap().unwrap().timestamp, 200);
    }

    #[test]
    fn verify_cues_event_fires_once() {
        let mut reader = MkvReader::open(basic_source(true), &AcceptAll).unwrap();
        reader.next_event();

        assert!(reader.ensure_cues().unwrap());
        assert_eq!(reader.next_event(), Some(SegmentEvent::CuesLoaded));
        assert!(reader.ensure_cues().unwrap());
        assert_eq!(reader.next_event(), None);
    }

    #[test]
    fn verify_seek_without_cues_keeps_preceding_cluster() {
        let mut reader = MkvReader::open(basic_source(false), &AcceptAll).unwrap();

        // 150 ms: the window yields the cluster at 100 units, then the one at 200.
        let mut clusters = reader.seek(150_000).unwrap();
        assert_eq!(clusters.next_cluster().unwrap().unwrap().timestamp, 100);
        assert_eq!(clusters.next_cluster().unwrap().unwrap().timestamp, 200);
        assert!(clusters.next_cluster().unwrap().is_none());
    }

    #[test]
    fn verify_seek_past_end_replays_last_cluster() {
        let mut reader = MkvReader::open(basic_source(false), &AcceptAll).unwrap();

        let mut clusters = reader.seek(10_000_000).unwrap();
        assert_eq!(clusters.next_cluster().unwrap().unwrap().timestamp, 200);
        assert!(clusters.next_cluster().unwrap().is_none());
    }

    #[test]
    fn verify_remote_tags_resolution() {
        let mut reader = MkvReader::open(basic_source(true), &AcceptAll).unwrap();
        reader.next_event();

        assert!(reader.ensure_tags().unwrap());
        assert_eq!(reader.next_event(), Some(SegmentEvent::TagsLoaded));
        assert_eq!(reader.segment().tags().len(), 1);
        assert_eq!(reader.segment().tags()[0].simple_tags[0].name, "TITLE");
        assert_eq!(
            reader.segment().tags()[0].simple_tags[0].value.as_deref(),
            Some("demo")
        );
    }

    #[test]
    fn verify_chunk_timing() {
        let mut reader = MkvReader::open(basic_source(false), &AcceptAll).unwrap();

        let mut clusters = reader.seek(0).unwrap();
        let cluster = clusters.next_cluster().unwrap().unwrap();
        let chunks = reader.track_chunks(&cluster, 1);

        assert_eq!(chunks.len(), 2);
        // Timestamp units are milliseconds at the default scale.
        assert_eq!(chunks[0].timestamp, 0);
        assert_eq!(chunks[0].duration, Some(20_000));
        assert!(chunks[0].keyframe);
        assert_eq!(chunks[1].timestamp, 20_000);
        assert_eq!(chunks[0].data.as_ref(), &[0xaa]);
        assert_eq!(chunks[1].data.as_ref(), &[0xbb]);
    }

    #[test]
    fn verify_standard_track_chunk_selection() {
        let mut reader = MkvReader::open(basic_source(false), &AcceptAll).unwrap();

        let mut clusters = reader.seek(0).unwrap();
        let cluster = clusters.next_cluster().unwrap().unwrap();

        // The only track is audio; the video surface yields nothing.
        assert_eq!(reader.audio_track_chunks(&cluster).len(), 2);
        assert!(reader.video_track_chunks(&cluster).is_empty());
    }

    #[test]
    fn verify_missing_segment_is_error() {
        let source = VecTagSource::new(vec![info_tag(0)]);
        assert!(MkvReader::open(source, &AcceptAll).is_err());
    }
}
