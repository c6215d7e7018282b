// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The track registry: per-track decode state layered over immutable track entries.

use std::collections::BTreeMap;

use log::debug;
use once_cell::unsync::OnceCell;

use cadenza_core::codecs::{AudioDecoderConfig, DecoderSupport, VideoDecoderConfig};
use cadenza_core::errors::{decode_error, Error, Result};

use crate::codecs::{make_audio_config, make_video_config, requires_keyframe_peek};
use crate::schema::{TrackEntryElement, TrackType, TracksElement};

/// The decoder configuration derived for one track.
#[derive(Clone, Debug)]
pub enum TrackConfiguration {
    Video(VideoDecoderConfig),
    Audio(AudioDecoderConfig),
}

/// Mutable per-track state: the parsed entry, the peeked keyframe where the codec
/// needs one, the derived configuration, and the block-duration estimator.
#[derive(Debug)]
pub struct TrackContext {
    pub entry: TrackEntryElement,
    peeked_keyframe: Option<Box<[u8]>>,
    configuration: OnceCell<TrackConfiguration>,
    last_block_timestamp: Option<u64>,
    average_block_duration: Option<f64>,
}

impl TrackContext {
    fn new(entry: TrackEntryElement) -> TrackContext {
        TrackContext {
            entry,
            peeked_keyframe: None,
            configuration: OnceCell::new(),
            last_block_timestamp: None,
            average_block_duration: None,
        }
    }

    pub fn number(&self) -> u64 {
        self.entry.number
    }

    /// True when this track's configuration cannot be derived from codec-private data
    /// alone and the first keyframe must be inspected first.
    pub fn requires_keyframe_peek(&self) -> bool {
        self.entry.track_type == TrackType::Video && requires_keyframe_peek(&self.entry.codec_id)
    }

    /// True when everything needed to derive the configuration is at hand.
    pub fn ready_to_configure(&self) -> bool {
        !self.requires_keyframe_peek() || self.peeked_keyframe.is_some()
    }

    /// Offer a block payload as a peek candidate. Only the first keyframe of a track
    /// that needs one is retained.
    pub fn offer_keyframe(&mut self, keyframe: bool, payload: &[u8]) {
        if keyframe && self.requires_keyframe_peek() && self.peeked_keyframe.is_none() {
            self.peeked_keyframe = Some(payload.into());
        }
    }

    pub fn configuration(&self) -> Option<&TrackConfiguration> {
        self.configuration.get()
    }

    /// Derive the decoder configuration, checking it against the platform capability
    /// seam. Computed once; later calls return the first result.
    pub fn build_configuration(
        &self,
        support: &dyn DecoderSupport,
    ) -> Result<&TrackConfiguration> {
        self.configuration.get_or_try_init(|| match self.entry.track_type {
            TrackType::Video => {
                let config =
                    make_video_config(&self.entry, self.peeked_keyframe.as_deref())?;
                if !support.supports_video(&config) {
                    return Err(Error::UnsupportedCodec {
                        codec: config.codec,
                        context: "platform video decoder",
                    });
                }
                Ok(TrackConfiguration::Video(config))
            }
            TrackType::Audio => {
                let config = make_audio_config(&self.entry)?;
                if !support.supports_audio(&config) {
                    return Err(Error::UnsupportedCodec {
                        codec: config.codec,
                        context: "platform audio decoder",
                    });
                }
                Ok(TrackConfiguration::Audio(config))
            }
            _ => decode_error("mkv: only video and audio tracks are configurable"),
        })
    }

    /// Predict the duration of the block starting at `block_timestamp` microseconds.
    ///
    /// Preference order: the declared default duration, the codec's fixed frame size
    /// over the sample rate, then a running average of observed block deltas. The
    /// average halves the weight of history at every step, so irregular streams
    /// converge quickly after a gap.
    pub fn predict_block_duration(&mut self, block_timestamp: u64) -> Option<u64> {
        if let Some(duration) = self.entry.default_duration {
            return Some(duration / 1000);
        }

        if let Some(TrackConfiguration::Audio(config)) = self.configuration.get() {
            if let Some(samples) = config.samples_per_frame {
                if config.sample_rate > 0 {
                    let duration =
                        f64::from(samples) / f64::from(config.sample_rate) * 1_000_000.0;
                    return Some(duration as u64);
                }
            }
        }

        let last = self.last_block_timestamp.replace(block_timestamp);

        let delta = match last {
            Some(last) if block_timestamp > last => (block_timestamp - last) as f64,
            _ => return self.average_block_duration.map(|avg| avg as u64),
        };

        let average = match self.average_block_duration {
            Some(average) => average * 0.5 + delta * 0.5,
            None => delta,
        };
        self.average_block_duration = Some(average);

        Some(average as u64)
    }

    /// Forget estimator history, e.g. after a seek discontinuity.
    pub fn reset_duration_estimator(&mut self) {
        self.last_block_timestamp = None;
    }
}

/// All tracks of a segment, keyed by track number.
#[derive(Debug, Default)]
pub struct TrackRegistry {
    contexts: BTreeMap<u64, TrackContext>,
}

/// Selects tracks that are enabled. The standard predicate for track selection.
pub fn standard_track_predicate(context: &TrackContext) -> bool {
    context.entry.flag_enabled
}

/// Ranks forced tracks above default tracks above the rest. The standard priority
/// for track selection.
pub fn standard_track_priority(context: &TrackContext) -> u64 {
    (u64::from(context.entry.flag_forced) << 8) + (u64::from(context.entry.flag_default) << 4)
}

impl TrackRegistry {
    /// Load the registry from a parsed Tracks element. A repeated track number keeps
    /// the first entry.
    pub fn prepare(&mut self, tracks: TracksElement) {
        for entry in tracks.tracks {
            let number = entry.number;
            if self.contexts.contains_key(&number) {
                debug!("mkv: ignoring duplicate track entry {}", number);
                continue;
            }
            self.contexts.insert(number, TrackContext::new(entry));
        }
    }

    pub fn prepared(&self) -> bool {
        !self.contexts.is_empty()
    }

    pub fn get(&self, track: u64) -> Option<&TrackContext> {
        self.contexts.get(&track)
    }

    pub fn get_mut(&mut self, track: u64) -> Option<&mut TrackContext> {
        self.contexts.get_mut(&track)
    }

    pub fn contexts(&self) -> impl Iterator<Item = &TrackContext> {
        self.contexts.values()
    }

    /// The highest-priority track of the given type that passes the predicate.
    /// Priority ties keep the lower track number.
    pub fn get_track_context(
        &self,
        track_type: TrackType,
        predicate: impl Fn(&TrackContext) -> bool,
        priority: impl Fn(&TrackContext) -> u64,
    ) -> Option<&TrackContext> {
        self.contexts
            .values()
            .filter(|context| context.entry.track_type == track_type)
            .filter(|context| predicate(context))
            // max_by_key keeps the later of equal keys; BTreeMap order makes that the
            // higher track number, so compare on (priority, Reverse(number)).
            .max_by_key(|context| (priority(context), std::cmp::Reverse(context.number())))
    }

    /// Offer a block payload to the owning track's keyframe peek.
    pub fn try_peek_keyframe(&mut self, track: u64, keyframe: bool, payload: &[u8]) {
        if let Some(context) = self.contexts.get_mut(&track) {
            context.offer_keyframe(keyframe, payload);
        }
    }

    /// True when every video and audio track can derive its configuration.
    pub fn ready_to_configure_all(&self) -> bool {
        self.contexts
            .values()
            .filter(|context| {
                matches!(context.entry.track_type, TrackType::Video | TrackType::Audio)
            })
            .all(TrackContext::ready_to_configure)
    }

    /// Derive configurations for every video and audio track.
    ///
    /// Per-track failures are aggregated and returned after all tracks were attempted,
    /// so one broken track leaves the others configured and usable.
    pub fn build_configurations(&self, support: &dyn DecoderSupport) -> Result<()> {
        let mut failures = Vec::new();

        for context in self.contexts.values() {
            if !matches!(context.entry.track_type, TrackType::Video | TrackType::Audio) {
                continue;
            }
            if let Err(err) = context.build_configuration(support) {
                failures.push(err);
            }
        }

        if failures.is_empty() {
            Ok(())
        }
        else {
            Err(Error::AggregateParse(failures))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        standard_track_predicate, standard_track_priority, TrackConfiguration, TrackRegistry,
    };
    use crate::schema::{AudioElement, TrackEntryElement, TrackType, TracksElement, VideoElement};
    use cadenza_core::codecs::{AcceptAll, AudioDecoderConfig, DecoderSupport, VideoDecoderConfig};
    use cadenza_core::errors::Error;

    fn entry(number: u64, track_type: TrackType, codec_id: &str) -> TrackEntryElement {
        TrackEntryElement {
            number,
            uid: None,
            track_type,
            flag_enabled: true,
            flag_default: true,
            flag_forced: false,
            flag_lacing: true,
            default_duration: None,
            language: None,
            name: None,
            codec_id: codec_id.to_string(),
            codec_private: None,
            video: match track_type {
                TrackType::Video => Some(VideoElement {
                    pixel_width: 640,
                    pixel_height: 360,
                    display_width: None,
                    display_height: None,
                }),
                _ => None,
            },
            audio: match track_type {
                TrackType::Audio => Some(AudioElement {
                    sampling_frequency: 48000.0,
                    output_sampling_frequency: None,
                    channels: 2,
                    bit_depth: None,
                }),
                _ => None,
            },
        }
    }

    fn registry(entries: Vec<TrackEntryElement>) -> TrackRegistry {
        let mut registry = TrackRegistry::default();
        registry.prepare(TracksElement { tracks: entries });
        registry
    }

    #[test]
    fn verify_keyframe_peek_gates_readiness() {
        let mut registry = registry(vec![
            entry(1, TrackType::Video, "V_VP9"),
            entry(2, TrackType::Audio, "A_OPUS"),
        ]);

        assert!(!registry.ready_to_configure_all());

        // A delta frame is not enough.
        registry.try_peek_keyframe(1, false, &[0x00]);
        assert!(!registry.ready_to_configure_all());

        let keyframe = [0x82, 0x49, 0x83, 0x42, 0x20, 0x27, 0xf0, 0x16, 0x70];
        registry.try_peek_keyframe(1, true, &keyframe);
        assert!(registry.ready_to_configure_all());

        registry.build_configurations(&AcceptAll).unwrap();
        match registry.get(1).unwrap().configuration().unwrap() {
            TrackConfiguration::Video(config) => assert_eq!(config.codec, "vp09.00.21.08"),
            other => panic!("unexpected configuration {:?}", other),
        }
    }

    #[test]
    fn verify_aggregate_failure_keeps_good_tracks() {
        let registry = registry(vec![
            entry(1, TrackType::Video, "V_REAL/RV40"),
            entry(2, TrackType::Audio, "A_OPUS"),
        ]);

        let err = registry.build_configurations(&AcceptAll).unwrap_err();
        match err {
            Error::AggregateParse(failures) => assert_eq!(failures.len(), 1),
            other => panic!("unexpected error {:?}", other),
        }

        // The audio track survived the aggregate failure.
        assert!(registry.get(2).unwrap().configuration().is_some());
        assert!(registry.get(1).unwrap().configuration().is_none());
    }

    #[test]
    fn verify_platform_rejection_is_typed() {
        struct RejectAll;
        impl DecoderSupport for RejectAll {
            fn supports_video(&self, _config: &VideoDecoderConfig) -> bool {
                false
            }
            fn supports_audio(&self, _config: &AudioDecoderConfig) -> bool {
                false
            }
        }

        let registry = registry(vec![entry(2, TrackType::Audio, "A_OPUS")]);
        let err = registry.get(2).unwrap().build_configuration(&RejectAll).unwrap_err();
        assert!(matches!(err, Error::UnsupportedCodec { .. }));
    }

    #[test]
    fn verify_track_selection_priority() {
        let mut forced = entry(3, TrackType::Audio, "A_OPUS");
        forced.flag_forced = true;
        forced.flag_default = false;
        let mut disabled = entry(4, TrackType::Audio, "A_OPUS");
        disabled.flag_enabled = false;
        disabled.flag_forced = true;

        let registry = registry(vec![
            entry(1, TrackType::Audio, "A_OPUS"),
            entry(2, TrackType::Audio, "A_OPUS"),
            forced,
            disabled,
        ]);

        let selected = registry
            .get_track_context(
                TrackType::Audio,
                standard_track_predicate,
                standard_track_priority,
            )
            .unwrap();
        assert_eq!(selected.number(), 3);
    }

    #[test]
    fn verify_track_selection_tie_keeps_lowest_number() {
        let registry = registry(vec![
            entry(5, TrackType::Audio, "A_OPUS"),
            entry(2, TrackType::Audio, "A_OPUS"),
        ]);

        let selected = registry
            .get_track_context(
                TrackType::Audio,
                standard_track_predicate,
                standard_track_priority,
            )
            .unwrap();
        assert_eq!(selected.number(), 2);
    }

    #[test]
    fn verify_default_duration_prediction() {
        let mut track = entry(1, TrackType::Video, "V_VP8");
        track.default_duration = Some(33_333_333);
        let mut registry = registry(vec![track]);

        let context = registry.get_mut(1).unwrap();
        assert_eq!(context.predict_block_duration(0), Some(33_333));
        assert_eq!(context.predict_block_duration(100_000), Some(33_333));
    }

    #[test]
    fn verify_samples_per_frame_prediction() {
        let registry = registry(vec![entry(1, TrackType::Audio, "A_VORBIS")]);
        registry.build_configurations(&AcceptAll).unwrap();

        let mut registry = registry;
        let context = registry.get_mut(1).unwrap();
        // 2048 samples at 48 kHz.
        assert_eq!(context.predict_block_duration(0), Some(42_666));
    }

    #[test]
    fn verify_running_average_prediction() {
        let registry = registry(vec![entry(1, TrackType::Audio, "A_FLAC")]);
        registry.build_configurations(&AcceptAll).unwrap();

        let mut registry = registry;
        let context = registry.get_mut(1).unwrap();
        // No history yet.
        assert_eq!(context.predict_block_duration(0), None);
        assert_eq!(context.predict_block_duration(20_000), Some(20_000));
        // avg = 20000 * 0.5 + 40000 * 0.5.
        assert_eq!(context.predict_block_duration(60_000), Some(30_000));
        // A backwards jump returns the last estimate without polluting it.
        assert_eq!(context.predict_block_duration(10_000), Some(30_000));
    }

    #[test]
    fn verify_duplicate_track_numbers_keep_first() {
        let mut second = entry(1, TrackType::Audio, "A_FLAC");
        second.name = Some("duplicate".to_string());
        let registry = registry(vec![entry(1, TrackType::Audio, "A_OPUS"), second]);

        assert_eq!(registry.get(1).unwrap().entry.codec_id, "A_OPUS");
        assert_eq!(registry.contexts().count(), 1);
    }
}
