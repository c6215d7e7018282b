// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `codecs` module defines decoder-configuration types and the external
//! decoder-capability seam.

/// Video codec families with a decoder configuration mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VideoCodec {
    Avc,
    Hevc,
    Vp8,
    Vp9,
    Av1,
    Mpeg4,
    Theora,
}

/// Audio codec families with a decoder configuration mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioCodec {
    Aac,
    Ac3,
    Eac3,
    Mp3,
    Vorbis,
    Flac,
    Opus,
    Alac,
    PcmS16Be,
    PcmS24Be,
    PcmS32Be,
    PcmS16Le,
    PcmS24Le,
    PcmS32Le,
    PcmF32Le,
}

/// Everything a video decoder needs to be instantiated for one track.
#[derive(Clone, Debug)]
pub struct VideoDecoderConfig {
    /// The canonical decoder configuration string, e.g. `avc1.64001e`.
    pub codec: String,
    pub codec_type: VideoCodec,
    /// Codec-private initialization bytes, when the codec carries them.
    pub description: Option<Box<[u8]>>,
    pub coded_width: Option<u32>,
    pub coded_height: Option<u32>,
}

/// Everything an audio decoder needs to be instantiated for one track.
#[derive(Clone, Debug)]
pub struct AudioDecoderConfig {
    /// The canonical decoder configuration string, e.g. `mp4a.40.2`.
    pub codec: String,
    pub codec_type: AudioCodec,
    /// Codec-private initialization bytes, when the codec carries them.
    pub description: Option<Box<[u8]>>,
    pub sample_rate: u32,
    pub channels: u32,
    /// Fixed frame size in samples, when the codec defines one. Feeds the
    /// block-duration estimator, not the decoder itself.
    pub samples_per_frame: Option<u32>,
}

/// The external decoder-capability check.
///
/// A derived configuration is handed to the platform before a track is declared usable,
/// so unsupported codecs fail fast with a typed error instead of failing at decode time.
pub trait DecoderSupport {
    fn supports_video(&self, config: &VideoDecoderConfig) -> bool;
    fn supports_audio(&self, config: &AudioDecoderConfig) -> bool;
}

/// A `DecoderSupport` that accepts every configuration. For embedding without a
/// platform capability check.
#[derive(Default)]
pub struct AcceptAll;

impl DecoderSupport for AcceptAll {
    fn supports_video(&self, _config: &VideoDecoderConfig) -> bool {
        true
    }

    fn supports_audio(&self, _config: &AudioDecoderConfig) -> bool {
        true
    }
}
