// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Maps Matroska codec ids to decoder configurations.

use cadenza_core::codecs::{AudioCodec, AudioDecoderConfig, VideoCodec, VideoDecoderConfig};
use cadenza_core::errors::{parse_codec_error, unsupported_codec_error, Result};

use cadenza_common::aom::av1::Av1CodecConfigurationRecord;
use cadenza_common::mpeg::aac::{samples_per_frame, AudioSpecificConfig};
use cadenza_common::mpeg::avc::AvcDecoderConfigurationRecord;
use cadenza_common::mpeg::hevc::HevcDecoderConfigurationRecord;
use cadenza_common::vpx::vp9::Vp9DecoderConfiguration;

use crate::schema::TrackEntryElement;

const VIDEO_CONTEXT: &str = "video decoder";
const AUDIO_CONTEXT: &str = "audio decoder";

/// True when the codec's configuration must be derived from the first keyframe instead
/// of codec-private data.
pub fn requires_keyframe_peek(codec_id: &str) -> bool {
    codec_id == "V_VP9"
}

fn codec_private<'a>(
    track: &'a TrackEntryElement,
    codec: &'static str,
) -> Result<&'a [u8]> {
    match &track.codec_private {
        Some(private) => Ok(private),
        None => parse_codec_error(codec, "codec private data is missing"),
    }
}

/// Derive a video decoder configuration from a track entry, and the first keyframe
/// where the codec requires one.
pub fn make_video_config(
    track: &TrackEntryElement,
    keyframe: Option<&[u8]>,
) -> Result<VideoDecoderConfig> {
    let (codec_type, codec) = match track.codec_id.as_str() {
        "V_MPEG4/ISO/AVC" => {
            let record = AvcDecoderConfigurationRecord::read(codec_private(track, "avc")?)?;
            (VideoCodec::Avc, record.codec_string())
        }
        "V_MPEGH/ISO/HEVC" => {
            let record = HevcDecoderConfigurationRecord::read(codec_private(track, "hevc")?)?;
            (VideoCodec::Hevc, record.codec_string())
        }
        "V_VP9" => {
            let keyframe = match keyframe {
                Some(keyframe) => keyframe,
                None => {
                    return parse_codec_error("vp9", "keyframe is required to derive the config")
                }
            };
            // The declared default duration gives the frame rate for the level
            // estimate; 30 fps is assumed when it is absent.
            let frame_rate = match track.default_duration {
                Some(duration) if duration > 0 => 1_000_000_000.0 / duration as f64,
                _ => 30.0,
            };
            let config = Vp9DecoderConfiguration::read(keyframe, frame_rate)?;
            (VideoCodec::Vp9, config.codec_string())
        }
        "V_AV1" => {
            let record = Av1CodecConfigurationRecord::read(codec_private(track, "av1")?)?;
            (VideoCodec::Av1, record.codec_string())
        }
        "V_VP8" => (VideoCodec::Vp8, "vp8".to_string()),
        "V_THEORA" => (VideoCodec::Theora, "theora".to_string()),
        "V_MPEG4/ISO/SP" => (VideoCodec::Mpeg4, "mp4v.01.3".to_string()),
        "V_MPEG4/ISO/ASP" | "V_MPEG4/ISO/AP" => (VideoCodec::Mpeg4, "mp4v.20.9".to_string()),
        other => return unsupported_codec_error(other, VIDEO_CONTEXT),
    };

    Ok(VideoDecoderConfig {
        codec,
        codec_type,
        description: track.codec_private.clone(),
        coded_width: track.video.as_ref().map(|video| video.pixel_width as u32),
        coded_height: track.video.as_ref().map(|video| video.pixel_height as u32),
    })
}

/// Derive an audio decoder configuration from a track entry.
pub fn make_audio_config(track: &TrackEntryElement) -> Result<AudioDecoderConfig> {
    let sample_rate = track.audio.as_ref().map(|audio| audio.sampling_frequency as u32).unwrap_or(8000);
    let channels = track.audio.as_ref().map(|audio| audio.channels as u32).unwrap_or(1);
    let bit_depth = track.audio.as_ref().and_then(|audio| audio.bit_depth);

    let (codec_type, codec, spf) = match track.codec_id.as_str() {
        "A_AAC/MPEG2/MAIN" | "A_AAC/MPEG4/MAIN" => {
            (AudioCodec::Aac, "mp4a.40.1".to_string(), Some(1024))
        }
        "A_AAC/MPEG2/LC" | "A_AAC/MPEG4/LC" => {
            (AudioCodec::Aac, "mp4a.40.2".to_string(), Some(1024))
        }
        "A_AAC/MPEG2/SSR" | "A_AAC/MPEG4/SSR" => {
            (AudioCodec::Aac, "mp4a.40.3".to_string(), Some(1024))
        }
        "A_AAC/MPEG4/LTP" => (AudioCodec::Aac, "mp4a.40.4".to_string(), Some(1024)),
        "A_AAC/MPEG2/LC/SBR" | "A_AAC/MPEG4/LC/SBR" => {
            (AudioCodec::Aac, "mp4a.40.5".to_string(), Some(2048))
        }
        "A_AAC" => match &track.codec_private {
            Some(private) => {
                let config = AudioSpecificConfig::read(private)?;
                (
                    AudioCodec::Aac,
                    config.codec_string(),
                    Some(samples_per_frame(config.audio_object_type)),
                )
            }
            // LC is the safe assumption when the config blob is absent.
            None => (AudioCodec::Aac, "mp4a.40.2".to_string(), Some(1024)),
        },
        "A_AC3" | "A_AC3/BSID9" => (AudioCodec::Ac3, "ac-3".to_string(), Some(1536)),
        "A_EAC3" | "A_AC3/BSID10" => (AudioCodec::Eac3, "ec-3".to_string(), None),
        "A_MPEG/L3" => (AudioCodec::Mp3, "mp3".to_string(), Some(1152)),
        "A_VORBIS" => (AudioCodec::Vorbis, "vorbis".to_string(), Some(2048)),
        "A_FLAC" => (AudioCodec::Flac, "flac".to_string(), None),
        "A_OPUS" => (AudioCodec::Opus, "opus".to_string(), None),
        "A_ALAC" => (AudioCodec::Alac, "alac".to_string(), None),
        "A_PCM/INT/BIG" => match bit_depth {
            Some(16) => (AudioCodec::PcmS16Be, "pcm-s16be".to_string(), None),
            Some(24) => (AudioCodec::PcmS24Be, "pcm-s24be".to_string(), None),
            Some(32) => (AudioCodec::PcmS32Be, "pcm-s32be".to_string(), None),
            depth => {
                return unsupported_codec_error(pcm_with_depth(&track.codec_id, depth), AUDIO_CONTEXT)
            }
        },
        "A_PCM/INT/LIT" => match bit_depth {
            Some(16) => (AudioCodec::PcmS16Le, "pcm-s16le".to_string(), None),
            Some(24) => (AudioCodec::PcmS24Le, "pcm-s24le".to_string(), None),
            Some(32) => (AudioCodec::PcmS32Le, "pcm-s32le".to_string(), None),
            depth => {
                return unsupported_codec_error(pcm_with_depth(&track.codec_id, depth), AUDIO_CONTEXT)
            }
        },
        "A_PCM/FLOAT/IEEE" => match bit_depth {
            Some(32) | None => (AudioCodec::PcmF32Le, "pcm-f32le".to_string(), None),
            depth => {
                return unsupported_codec_error(pcm_with_depth(&track.codec_id, depth), AUDIO_CONTEXT)
            }
        },
        other => return unsupported_codec_error(other, AUDIO_CONTEXT),
    };

    Ok(AudioDecoderConfig {
        codec,
        codec_type,
        description: track.codec_private.clone(),
        sample_rate,
        channels,
        samples_per_frame: spf,
    })
}

fn pcm_with_depth(codec_id: &str, bit_depth: Option<u64>) -> String {
    match bit_depth {
        Some(depth) => format!("{}({}b)", codec_id, depth),
        None => format!("{}(no bit depth)", codec_id),
    }
}
