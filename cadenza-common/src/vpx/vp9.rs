// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use log::debug;

use cadenza_core::errors::{parse_codec_error, Result};
use cadenza_core::io::BitReader;

const CODEC: &str = "vp9";

const SYNC_CODE: u64 = 0x498342;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Vp9ColorSpace {
    Unknown = 0,
    Bt601 = 1,
    Bt709 = 2,
    Smpte170 = 3,
    Smpte240 = 4,
    Bt2020 = 5,
    Reserved = 6,
    Srgb = 7,
}

impl Vp9ColorSpace {
    fn from_bits(bits: u64) -> Vp9ColorSpace {
        match bits {
            1 => Vp9ColorSpace::Bt601,
            2 => Vp9ColorSpace::Bt709,
            3 => Vp9ColorSpace::Smpte170,
            4 => Vp9ColorSpace::Smpte240,
            5 => Vp9ColorSpace::Bt2020,
            6 => Vp9ColorSpace::Reserved,
            7 => Vp9ColorSpace::Srgb,
            _ => Vp9ColorSpace::Unknown,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Vp9Subsampling {
    Unknown,
    Yuv420,
    Yuv422,
    Yuv440,
    Yuv444,
}

/// One row of the standard VP9 performance-tier table: the highest luma sample rate
/// (width x height x frame rate) and picture size a decoder at that level must handle.
struct PerformanceLevel {
    level: u8,
    max_sample_rate: u64,
    max_resolution: u64,
}

#[rustfmt::skip]
const PERFORMANCE_LEVELS: [PerformanceLevel; 14] = [
    PerformanceLevel { level: 10, max_sample_rate: 829_440,        max_resolution: 36_864 },
    PerformanceLevel { level: 11, max_sample_rate: 2_764_800,      max_resolution: 73_728 },
    PerformanceLevel { level: 20, max_sample_rate: 4_608_000,      max_resolution: 122_880 },
    PerformanceLevel { level: 21, max_sample_rate: 9_216_000,      max_resolution: 245_760 },
    PerformanceLevel { level: 30, max_sample_rate: 20_736_000,     max_resolution: 552_960 },
    PerformanceLevel { level: 31, max_sample_rate: 36_864_000,     max_resolution: 983_040 },
    PerformanceLevel { level: 40, max_sample_rate: 83_558_400,     max_resolution: 2_228_224 },
    PerformanceLevel { level: 41, max_sample_rate: 160_432_128,    max_resolution: 2_228_224 },
    PerformanceLevel { level: 50, max_sample_rate: 311_951_360,    max_resolution: 8_912_896 },
    PerformanceLevel { level: 51, max_sample_rate: 588_251_136,    max_resolution: 8_912_896 },
    PerformanceLevel { level: 52, max_sample_rate: 1_176_502_272,  max_resolution: 8_912_896 },
    PerformanceLevel { level: 60, max_sample_rate: 1_176_502_272,  max_resolution: 35_651_584 },
    PerformanceLevel { level: 61, max_sample_rate: 2_353_004_544,  max_resolution: 35_651_584 },
    PerformanceLevel { level: 62, max_sample_rate: 4_706_009_088,  max_resolution: 35_651_584 },
];

/// Decoder configuration derived from the uncompressed header of the first VP9
/// keyframe. VP9 persists no configuration record, so this is the only source.
#[derive(Clone, Debug)]
pub struct Vp9DecoderConfiguration {
    pub profile: u8,
    pub bit_depth: u8,
    pub color_space: Vp9ColorSpace,
    pub subsampling: Vp9Subsampling,
    /// Absent for the sRGB color space.
    pub yuv_full_range: Option<bool>,
    pub width: u32,
    pub height: u32,
    pub render_width: u32,
    pub render_height: u32,
    pub frame_rate: f64,
    /// Estimated from the performance-tier table, not signalled in the bitstream.
    pub level: u8,
}

impl Vp9DecoderConfiguration {
    /// Parse the uncompressed frame header of a keyframe. `frame_rate` feeds the level
    /// estimate only.
    pub fn read(keyframe: &[u8], frame_rate: f64) -> Result<Self> {
        let mut br = BitReader::new(keyframe);

        let frame_marker = br.read_bits(2)?;
        if frame_marker != 0b10 {
            return parse_codec_error(CODEC, "invalid frame marker");
        }

        // The profile is built from two interleaved bits.
        let version = br.read_bits(1)?;
        let high = br.read_bits(1)?;
        let profile = ((high << 1) | version) as u8;

        if profile == 3 && br.read_bits(1)? != 0 {
            return parse_codec_error(CODEC, "invalid reserved zero bit for profile 3");
        }

        if br.read_bits(1)? != 0 {
            return parse_codec_error(CODEC, "show-existing-frame is not a keyframe");
        }

        // Frame type 0 is a keyframe.
        if br.read_bits(1)? != 0 {
            return parse_codec_error(CODEC, "not a keyframe");
        }

        let _show_frame = br.read_bits(1)?;
        let _error_resilient = br.read_bits(1)?;

        if br.read_bits(24)? != SYNC_CODE {
            return parse_codec_error(CODEC, "invalid sync code");
        }

        let bit_depth = if profile >= 2 {
            if br.read_bits(1)? == 0 {
                10
            }
            else {
                12
            }
        }
        else {
            8
        };

        let color_space = Vp9ColorSpace::from_bits(br.read_bits(3)?);

        let mut yuv_full_range = None;
        let subsampling_x;
        let subsampling_y;

        if color_space != Vp9ColorSpace::Srgb {
            yuv_full_range = Some(br.read_bits(1)? == 1);
            if profile == 1 || profile == 3 {
                subsampling_x = br.read_bits(1)?;
                subsampling_y = br.read_bits(1)?;
                let _reserved = br.read_bits(1)?;
            }
            else {
                subsampling_x = 1;
                subsampling_y = 1;
            }
        }
        else {
            if profile != 1 && profile != 3 {
                return parse_codec_error(CODEC, "srgb color space requires profile 1 or 3");
            }
            subsampling_x = 0;
            subsampling_y = 0;
            let _reserved = br.read_bits(1)?;
        }

        let subsampling = match (subsampling_x, subsampling_y) {
            (0, 1) => Vp9Subsampling::Yuv440,
            (1, 0) => Vp9Subsampling::Yuv422,
            (1, 1) => Vp9Subsampling::Yuv420,
            (0, 0) => Vp9Subsampling::Yuv444,
            _ => Vp9Subsampling::Unknown,
        };

        let width = br.read_bits(16)? as u32 + 1;
        let height = br.read_bits(16)? as u32 + 1;

        let mut render_width = width;
        let mut render_height = height;
        if br.read_bits(1)? == 1 {
            render_width = br.read_bits(16)? as u32 + 1;
            render_height = br.read_bits(16)? as u32 + 1;
        }

        let level = estimate_level(width, height, frame_rate, profile, bit_depth);

        Ok(Vp9DecoderConfiguration {
            profile,
            bit_depth,
            color_space,
            subsampling,
            yuv_full_range,
            width,
            height,
            render_width,
            render_height,
            frame_rate,
            level,
        })
    }

    /// The canonical configuration string: `vp09.<profile>.<level>.<bitDepth>`, each
    /// field as a two-digit decimal.
    pub fn codec_string(&self) -> String {
        format!("vp09.{:02}.{:02}.{:02}", self.profile, self.level, self.bit_depth)
    }
}

fn estimate_level(width: u32, height: u32, frame_rate: f64, profile: u8, bit_depth: u8) -> u8 {
    let resolution = u64::from(width) * u64::from(height);
    let sample_rate = (resolution as f64 * frame_rate) as u64;

    for tier in &PERFORMANCE_LEVELS {
        if sample_rate <= tier.max_sample_rate && resolution <= tier.max_resolution {
            // High bit-depth profiles are not defined below level 2.0.
            if profile >= 2 && bit_depth > 8 && tier.level < 20 {
                continue;
            }
            return tier.level;
        }
    }

    debug!("vp9: no performance tier fits {}x{} at {} fps", width, height, frame_rate);
    62
}

#[cfg(test)]
mod tests {
    use super::{Vp9ColorSpace, Vp9DecoderConfiguration, Vp9Subsampling};

    // Profile 0, 8-bit, BT.601, 4:2:0, 640x360.
    const KEYFRAME: &[u8] = &[0x82, 0x49, 0x83, 0x42, 0x20, 0x27, 0xf0, 0x16, 0x70];

    #[test]
    fn verify_read_keyframe_header() {
        let config = Vp9DecoderConfiguration::read(KEYFRAME, 30.0).unwrap();
        assert_eq!(config.profile, 0);
        assert_eq!(config.bit_depth, 8);
        assert_eq!(config.color_space, Vp9ColorSpace::Bt601);
        assert_eq!(config.subsampling, Vp9Subsampling::Yuv420);
        assert_eq!(config.width, 640);
        assert_eq!(config.height, 360);
        assert_eq!(config.render_width, 640);
        assert_eq!(config.render_height, 360);
        assert_eq!(config.level, 21);
    }

    #[test]
    fn verify_codec_string() {
        let config = Vp9DecoderConfiguration::read(KEYFRAME, 30.0).unwrap();
        assert_eq!(config.codec_string(), "vp09.00.21.08");
    }

    #[test]
    fn verify_invalid_frame_marker_is_error() {
        assert!(Vp9DecoderConfiguration::read(&[0x42, 0x49, 0x83, 0x42], 30.0).is_err());
    }

    #[test]
    fn verify_non_keyframe_is_error() {
        // Frame type bit set.
        assert!(Vp9DecoderConfiguration::read(&[0x86, 0x49, 0x83, 0x42], 30.0).is_err());
    }

    #[test]
    fn verify_invalid_sync_code_is_error() {
        assert!(Vp9DecoderConfiguration::read(&[0x82, 0x49, 0x83, 0x43, 0x20], 30.0).is_err());
    }

    #[test]
    fn verify_truncation_is_error() {
        for len in 0..KEYFRAME.len() {
            assert!(
                Vp9DecoderConfiguration::read(&KEYFRAME[..len], 30.0).is_err(),
                "truncation at {} was accepted",
                len
            );
        }
    }
}
