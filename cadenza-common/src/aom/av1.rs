// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use cadenza_core::errors::{parse_codec_error, Result};
use cadenza_core::io::BitReader;

const CODEC: &str = "av1";

/// `AV1CodecConfigurationRecord` per the AV1-in-ISOBMFF binding.
#[derive(Clone, Debug)]
pub struct Av1CodecConfigurationRecord {
    pub seq_profile: u8,
    pub seq_level_idx: u8,
    pub seq_tier: u8,
    pub high_bitdepth: bool,
    pub twelve_bit: bool,
    pub monochrome: bool,
    pub chroma_subsampling_x: u8,
    pub chroma_subsampling_y: u8,
    pub chroma_sample_position: u8,
    pub initial_presentation_delay: Option<u8>,
    /// The remaining bytes: raw configuration OBUs, not parsed further.
    pub config_obus: Box<[u8]>,
}

impl Av1CodecConfigurationRecord {
    pub fn read(buf: &[u8]) -> Result<Self> {
        if buf.len() < 4 {
            return parse_codec_error(CODEC, "input too short for configuration record");
        }

        let mut br = BitReader::new(buf);

        let marker = br.read_bits(1)?;
        let version = br.read_bits(7)?;
        if marker != 1 || version != 1 {
            return parse_codec_error(CODEC, "invalid marker or version");
        }

        let seq_profile = br.read_bits(3)? as u8;
        let seq_level_idx = br.read_bits(5)? as u8;

        let seq_tier = br.read_bits(1)? as u8;
        let high_bitdepth = br.read_bits(1)? == 1;
        let twelve_bit = br.read_bits(1)? == 1;
        let monochrome = br.read_bits(1)? == 1;
        let chroma_subsampling_x = br.read_bits(1)? as u8;
        let chroma_subsampling_y = br.read_bits(1)? as u8;
        let chroma_sample_position = br.read_bits(2)? as u8;

        if br.read_bits(3)? != 0 {
            return parse_codec_error(CODEC, "reserved bits must be zero");
        }

        let initial_presentation_delay = if br.read_bits(1)? == 1 {
            Some(br.read_bits(4)? as u8)
        }
        else {
            if br.read_bits(4)? != 0 {
                return parse_codec_error(CODEC, "reserved bits must be zero");
            }
            None
        };

        Ok(Av1CodecConfigurationRecord {
            seq_profile,
            seq_level_idx,
            seq_tier,
            high_bitdepth,
            twelve_bit,
            monochrome,
            chroma_subsampling_x,
            chroma_subsampling_y,
            chroma_sample_position,
            initial_presentation_delay,
            config_obus: br.remaining_buf().into(),
        })
    }

    /// The canonical configuration string per the AV1-in-ISOBMFF binding, with the
    /// trailing presentation-delay segment present only when signalled.
    pub fn codec_string(&self) -> String {
        let tier = if self.seq_tier == 0 { 'M' } else { 'H' };

        let bit_depth = if !self.high_bitdepth {
            "08"
        }
        else if !self.twelve_bit {
            "10"
        }
        else {
            "12"
        };

        let mut codec = format!(
            "av01.{}.{:02}{}.{}.{}.{}{}{}",
            self.seq_profile,
            self.seq_level_idx,
            tier,
            bit_depth,
            u8::from(self.monochrome),
            self.chroma_subsampling_x,
            self.chroma_subsampling_y,
            self.chroma_sample_position,
        );

        if let Some(delay_minus_one) = self.initial_presentation_delay {
            codec.push_str(&format!(".{:02}", delay_minus_one + 1));
        }

        codec
    }
}
