// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use cadenza_core::errors::{parse_codec_error, Result};

const CODEC: &str = "hevc";

/// Fixed portion of the record preceding the NAL unit arrays.
const HEADER_LEN: usize = 23;

/// One NAL unit array of an `HEVCDecoderConfigurationRecord`.
#[derive(Clone, Debug)]
pub struct HevcNalArray {
    pub array_completeness: bool,
    pub nal_unit_type: u8,
    pub nal_units: Vec<Box<[u8]>>,
}

/// `HEVCDecoderConfigurationRecord` per ISO/IEC 14496-15 section 8.3.3.1.
#[derive(Clone, Debug)]
pub struct HevcDecoderConfigurationRecord {
    pub configuration_version: u8,
    pub general_profile_space: u8,
    pub general_tier_flag: u8,
    pub general_profile_idc: u8,
    pub general_profile_compatibility_flags: u32,
    /// Six constraint-indicator bytes, most significant first.
    pub general_constraint_indicator_flags: [u8; 6],
    pub general_level_idc: u8,
    pub min_spatial_segmentation_idc: u16,
    pub parallelism_type: u8,
    pub chroma_format: u8,
    pub bit_depth_luma_minus8: u8,
    pub bit_depth_chroma_minus8: u8,
    pub avg_frame_rate: u16,
    pub constant_frame_rate: u8,
    pub num_temporal_layers: u8,
    pub temporal_id_nested: bool,
    pub length_size_minus_one: u8,
    pub nal_arrays: Vec<HevcNalArray>,
}

impl HevcDecoderConfigurationRecord {
    pub fn read(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return parse_codec_error(CODEC, "input too short for configuration record");
        }

        let mut constraint = [0u8; 6];
        constraint.copy_from_slice(&buf[6..12]);

        let num_of_arrays = usize::from(buf[22]);

        let mut record = HevcDecoderConfigurationRecord {
            configuration_version: buf[0],
            general_profile_space: (buf[1] & 0xc0) >> 6,
            general_tier_flag: (buf[1] & 0x20) >> 5,
            general_profile_idc: buf[1] & 0x1f,
            general_profile_compatibility_flags: u32::from_be_bytes([
                buf[2], buf[3], buf[4], buf[5],
            ]),
            general_constraint_indicator_flags: constraint,
            general_level_idc: buf[12],
            min_spatial_segmentation_idc: u16::from_be_bytes([buf[13], buf[14]]) & 0x0fff,
            parallelism_type: buf[15] & 0x03,
            chroma_format: buf[16] & 0x03,
            bit_depth_luma_minus8: buf[17] & 0x07,
            bit_depth_chroma_minus8: buf[18] & 0x07,
            avg_frame_rate: u16::from_be_bytes([buf[19], buf[20]]),
            constant_frame_rate: (buf[21] & 0xc0) >> 6,
            num_temporal_layers: (buf[21] & 0x38) >> 3,
            temporal_id_nested: (buf[21] & 0x04) != 0,
            length_size_minus_one: buf[21] & 0x03,
            nal_arrays: Vec::with_capacity(num_of_arrays),
        };

        let mut pos = HEADER_LEN;

        for _ in 0..num_of_arrays {
            if pos + 3 > buf.len() {
                return parse_codec_error(CODEC, "truncated nal unit array header");
            }

            let array_completeness = (buf[pos] & 0x80) != 0;
            let nal_unit_type = buf[pos] & 0x3f;
            let num_nalus = usize::from(u16::from_be_bytes([buf[pos + 1], buf[pos + 2]]));
            pos += 3;

            let mut nal_units = Vec::with_capacity(num_nalus);
            for _ in 0..num_nalus {
                if pos + 2 > buf.len() {
                    return parse_codec_error(CODEC, "invalid nal unit length");
                }
                let len = usize::from(u16::from_be_bytes([buf[pos], buf[pos + 1]]));
                pos += 2;

                if pos + len > buf.len() {
                    return parse_codec_error(CODEC, "nal unit data exceeds buffer length");
                }
                nal_units.push(buf[pos..pos + len].into());
                pos += len;
            }

            record.nal_arrays.push(HevcNalArray { array_completeness, nal_unit_type, nal_units });
        }

        Ok(record)
    }

    /// The canonical configuration string, matching the WebKit/Chrome reference
    /// algorithm bit-for-bit.
    pub fn codec_string(&self) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(10);

        parts.push("hev1".to_string());

        // Profile space 0 is omitted, spaces 1..=3 map to the letters A..=C.
        if self.general_profile_space > 0 {
            let space = char::from(b'A' + self.general_profile_space - 1);
            parts.push(format!("{}{}", space, self.general_profile_idc));
        }
        else {
            parts.push(self.general_profile_idc.to_string());
        }

        // The compatibility flags are rendered bit-reversed.
        let compat = self.general_profile_compatibility_flags.reverse_bits();
        parts.push(format!("{:X}", compat));

        let tier = if self.general_tier_flag != 0 { 'H' } else { 'L' };
        parts.push(format!("{}{}", tier, self.general_level_idc));

        // Constraint bytes up to and including the last non-zero byte; omitted entirely
        // when all six are zero.
        let last_non_zero =
            self.general_constraint_indicator_flags.iter().rposition(|&byte| byte != 0);

        if let Some(last) = last_non_zero {
            for byte in &self.general_constraint_indicator_flags[..=last] {
                parts.push(format!("{:02X}", byte));
            }
        }

        parts.join(".")
    }
}
