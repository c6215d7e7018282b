// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use cadenza_core::errors::{parse_codec_error, Result};

const CODEC: &str = "avc";

/// `AVCDecoderConfigurationRecord` per ISO/IEC 14496-15 section 5.3.3.1.
#[derive(Clone, Debug)]
pub struct AvcDecoderConfigurationRecord {
    pub configuration_version: u8,
    /// AVC profile as defined in ISO/IEC 14496-10.
    pub avc_profile_indication: u8,
    pub profile_compatibility: u8,
    pub avc_level_indication: u8,
    /// NAL unit length field size minus 1.
    pub length_size_minus_one: u8,
    /// Sequence parameter sets.
    pub sps: Vec<Box<[u8]>>,
    /// Picture parameter sets.
    pub pps: Vec<Box<[u8]>>,
}

impl AvcDecoderConfigurationRecord {
    pub fn read(buf: &[u8]) -> Result<Self> {
        // Fixed header: version, profile, compatibility, level, then the byte holding
        // the NAL length size.
        if buf.len() < 5 {
            return parse_codec_error(CODEC, "input too short for configuration record");
        }

        let configuration_version = buf[0];
        let avc_profile_indication = buf[1];
        let profile_compatibility = buf[2];
        let avc_level_indication = buf[3];
        let length_size_minus_one = buf[4] & 0x03;

        let mut pos = 5;

        if pos >= buf.len() {
            return parse_codec_error(CODEC, "no space for sps count");
        }
        let num_sps = usize::from(buf[pos] & 0x1f);
        pos += 1;

        let mut sps = Vec::with_capacity(num_sps);
        for _ in 0..num_sps {
            sps.push(read_parameter_set(buf, &mut pos)?);
        }

        if pos >= buf.len() {
            return parse_codec_error(CODEC, "no space for pps count");
        }
        let num_pps = usize::from(buf[pos]);
        pos += 1;

        let mut pps = Vec::with_capacity(num_pps);
        for _ in 0..num_pps {
            pps.push(read_parameter_set(buf, &mut pos)?);
        }

        Ok(AvcDecoderConfigurationRecord {
            configuration_version,
            avc_profile_indication,
            profile_compatibility,
            avc_level_indication,
            length_size_minus_one,
            sps,
            pps,
        })
    }

    /// The canonical configuration string: `avc1.` followed by the profile,
    /// compatibility, and level bytes in two-wide lowercase hex.
    pub fn codec_string(&self) -> String {
        format!(
            "avc1.{:02x}{:02x}{:02x}",
            self.avc_profile_indication, self.profile_compatibility, self.avc_level_indication
        )
    }
}

fn read_parameter_set(buf: &[u8], pos: &mut usize) -> Result<Box<[u8]>> {
    if *pos + 2 > buf.len() {
        return parse_codec_error(CODEC, "invalid parameter set length");
    }
    let len = usize::from(u16::from_be_bytes([buf[*pos], buf[*pos + 1]]));
    *pos += 2;

    if *pos + len > buf.len() {
        return parse_codec_error(CODEC, "parameter set data exceeds buffer length");
    }
    let set = buf[*pos..*pos + len].into();
    *pos += len;
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::AvcDecoderConfigurationRecord;

    // version 1, profile 100 (High), compat 0, level 30, 4-byte NAL lengths,
    // one 2-byte SPS and one 2-byte PPS.
    const RECORD: &[u8] = &[
        0x01, 0x64, 0x00, 0x1e, 0xff, 0xe1, 0x00, 0x02, 0x67, 0x42, 0x01, 0x00, 0x02, 0x68, 0xce,
    ];

    #[test]
    fn verify_read() {
        let record = AvcDecoderConfigurationRecord::read(RECORD).unwrap();
        assert_eq!(record.configuration_version, 1);
        assert_eq!(record.avc_profile_indication, 100);
        assert_eq!(record.profile_compatibility, 0);
        assert_eq!(record.avc_level_indication, 30);
        assert_eq!(record.length_size_minus_one, 3);
        assert_eq!(record.sps.len(), 1);
        assert_eq!(record.sps[0].as_ref(), &[0x67, 0x42]);
        assert_eq!(record.pps.len(), 1);
        assert_eq!(record.pps[0].as_ref(), &[0x68, 0xce]);
    }

    #[test]
    fn verify_codec_string() {
        let record = AvcDecoderConfigurationRecord::read(RECORD).unwrap();
        assert_eq!(record.codec_string(), "avc1.64001e");
    }

    #[test]
    fn verify_truncation_is_error() {
        for len in 0..RECORD.len() {
            assert!(
                AvcDecoderConfigurationRecord::read(&RECORD[..len]).is_err(),
                "truncation at {} was accepted",
                len
            );
        }
    }
}
