// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use cadenza_core::errors::{parse_codec_error, Result};
use cadenza_core::io::BitReader;

const CODEC: &str = "aac";

/// Sampling rates indexed by the AudioSpecificConfig sampling-frequency index.
pub const AAC_SAMPLE_RATES: [u32; 16] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350, 0, 0,
    0,
];

/// The fixed frame size in samples for an AAC audio object type.
pub fn samples_per_frame(audio_object_type: u8) -> u32 {
    match audio_object_type {
        // HE-AAC doubles the frame size of the LC core.
        5 | 29 => 2048,
        // AAC-LD.
        23 => 512,
        _ => 1024,
    }
}

/// `AudioSpecificConfig` per ISO/IEC 14496-3 section 1.6.2.1.
#[derive(Clone, Debug)]
pub struct AudioSpecificConfig {
    pub audio_object_type: u8,
    pub sampling_frequency_index: u8,
    pub channel_configuration: u8,
    /// Spectral band replication, implied by object types 5 and 29.
    pub sbr_present: bool,
    /// Parametric stereo, implied by object type 29.
    pub ps_present: bool,
}

impl AudioSpecificConfig {
    pub fn read(buf: &[u8]) -> Result<Self> {
        if buf.len() < 2 {
            return parse_codec_error(CODEC, "codec private data too short");
        }

        let mut br = BitReader::new(buf);

        let audio_object_type = br.read_bits(5)? as u8;
        let sampling_frequency_index = br.read_bits(4)? as u8;
        let channel_configuration = br.read_bits(4)? as u8;

        let sbr_present = audio_object_type == 5 || audio_object_type == 29;
        let ps_present = audio_object_type == 29;

        Ok(AudioSpecificConfig {
            audio_object_type,
            sampling_frequency_index,
            channel_configuration,
            sbr_present,
            ps_present,
        })
    }

    /// The declared sampling rate, or `None` for a reserved frequency index.
    pub fn sample_rate(&self) -> Option<u32> {
        match AAC_SAMPLE_RATES.get(usize::from(self.sampling_frequency_index)) {
            Some(&rate) if rate > 0 => Some(rate),
            _ => None,
        }
    }

    /// The fixed frame size in samples for this configuration.
    pub fn samples_per_frame(&self) -> u32 {
        samples_per_frame(self.audio_object_type)
    }

    /// The canonical configuration string: `mp4a.40.` followed by the audio object type.
    pub fn codec_string(&self) -> String {
        format!("mp4a.40.{}", self.audio_object_type)
    }
}
