// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::schema::{CuePointElement, CuesElement, CueTrackPositionsElement};

/// The cue-point index: presentation timestamps mapped to cluster byte positions,
/// sorted by time ascending.
#[derive(Debug, Default)]
pub struct CueIndex {
    points: Vec<CuePointElement>,
}

impl CueIndex {
    /// Load the index from a parsed Cues element. The format guarantees time-ascending
    /// order, but the binary search depends on it, so it is re-established here.
    pub fn prepare(&mut self, cues: CuesElement) {
        self.points = cues.points;
        self.points.sort_by_key(|point| point.time);
    }

    pub fn prepared(&self) -> bool {
        !self.points.is_empty()
    }

    pub fn points(&self) -> &[CuePointElement] {
        &self.points
    }

    /// The cue whose time is closest to `time`.
    ///
    /// Queries at or beyond either boundary return that boundary cue. Between two cues
    /// the nearer one wins; an exact tie resolves toward the earlier cue.
    pub fn find_closest_cue(&self, time: u64) -> Option<&CuePointElement> {
        let points = &self.points;
        if points.is_empty() {
            return None;
        }

        if time <= points[0].time {
            return points.first();
        }
        if time >= points[points.len() - 1].time {
            return points.last();
        }

        let mut left = 0usize;
        let mut right = points.len() - 1;

        while left <= right {
            let mid = (left + right) / 2;

            if points[mid].time == time {
                return Some(&points[mid]);
            }

            if points[mid].time < time {
                left = mid + 1;
            }
            else {
                right = mid - 1;
            }
        }

        // left and right have crossed: points[right] < time < points[left].
        let before = &points[right];
        let after = &points[left];

        // Strict less-than keeps an equidistant query on the earlier cue.
        if after.time - time < time - before.time {
            Some(after)
        }
        else {
            Some(before)
        }
    }

    /// The position entry for `track` within a cue, falling back to the entry with the
    /// largest cluster position when the track is unspecified or absent.
    pub fn cue_track_positions<'a>(
        &self,
        cue: &'a CuePointElement,
        track: Option<u64>,
    ) -> &'a CueTrackPositionsElement {
        if let Some(track) = track {
            if let Some(positions) =
                cue.track_positions.iter().find(|positions| positions.track == track)
            {
                return positions;
            }
        }

        // Parsing guarantees at least one entry per cue point.
        cue.track_positions
            .iter()
            .max_by_key(|positions| positions.cluster_position)
            .unwrap_or(&cue.track_positions[0])
    }
}
