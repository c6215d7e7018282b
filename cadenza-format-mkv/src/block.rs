// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Block payload parsing and the normalized per-track block view.

use cadenza_core::errors::{decode_error, Result};

use crate::schema::ClusterElement;

const LACING_NONE: u8 = 0;
const LACING_XIPH: u8 = 1;
const LACING_FIXED: u8 = 2;
const LACING_EBML: u8 = 3;

/// A parsed SimpleBlock or Block payload.
#[derive(Clone, Debug)]
pub struct Block {
    pub track: u64,
    /// Time offset relative to the enclosing cluster's timestamp.
    pub rel_time: i16,
    /// Set from the flags byte for SimpleBlocks. Blocks inside a group signal
    /// keyframe-ness through the absence of a ReferenceBlock instead.
    pub keyframe: bool,
    /// One or more frame payloads, depending on lacing.
    pub frames: Vec<Box<[u8]>>,
}

impl Block {
    pub fn read(buf: &[u8], is_simple: bool) -> Result<Block> {
        let mut pos = 0;

        let track = read_vint(buf, &mut pos)?;

        if pos + 3 > buf.len() {
            return decode_error("mkv: truncated block header");
        }

        let rel_time = i16::from_be_bytes([buf[pos], buf[pos + 1]]);
        let flags = buf[pos + 2];
        pos += 3;

        let keyframe = is_simple && (flags & 0x80) != 0;
        let lacing = (flags >> 1) & 0x3;

        let frames = extract_frames(&buf[pos..], lacing)?;

        Ok(Block { track, rel_time, keyframe, frames })
    }
}

/// A Block with its group-level reference information.
#[derive(Clone, Debug)]
pub struct BlockGroup {
    pub block: Block,
    pub reference_block: Option<i64>,
    pub duration: Option<u64>,
}

impl BlockGroup {
    /// A grouped block is a keyframe when it references no other block.
    pub fn keyframe(&self) -> bool {
        self.reference_block.is_none()
    }
}

/// A normalized view over either block representation.
#[derive(Clone, Copy, Debug)]
pub struct BlockView<'a> {
    pub keyframe: bool,
    pub track: u64,
    pub rel_time: i16,
    pub frames: &'a [Box<[u8]>],
}

impl<'a> BlockView<'a> {
    fn from_simple(block: &'a Block) -> BlockView<'a> {
        BlockView {
            keyframe: block.keyframe,
            track: block.track,
            rel_time: block.rel_time,
            frames: &block.frames,
        }
    }

    fn from_group(group: &'a BlockGroup) -> BlockView<'a> {
        BlockView {
            keyframe: group.keyframe(),
            track: group.block.track,
            rel_time: group.block.rel_time,
            frames: &group.block.frames,
        }
    }
}

/// All blocks of `track` in the cluster, in presentation order.
///
/// When a cluster holds both representations the two lists are merged and sorted by
/// relative time; a single representation is already time-ordered and is yielded in
/// storage order.
pub fn enumerate_blocks(cluster: &ClusterElement, track: u64) -> Vec<BlockView<'_>> {
    let groups =
        cluster.block_groups.iter().filter(|group| group.block.track == track);
    let simple = cluster.simple_blocks.iter().filter(|block| block.track == track);

    if !cluster.block_groups.is_empty() && !cluster.simple_blocks.is_empty() {
        let mut blocks: Vec<BlockView<'_>> = groups.map(BlockView::from_group).collect();
        blocks.extend(simple.map(BlockView::from_simple));
        blocks.sort_by_key(|block| block.rel_time);
        blocks
    }
    else {
        groups
            .map(BlockView::from_group)
            .chain(simple.map(BlockView::from_simple))
            .collect()
    }
}

/// Read an EBML variable-width unsigned integer, stripping the length marker.
fn read_vint(buf: &[u8], pos: &mut usize) -> Result<u64> {
    if *pos >= buf.len() {
        return decode_error("mkv: truncated vint");
    }

    let first = buf[*pos];
    if first == 0 {
        return decode_error("mkv: invalid vint marker");
    }

    let len = first.leading_zeros() as usize + 1;
    if *pos + len > buf.len() {
        return decode_error("mkv: truncated vint");
    }

    let mut value = u64::from(first) & (0xff >> len);
    for i in 1..len {
        value = (value << 8) | u64::from(buf[*pos + i]);
    }
    *pos += len;

    Ok(value)
}

/// Read an EBML lace-size delta: a vint biased around zero.
fn read_signed_vint(buf: &[u8], pos: &mut usize) -> Result<i64> {
    let start = *pos;
    let value = read_vint(buf, pos)?;
    let len = *pos - start;
    let bias = (1i64 << (7 * len - 1)) - 1;
    Ok(value as i64 - bias)
}

fn extract_frames(data: &[u8], lacing: u8) -> Result<Vec<Box<[u8]>>> {
    if lacing == LACING_NONE {
        return Ok(vec![data.into()]);
    }

    if data.is_empty() {
        return decode_error("mkv: missing lace frame count");
    }

    let count = usize::from(data[0]) + 1;
    let mut pos = 1;

    // Sizes for all frames but the last; the last frame takes the remainder.
    let mut sizes = Vec::with_capacity(count - 1);

    match lacing {
        LACING_XIPH => {
            for _ in 0..count - 1 {
                let mut size = 0usize;
                loop {
                    if pos >= data.len() {
                        return decode_error("mkv: truncated xiph lace sizes");
                    }
                    let byte = data[pos];
                    pos += 1;
                    size += usize::from(byte);
                    if byte != 255 {
                        break;
                    }
                }
                sizes.push(size);
            }
        }
        LACING_FIXED => {
            let total = data.len() - 1;
            if total % count != 0 {
                return decode_error("mkv: invalid fixed lace size");
            }
            for _ in 0..count - 1 {
                sizes.push(total / count);
            }
        }
        LACING_EBML => {
            let mut prev = 0i64;
            for i in 0..count - 1 {
                let size = if i == 0 {
                    read_vint(data, &mut pos)? as i64
                }
                else {
                    prev + read_signed_vint(data, &mut pos)?
                };
                if size < 0 {
                    return decode_error("mkv: negative ebml lace size");
                }
                prev = size;
                sizes.push(size as usize);
            }
        }
        _ => return decode_error("mkv: invalid lacing mode"),
    }

    let mut frames = Vec::with_capacity(count);
    for size in sizes {
        if pos + size > data.len() {
            return decode_error("mkv: lace size exceeds block payload");
        }
        frames.push(data[pos..pos + size].into());
        pos += size;
    }
    frames.push(data[pos..].into());

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::{enumerate_blocks, Block, BlockGroup};
    use crate::schema::ClusterElement;

    #[test]
    fn verify_read_no_lacing() {
        // Track 1, rel time 32, keyframe flag, one frame.
        let block = Block::read(&[0x81, 0x00, 0x20, 0x80, 0xaa, 0xbb], true).unwrap();
        assert_eq!(block.track, 1);
        assert_eq!(block.rel_time, 32);
        assert!(block.keyframe);
        assert_eq!(block.frames.len(), 1);
        assert_eq!(block.frames[0].as_ref(), &[0xaa, 0xbb]);
    }

    #[test]
    fn verify_keyframe_flag_ignored_for_grouped_block() {
        let block = Block::read(&[0x81, 0x00, 0x20, 0x80, 0xaa], false).unwrap();
        assert!(!block.keyframe);
    }

    #[test]
    fn verify_negative_rel_time() {
        let block = Block::read(&[0x81, 0xff, 0xfe, 0x00, 0xaa], true).unwrap();
        assert_eq!(block.rel_time, -2);
    }

    #[test]
    fn verify_xiph_lacing() {
        // Three frames of sizes 2, 1, and the 3-byte remainder.
        let buf = [0x81, 0x00, 0x00, 0x02, 0x02, 0x02, 0x01, 0xa1, 0xa2, 0xb1, 0xc1, 0xc2, 0xc3];
        let block = Block::read(&buf, true).unwrap();
        assert_eq!(block.frames.len(), 3);
        assert_eq!(block.frames[0].as_ref(), &[0xa1, 0xa2]);
        assert_eq!(block.frames[1].as_ref(), &[0xb1]);
        assert_eq!(block.frames[2].as_ref(), &[0xc1, 0xc2, 0xc3]);
    }

    #[test]
    fn verify_fixed_lacing() {
        // Three equal 2-byte frames.
        let buf = [0x81, 0x00, 0x00, 0x04, 0x02, 0xa1, 0xa2, 0xb1, 0xb2, 0xc1, 0xc2];
        let block = Block::read(&buf, true).unwrap();
        assert_eq!(block.frames.len(), 3);
        assert_eq!(block.frames[1].as_ref(), &[0xb1, 0xb2]);
    }

    #[test]
    fn verify_fixed_lacing_indivisible_is_error() {
        let buf = [0x81, 0x00, 0x00, 0x04, 0x02, 0xa1, 0xa2, 0xb1, 0xb2, 0xc1];
        assert!(Block::read(&buf, true).is_err());
    }

    #[test]
    fn verify_ebml_lacing() {
        // First size 2 as a vint, then a zero delta, then the remainder.
        let buf = [0x81, 0x00, 0x00, 0x06, 0x02, 0x82, 0xbf, 0xa1, 0xa2, 0xb1, 0xb2, 0xc1];
        let block = Block::read(&buf, true).unwrap();
        assert_eq!(block.frames.len(), 3);
        assert_eq!(block.frames[0].as_ref(), &[0xa1, 0xa2]);
        assert_eq!(block.frames[1].as_ref(), &[0xb1, 0xb2]);
        assert_eq!(block.frames[2].as_ref(), &[0xc1]);
    }

    #[test]
    fn verify_lace_size_past_end_is_error() {
        let buf = [0x81, 0x00, 0x00, 0x02, 0x01, 0x09, 0xa1];
        assert!(Block::read(&buf, true).is_err());
    }

    fn block(track: u64, rel_time: i16, keyframe: bool) -> Block {
        Block { track, rel_time, keyframe, frames: vec![Box::from(&[0u8][..])] }
    }

    #[test]
    fn verify_enumerate_merges_and_sorts() {
        let cluster = ClusterElement {
            timestamp: 0,
            simple_blocks: vec![block(1, 30, false), block(1, 10, true), block(2, 15, false)],
            block_groups: vec![BlockGroup {
                block: block(1, 20, false),
                reference_block: Some(-10),
                duration: None,
            }],
        };

        let views = enumerate_blocks(&cluster, 1);
        let times: Vec<i16> = views.iter().map(|view| view.rel_time).collect();
        assert_eq!(times, vec![10, 20, 30]);
        assert!(views.windows(2).all(|pair| pair[0].rel_time <= pair[1].rel_time));
    }

    #[test]
    fn verify_enumerate_single_representation_keeps_storage_order() {
        let cluster = ClusterElement {
            timestamp: 0,
            simple_blocks: vec![block(1, 5, true), block(1, 0, false)],
            block_groups: Vec::new(),
        };

        let views = enumerate_blocks(&cluster, 1);
        let times: Vec<i16> = views.iter().map(|view| view.rel_time).collect();
        assert_eq!(times, vec![5, 0]);
    }

    #[test]
    fn verify_group_keyframe_inference() {
        let with_reference =
            BlockGroup { block: block(1, 0, false), reference_block: Some(-5), duration: None };
        let without_reference =
            BlockGroup { block: block(1, 0, false), reference_block: None, duration: None };
        assert!(!with_reference.keyframe());
        assert!(without_reference.keyframe());
    }
}
