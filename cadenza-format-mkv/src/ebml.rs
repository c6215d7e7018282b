// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The consumed EBML tag data model and the collaborator seams.
//!
//! Tags are produced by an external tokenizer. Master tags arrive twice in a streaming
//! context, once at `Start` and once at `End` with children accumulated; leaf tags
//! arrive once, at `End`.

use cadenza_core::errors::Result;

use crate::element_ids::{lookup, ElementType};

/// Which edge of a master element a tag represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagPosition {
    Start,
    End,
}

/// The payload of a consumed tag.
#[derive(Clone, Debug)]
pub enum TagData {
    Master(Vec<EbmlTag>),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    String(String),
    Binary(Box<[u8]>),
    Date(i64),
    /// A master `Start` tag carries no payload yet.
    None,
}

/// One tokenized EBML element.
#[derive(Clone, Debug)]
pub struct EbmlTag {
    pub id: u32,
    pub element_type: ElementType,
    /// Absolute byte offset of the element's first id byte.
    pub start_offset: u64,
    /// Length of the id and size fields preceding the payload.
    pub header_len: u64,
    pub position: TagPosition,
    pub data: TagData,
}

impl EbmlTag {
    /// A leaf tag with the element type derived from the id.
    pub fn leaf(id: u32, start_offset: u64, header_len: u64, data: TagData) -> EbmlTag {
        let (_, element_type) = lookup(id);
        EbmlTag { id, element_type, start_offset, header_len, position: TagPosition::End, data }
    }

    /// A master `Start` tag.
    pub fn master_start(id: u32, start_offset: u64, header_len: u64) -> EbmlTag {
        let (_, element_type) = lookup(id);
        EbmlTag {
            id,
            element_type,
            start_offset,
            header_len,
            position: TagPosition::Start,
            data: TagData::None,
        }
    }

    /// A master `End` tag with accumulated children.
    pub fn master_end(id: u32, start_offset: u64, header_len: u64, children: Vec<EbmlTag>) -> EbmlTag {
        let (_, element_type) = lookup(id);
        EbmlTag {
            id,
            element_type,
            start_offset,
            header_len,
            position: TagPosition::End,
            data: TagData::Master(children),
        }
    }

    pub fn is_end(&self) -> bool {
        self.position == TagPosition::End
    }

    /// Accumulated children, empty for leaves and master `Start` tags.
    pub fn children(&self) -> &[EbmlTag] {
        match &self.data {
            TagData::Master(children) => children,
            _ => &[],
        }
    }

    /// The first child of the given element type.
    pub fn find_child(&self, element_type: ElementType) -> Option<&EbmlTag> {
        self.children().iter().find(|child| child.element_type == element_type)
    }

    /// All children of the given element type, in storage order.
    pub fn children_of(
        &self,
        element_type: ElementType,
    ) -> impl Iterator<Item = &EbmlTag> + '_ {
        self.children().iter().filter(move |child| child.element_type == element_type)
    }

    pub fn as_unsigned(&self) -> Option<u64> {
        match self.data {
            TagData::Unsigned(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_signed(&self) -> Option<i64> {
        match self.data {
            TagData::Signed(value) => Some(value),
            TagData::Unsigned(value) => i64::try_from(value).ok(),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self.data {
            TagData::Float(value) => Some(value),
            TagData::Unsigned(value) => Some(value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.data {
            TagData::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match &self.data {
            TagData::Binary(value) => Some(value),
            _ => None,
        }
    }

    /// Unsigned value of the first child of the given type.
    pub fn child_unsigned(&self, element_type: ElementType) -> Option<u64> {
        self.find_child(element_type).and_then(EbmlTag::as_unsigned)
    }

    /// Float value of the first child of the given type.
    pub fn child_float(&self, element_type: ElementType) -> Option<f64> {
        self.find_child(element_type).and_then(EbmlTag::as_float)
    }

    /// String value of the first child of the given type.
    pub fn child_string(&self, element_type: ElementType) -> Option<String> {
        self.find_child(element_type).and_then(|tag| tag.as_str().map(str::to_string))
    }

    /// Binary payload of the first child of the given type.
    pub fn child_binary(&self, element_type: ElementType) -> Option<Box<[u8]>> {
        self.find_child(element_type).and_then(|tag| tag.as_binary().map(Into::into))
    }
}

/// A pull stream of tokenized tags. Dropping the stream aborts the underlying request.
pub trait TagStream {
    /// The next tag, or `None` when the stream is exhausted.
    fn next_tag(&mut self) -> Result<Option<EbmlTag>>;
}

/// The range-fetch seam: opens a fresh tag stream at an arbitrary absolute byte offset.
pub trait TagSource {
    type Stream: TagStream;

    fn open(&self, byte_start: u64) -> Result<Self::Stream>;
}

/// A tag stream over an in-memory tag vector, for local replay and tests.
pub struct VecTagStream {
    tags: std::vec::IntoIter<EbmlTag>,
}

impl VecTagStream {
    pub fn new(tags: Vec<EbmlTag>) -> VecTagStream {
        VecTagStream { tags: tags.into_iter() }
    }
}

impl TagStream for VecTagStream {
    fn next_tag(&mut self) -> Result<Option<EbmlTag>> {
        Ok(self.tags.next())
    }
}

/// A tag source over an in-memory tag vector. Opening at an offset replays the tags
/// whose start offset is at or past it.
pub struct VecTagSource {
    tags: Vec<EbmlTag>,
}

impl VecTagSource {
    pub fn new(tags: Vec<EbmlTag>) -> VecTagSource {
        VecTagSource { tags }
    }
}

impl TagSource for VecTagSource {
    type Stream = VecTagStream;

    fn open(&self, byte_start: u64) -> Result<Self::Stream> {
        let tags =
            self.tags.iter().filter(|tag| tag.start_offset >= byte_start).cloned().collect();
        Ok(VecTagStream::new(tags))
    }
}
