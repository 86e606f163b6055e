use crate::osc::{
    bundle::{OscBundle, BUNDLE_HEADER_SIZE},
    time_tag::TimeTag,
};

use super::request::{Request, Requestable};

/// Ordered requests executed together at one time tag
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestBundle {
    pub time_tag: TimeTag,
    pub contents: Vec<Requestable>,
}

impl RequestBundle {
    pub fn new(time_tag: TimeTag, contents: Vec<Requestable>) -> Self {
        Self { time_tag, contents }
    }

    pub fn immediately(contents: Vec<Requestable>) -> Self {
        Self::new(TimeTag::Immediately, contents)
    }

    pub fn push(&mut self, requestable: impl Into<Requestable>) {
        self.contents.push(requestable.into());
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    pub fn to_osc(&self) -> OscBundle {
        OscBundle::new(
            self.time_tag,
            self.contents.iter().map(Requestable::to_packet).collect(),
        )
    }

    pub fn encode(&self) -> Vec<u8> {
        self.to_osc().encode()
    }

    /// Header plus a length-prefixed element per item.
    pub fn encoded_size(&self) -> usize {
        BUNDLE_HEADER_SIZE
            + self
                .contents
                .iter()
                .map(|item| 4 + item.encode().len())
                .sum::<usize>()
    }

    pub fn linearize(&self) -> Vec<Request> {
        self.contents.iter().flat_map(Requestable::linearize).collect()
    }

    /// Greedily packs `requests` into as few bundles as possible, each
    /// encoding to at most `max_size` bytes. Requests are never split or
    /// reordered; a request too large on its own ends up alone in its bundle.
    pub fn partition(
        requests: Vec<Requestable>,
        time_tag: TimeTag,
        max_size: usize,
    ) -> Vec<RequestBundle> {
        let mut bundles = Vec::new();
        let mut current = RequestBundle::new(time_tag, Vec::new());
        let mut current_size = BUNDLE_HEADER_SIZE;
        for request in requests {
            let element_size = 4 + request.encode().len();
            if !current.is_empty() && current_size + element_size > max_size {
                bundles.push(std::mem::replace(
                    &mut current,
                    RequestBundle::new(time_tag, Vec::new()),
                ));
                current_size = BUNDLE_HEADER_SIZE;
            }
            current_size += element_size;
            current.contents.push(request);
        }
        if !current.is_empty() {
            bundles.push(current);
        }
        bundles
    }
}
