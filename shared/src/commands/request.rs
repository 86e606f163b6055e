use crate::osc::{argument::OscArgument, message::OscMessage, packet::OscPacket};

use super::{
    buffers::BufferRequest, buses::BusRequest, bundle::RequestBundle, groups::GroupRequest,
    nodes::NodeRequest, pattern::ReplyPatterns, server::ServerRequest,
    synthdefs::SynthDefRequest, synths::SynthRequest,
};

/// Behaviour shared by every request kind
pub trait Command {
    /// Wire address, e.g. `/s_new`
    fn address(&self) -> &'static str;
    /// Linearizes the request's fields into one OSC message.
    fn to_osc(&self) -> OscMessage;
    /// Replies that settle this request, if it is ever answered.
    fn reply_patterns(&self) -> Option<ReplyPatterns>;
}

/// Every request the client can send, grouped by kind
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Server(ServerRequest),
    Node(NodeRequest),
    Group(GroupRequest),
    Synth(SynthRequest),
    Buffer(BufferRequest),
    Bus(BusRequest),
    SynthDef(SynthDefRequest),
}

impl Request {
    /// The request chained to run once this one completes.
    pub fn completion(&self) -> Option<&Requestable> {
        match self {
            Request::Buffer(request) => request.completion(),
            Request::SynthDef(request) => request.completion(),
            _ => None,
        }
    }

    pub fn without_completion(&self) -> Request {
        match self {
            Request::Buffer(request) => Request::Buffer(request.without_completion()),
            Request::SynthDef(request) => Request::SynthDef(request.without_completion()),
            other => other.clone(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        self.to_osc().encode()
    }

    /// This request without its completion, followed by the completion
    /// chain, in execution order.
    pub fn linearize(&self) -> Vec<Request> {
        let mut requests = vec![self.without_completion()];
        if let Some(completion) = self.completion() {
            requests.extend(completion.linearize());
        }
        requests
    }
}

impl Command for Request {
    fn address(&self) -> &'static str {
        match self {
            Request::Server(request) => request.address(),
            Request::Node(request) => request.address(),
            Request::Group(request) => request.address(),
            Request::Synth(request) => request.address(),
            Request::Buffer(request) => request.address(),
            Request::Bus(request) => request.address(),
            Request::SynthDef(request) => request.address(),
        }
    }

    fn to_osc(&self) -> OscMessage {
        match self {
            Request::Server(request) => request.to_osc(),
            Request::Node(request) => request.to_osc(),
            Request::Group(request) => request.to_osc(),
            Request::Synth(request) => request.to_osc(),
            Request::Buffer(request) => request.to_osc(),
            Request::Bus(request) => request.to_osc(),
            Request::SynthDef(request) => request.to_osc(),
        }
    }

    fn reply_patterns(&self) -> Option<ReplyPatterns> {
        match self {
            Request::Server(request) => request.reply_patterns(),
            Request::Node(request) => request.reply_patterns(),
            Request::Group(request) => request.reply_patterns(),
            Request::Synth(request) => request.reply_patterns(),
            Request::Buffer(request) => request.reply_patterns(),
            Request::Bus(request) => request.reply_patterns(),
            Request::SynthDef(request) => request.reply_patterns(),
        }
    }
}

/// Anything that can be transmitted: a single request or a bundle
#[derive(Debug, Clone, PartialEq)]
pub enum Requestable {
    Request(Request),
    Bundle(RequestBundle),
}

impl Requestable {
    pub fn to_packet(&self) -> OscPacket {
        match self {
            Requestable::Request(request) => OscPacket::Message(request.to_osc()),
            Requestable::Bundle(bundle) => OscPacket::Bundle(bundle.to_osc()),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        self.to_packet().encode()
    }

    /// Bundles carry no reply patterns of their own; they are settled by a
    /// trailing `/sync`.
    pub fn reply_patterns(&self) -> Option<ReplyPatterns> {
        match self {
            Requestable::Request(request) => request.reply_patterns(),
            Requestable::Bundle(_) => None,
        }
    }

    pub fn linearize(&self) -> Vec<Request> {
        match self {
            Requestable::Request(request) => request.linearize(),
            Requestable::Bundle(bundle) => bundle.linearize(),
        }
    }
}

/// Appends the completion's datagram as a trailing blob argument.
pub(crate) fn push_completion(
    arguments: &mut Vec<OscArgument>,
    completion: &Option<Box<Requestable>>,
) {
    if let Some(completion) = completion {
        arguments.push(OscArgument::Blob(completion.encode()));
    }
}

macro_rules! impl_request_from {
    ($kind:ty, $variant:ident) => {
        impl From<$kind> for Request {
            fn from(request: $kind) -> Self {
                Request::$variant(request)
            }
        }

        impl From<$kind> for Requestable {
            fn from(request: $kind) -> Self {
                Requestable::Request(Request::$variant(request))
            }
        }
    };
}

impl_request_from!(ServerRequest, Server);
impl_request_from!(NodeRequest, Node);
impl_request_from!(GroupRequest, Group);
impl_request_from!(SynthRequest, Synth);
impl_request_from!(BufferRequest, Buffer);
impl_request_from!(BusRequest, Bus);
impl_request_from!(SynthDefRequest, SynthDef);

impl From<Request> for Requestable {
    fn from(request: Request) -> Self {
        Requestable::Request(request)
    }
}

impl From<RequestBundle> for Requestable {
    fn from(bundle: RequestBundle) -> Self {
        Requestable::Bundle(bundle)
    }
}
