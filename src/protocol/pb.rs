//! Protobuf bodies exchanged between compute graph nodes and the meta-server.

use bytes::Bytes;

/// Outer frame of every message on the wire. An empty `name` means "no reply".
#[derive(Clone, PartialEq, prost::Message)]
pub struct Envelope {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(bytes = "bytes", tag = "2")]
    pub body: Bytes,
    #[prost(string, tag = "3")]
    pub from: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RegistrationMessage {
    #[prost(string, tag = "1")]
    pub node_id: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RegistrationRespMessage {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(int64, tag = "2")]
    pub rank_id: i64,
    #[prost(int64, tag = "3")]
    pub node_num: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UnregistrationMessage {
    #[prost(string, tag = "1")]
    pub node_id: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct HeartbeatMessage {
    #[prost(string, tag = "1")]
    pub node_id: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MetadataMessage {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(bytes = "bytes", tag = "2")]
    pub value: Bytes,
}
