pub mod client;
pub mod cmd;
pub mod common;
pub mod protocol;
pub mod topology;
pub mod transport;

pub use common::{Error, Result, TopologyConfig};
pub use topology::{MetaServerNode, TopoState};
