//! Cluster topology coordination
//!
//! The meta-server tracks compute graph nodes as they register, keeps their
//! heartbeats, relays small metadata values between them and drives the
//! cluster lifecycle:
//!
//! ```text
//! Initializing --(all nodes registered)--> Initialized --(all unregistered)--> Finished
//!      |
//!      +--(init timeout)--> Failed
//! ```

pub mod dispatcher;
pub mod meta_server_node;
pub mod metadata;
pub mod monitor;
pub mod registry;
pub mod state;

pub use dispatcher::{MessageDispatcher, MessageHandler};
pub use meta_server_node::MetaServerNode;
pub use metadata::MetadataStore;
pub use monitor::{LivenessMonitor, MonitorHandle};
pub use registry::{ComputeGraphNodeState, NodeRegistry, UnregisterStatus};
pub use state::{TopoState, TopoStateCell};
