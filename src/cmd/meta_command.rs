use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum MetaCommands {
    /// Write a metadata value shared by all nodes
    Put {
        /// Metadata name
        #[arg(value_name = "NAME")]
        name: String,

        /// Value to store (UTF-8)
        #[arg(value_name = "VALUE")]
        value: String,
    },

    /// Read a metadata value
    Get {
        /// Metadata name
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Register a compute graph node and print its rank
    Register {
        #[arg(value_name = "NODE_ID")]
        node_id: String,
    },

    /// Unregister a compute graph node
    Unregister {
        #[arg(value_name = "NODE_ID")]
        node_id: String,
    },

    /// Send one heartbeat on behalf of a node
    Heartbeat {
        #[arg(value_name = "NODE_ID")]
        node_id: String,
    },

    /// Send a user defined message and print the reply
    Send {
        /// Message name (must not be all digits)
        #[arg(value_name = "NAME")]
        name: String,

        /// Message body (UTF-8)
        #[arg(value_name = "BODY", default_value = "")]
        body: String,
    },
}
