//! Blocknative event stream - main library
//!
//! Thin application layer over the `blockstream` client core.
//!
//! ## Architecture
//!
//! - **blockstream**: session, subscriptions and event routing (re-exported from workspace)
//! - **bin_common**: shared utilities for the binaries (config, logging, runner)
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use blocknative_stream::bin_common::{api_key_from_env, init_tracing, run_stream, RunConfig};
//! use blocknative_stream::blockstream::StreamClient;
//! ```

// Re-export workspace libraries for convenience
pub use blockstream;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod logging;
    pub mod runner;
    pub mod subscriptions;

    pub use cli::{
        api_key_from_env, client_builder_from_env, endpoint_from_env, load_config_from_env, load_env,
        network_id_from_env, parse_args, read_api_key, ConfigType,
    };
    pub use logging::init_tracing;
    pub use runner::{run_stream, RunConfig};
    pub use subscriptions::{load_subscriptions, parse_subscriptions, SubscriptionEntry, SubscriptionFile};
}
