//! Wire protocol of the stream API: outbound envelopes, inbound events and
//! server error classification. Nothing in here touches the network.

pub mod classifier;
pub mod event;
pub mod payload;

pub use classifier::{check_status, classify_reason};
pub use event::{flatten_event, is_server_echo, subscription_kind, SubscriptionKind, Transaction};
pub use payload::{
    network_name, Abi, AddressConfig, BlockchainId, OutboundMessage, PayloadBuilder, TxStatus,
    API_VERSION, ETHEREUM, GLOBAL_SCOPE,
};
