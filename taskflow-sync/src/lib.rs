//! taskflow-sync: count synchronization, live channel, and the REST store client.

pub mod counts;
pub mod error;
pub mod live;
pub mod rest;
pub mod ws;

pub use counts::{CountState, CountSynchronizer, Invalidations};
pub use error::SyncError;
pub use live::{
    decode_message, ChannelStatus, CloseKind, Connector, Frame, LiveChannel, LiveConnection,
    LiveMessage, DEFAULT_RECONNECT_DELAY,
};
pub use rest::RestClient;
pub use ws::WsConnector;
