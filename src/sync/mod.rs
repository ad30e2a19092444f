mod channel;

pub use channel::{PushStream, PushTransport, WsTransport, RECONNECT_DELAY};
pub(crate) use channel::{SyncChannel, SyncEvent};
