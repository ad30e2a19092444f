mod client;
mod push;

pub use client::{BackendClient, RuntimeConfig};
pub use push::PushEnvelope;
