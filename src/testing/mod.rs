mod harness;
mod scripted_gateway;
mod scripted_transport;
mod some_test_params;

pub use harness::spawn_trader;
pub use scripted_gateway::ScriptedGateway;
pub use scripted_transport::{ChannelTransport, ScriptedTransport};
pub use some_test_params::SomeTestParams;
