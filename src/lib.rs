pub mod backend;
pub mod chain;
pub mod common;
pub mod countdown;
pub mod manager;
pub mod policy;
pub mod sequencer;
pub mod sync;
pub mod testing;
pub mod trade;
pub mod trader;
