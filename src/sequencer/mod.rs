mod sequencer;

pub use sequencer::SequencerStep;
pub(crate) use sequencer::{SequencerEvent, TxSequencer};
