pub mod audio_synth;
pub mod command;
pub mod fault;
pub mod instruments;
pub mod output_connector;
pub mod playback_manager;
pub mod sequencer;
pub mod tempo;

pub use audio_synth::*;
pub use command::*;
pub use fault::*;
pub use instruments::*;
pub use output_connector::*;
pub use playback_manager::*;
pub use sequencer::*;
pub use tempo::*;
