pub mod audio;
pub mod midi;
pub mod sequence;
pub mod sequencer;
pub mod storage;
pub mod synth;
pub mod types;

pub use audio::*;
pub use midi::*;
pub use sequence::*;
pub use sequencer::*;
pub use storage::*;
pub use synth::*;
pub use types::*;
