pub mod midi_export;
pub mod midi_import;

pub use midi_export::*;
pub use midi_import::*;
