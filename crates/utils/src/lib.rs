pub mod audio;
pub mod sink;

pub use sink::{AudioSink, SilentSink};
