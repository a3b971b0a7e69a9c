pub mod analyser;
pub mod decode;
pub mod media;
pub mod source;
pub mod stream;
pub mod synthetic;

pub use media::{MediaElementSource, Playback, PlaybackEvent, PlaybackHandle};
pub use source::{SignalSource, SourceId, SourceKind};
pub use stream::{StreamFeed, StreamSource};
pub use synthetic::SyntheticSource;
