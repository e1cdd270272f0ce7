pub mod adapter;
pub mod elevenlabs;
pub mod error;
pub mod session;

pub use adapter::{OnAudio, TtsAdapter};
pub use elevenlabs::ElevenLabsTtsAdapter;
pub use error::{Result, TtsError};
pub use session::TtsSessionHandle;
