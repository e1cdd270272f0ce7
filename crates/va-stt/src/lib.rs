pub mod adapter;
pub mod deepgram;
pub mod error;
pub mod events;
pub mod session;

pub use adapter::SttAdapter;
pub use deepgram::DeepgramSttAdapter;
pub use error::{Result, SttError};
pub use events::SttEvent;
pub use session::SttSessionHandle;
