//! Session state machine driving one terminal panel.

pub mod session;

pub use session::{Session, SessionOptions, SessionState, NOT_AVAILABLE_MESSAGE};
