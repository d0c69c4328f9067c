//! Core data model for the terminal panel
//!
//! This module contains the display surface contract shared by the session
//! core and the host UI.

pub mod display;

pub use display::{DisplaySurface, TextBuffer};
