// Terminal panel library - the session core is usable without the UI stack

pub mod app;
pub mod config;
pub mod input;
pub mod model;
pub mod services;

#[cfg(feature = "runtime")]
pub mod view;
