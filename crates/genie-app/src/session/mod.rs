//! Session lifecycle, listener registration and engine callback handling

mod controller;
mod listeners;
mod sink;

pub use controller::{SessionBuilder, SessionController};
pub use listeners::{CommandListener, StatusListener, TextListener};
