//! The interactive dashboard engine: events, the state machine, frame
//! composition and the event loop that drives them.

pub mod dispatcher;
pub mod event;
pub mod frame;
pub mod keymap;
pub mod runtime;
pub mod state;
pub mod view;
