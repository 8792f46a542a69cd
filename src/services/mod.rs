//! Application services: the operations behind every user-triggered action.

mod club;

pub use club::*;
