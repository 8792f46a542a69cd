//! Calendar view of the club's meetups: interval projection and styling.

mod projector;
mod style;

pub use projector::*;
pub use style::*;
