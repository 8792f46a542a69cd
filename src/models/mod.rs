//! Club data model: meetups, members and the attendee links between them.
//!
//! Wire shapes are lenient on input (ids as numbers or numeric strings,
//! nullable columns, either attendee join shape) and canonical everywhere
//! else.

mod attendee;
mod ids;
mod meetup;
mod member;
mod wire;

pub use attendee::*;
pub use ids::*;
pub use meetup::*;
pub use member::*;
