//! Type definitions

pub mod location;
pub mod messages;
pub mod trip;

pub use location::*;
pub use messages::*;
pub use trip::*;
