pub mod dirty;
pub mod frame;
pub mod timers;

pub use dirty::*;
pub use frame::*;
pub use timers::*;
