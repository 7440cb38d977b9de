//! Dual-engine globe view controller.
//!
//! A sphere engine renders the whole planet at low zoom and a tile engine
//! renders street-level maps at high zoom. [`GlobeController`] keeps one
//! camera view, one tool mode and one set of overlays, and hands them to
//! whichever engine is primary.

pub mod camera;
pub mod config;
pub mod controller;
pub mod engine;
pub mod events;
pub mod fly;
pub mod interaction;
pub mod mode_switch;
pub mod orbit;
pub mod readout;
pub mod sphere;
pub mod state;
pub mod status;
pub mod tile;

#[cfg(test)]
mod scenarios;

pub use camera::*;
pub use config::*;
pub use controller::*;
pub use engine::*;
pub use events::*;
pub use fly::*;
pub use interaction::*;
pub use mode_switch::*;
pub use orbit::*;
pub use readout::*;
pub use sphere::*;
pub use state::*;
pub use status::*;
pub use tile::*;
