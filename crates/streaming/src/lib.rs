pub mod borders;
pub mod cache;
pub mod request;
pub mod residency;

pub use borders::*;
pub use cache::*;
pub use request::*;
pub use residency::*;
