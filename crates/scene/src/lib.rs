pub mod picking;
pub mod selection;
pub mod site;

pub use picking::*;
pub use selection::*;
pub use site::*;
