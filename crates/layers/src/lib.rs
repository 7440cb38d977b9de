pub mod labels;
pub mod layer;
pub mod markers;
pub mod overlays;
pub mod symbology;

pub use labels::*;
pub use layer::*;
pub use markers::*;
pub use overlays::*;
pub use symbology::*;
