pub mod tiling;
pub mod stitching;
pub mod threshold;
pub mod classifiers;

pub use tiling::*;
pub use stitching::*;
pub use threshold::*;
pub use classifiers::*;
