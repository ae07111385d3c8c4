pub mod commands;
pub mod ops;
pub mod render;
pub mod video;

pub use commands::*;
pub use ops::*;
pub use video::*;
