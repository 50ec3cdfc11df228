pub mod frame;
pub mod screenshot;
pub mod stability;
pub mod traits;

pub use frame::{Frame, FrameHash};
pub use traits::FrameSource;
