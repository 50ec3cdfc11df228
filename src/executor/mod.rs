pub mod coordinator;
pub mod dispatcher;
pub mod handle;
pub mod input;
pub mod safety;
pub mod traits;

pub use handle::ExecutorHandle;
pub use traits::GestureExecutor;
