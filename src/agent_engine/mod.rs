pub mod engine;
pub mod event_bus;
pub mod goals;
pub mod history;
pub mod loop_control;
pub mod state;

pub use engine::{ControlLoop, LoopHandle, LoopReport};
pub use event_bus::{EventBus, LoopEvent};
pub use state::{CycleOutcome, LoopExit, LoopState};
