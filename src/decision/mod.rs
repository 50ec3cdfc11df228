pub mod client;
pub mod http;
pub mod types;

pub use client::DecisionClient;
pub use types::{DecisionAction, DecisionOutcome, DecisionResponse};
