pub mod risk;
pub mod state_machine;

pub use risk::RiskPolicy;
pub use state_machine::{SignalStateMachine, SymbolState, Transition, TrendTail};
