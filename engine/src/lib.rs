// Engine library root

pub mod config;
pub mod data;
pub mod error;
pub mod indicators;
pub mod services;
pub mod signals;

pub use error::{EngineError, Result};
