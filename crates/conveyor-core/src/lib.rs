//! Core types and configuration for conveyor.
//!
//! This crate provides the fundamental data structures shared by the job
//! backend and the orchestrator: file locators, display contexts, device
//! hot-plug events, the error taxonomy and the orchestrator configuration.

mod config;
mod device;
mod display;
mod error;
mod locator;

pub use config::{OrchestratorConfig, OrchestratorConfigBuilder};
pub use device::{DeviceAction, DeviceEvent, DeviceId};
pub use display::DisplayContext;
pub use error::{ConfigError, ResolutionError, SpawnError, ValidationError};
pub use locator::{Locator, TRASH_ROOT_URI};
