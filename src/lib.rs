pub mod backends;
pub mod controller;
pub mod error;
pub mod handlers;
pub mod init;
pub mod models;
pub mod stream;

pub use crate::controller::{LifecycleController, LifecycleState, Snapshot};
pub use crate::init::{AiConfig, AppState, Config};
pub use crate::models::{GenerationRequest, SummaryStyle};
