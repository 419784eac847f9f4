//! # One-Shot Migration Task
//!
//! State machine, platform contract, polling policy and orchestrator for the
//! database migration task run once per deployment.

pub mod error;
pub mod events;
pub mod orchestrator;
pub mod platform;
pub mod poll;
pub mod state_machine;
pub mod states;

pub use error::{MigrationError, MigrationResult, PollPhase};
pub use events::MigrationEvent;
pub use orchestrator::{MigrationOutcome, MigrationReport, MigrationTaskOrchestrator, SkipReason};
pub use platform::{
    ContainerStatus, LaunchFailure, LaunchedTask, PlacementConfig, PlatformError, RunTaskRequest,
    RunTaskResponse, TaskDescription, TaskPlatform, TaskStatus,
};
pub use poll::{poll_until, Clock, PollOutcome, PollPolicy, TokioClock};
pub use state_machine::{MigrationStateMachine, StateTransition};
pub use states::MigrationState;
