pub mod broadcast;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod ecs;
pub mod error;
pub mod geo;
pub mod lifecycle;
pub mod location;
pub mod matcher;
pub mod presence;
pub mod queue;
pub mod runner;
pub mod systems;

#[cfg(feature = "test-helpers")]
pub mod test_helpers;
