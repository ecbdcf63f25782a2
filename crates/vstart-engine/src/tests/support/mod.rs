//! Test doubles and the shared behavioural world.

mod fakes;
mod world;

pub use fakes::{LifecycleEvent, RecordingLauncher, RecordingReaper, RecordingReporter};
pub use world::TestWorld;
