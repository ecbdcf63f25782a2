//! Behavioural suites for the lifecycle engine.

pub(crate) mod support;
