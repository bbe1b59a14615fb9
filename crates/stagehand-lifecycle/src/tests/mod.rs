//! Behavioural tests for the lifecycle coordinator.

mod behaviour;
