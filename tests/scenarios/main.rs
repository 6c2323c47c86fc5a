//! Scenario-based tests for agent-pipeline

mod helpers;

mod failures;
mod linear_chain;
mod story_loop;
mod routing;
