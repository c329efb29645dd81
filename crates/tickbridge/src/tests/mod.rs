//! Behavioural and API-level suites for the command server.

mod bridge_behaviour;
mod support;
