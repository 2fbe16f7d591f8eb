//! Integration tests

mod common;
mod pipeline_flow;
mod properties;
mod scenarios;
