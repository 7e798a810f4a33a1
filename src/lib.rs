#![doc = "dirpub: publish files dropped in a directory to a Kafka topic."]

//! A drop file holds an optional key, optional headers and a body (see
//! [`content`]). The [`bridge`] polls a directory, publishes each file
//! through a [`contract::Publisher`] and deletes it once acknowledged.

pub mod assemble;
pub mod bridge;
pub mod cli;
pub mod config;
pub mod content;
pub mod contract;
pub mod load_config;
pub mod poll;
pub mod publish;
pub mod signal;

pub use cli::{run, Cli, Commands};
