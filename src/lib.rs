#[macro_use]
extern crate log;

pub mod command;
pub mod engine;
pub mod mapper;
pub mod protocol;
pub mod queue;
pub mod scheduler;
pub mod state;
pub mod status;
