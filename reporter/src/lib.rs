pub mod cli;
pub mod config;
pub mod logging;
pub mod pipeline;
pub mod sink;
pub mod xdmod;
