pub mod app;
pub mod cli;
pub mod codec;
pub mod config;
pub mod events;
pub mod filter;
pub mod form;
pub mod logging;
pub mod output;
pub mod servers;

#[cfg(test)]
mod tests;
