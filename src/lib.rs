pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod output;
pub mod session;
pub mod shell;
pub mod utils;
pub mod view;

#[cfg(test)]
mod tests;
