pub mod agents;
pub mod benchmark;
pub mod checks;
pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod eval;
pub mod framework;
pub mod profiles;
pub mod provider;
pub mod table;
pub mod telemetry;

#[cfg(test)]
mod tests;
