pub mod command;
pub mod common;
pub mod config;
pub mod market;
pub mod notify;
pub mod strategy;
pub mod trade;
