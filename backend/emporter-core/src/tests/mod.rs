mod bridge;
mod config;
mod flight;
mod predicate;
mod process;
mod service;
mod wire;
