// Public API tests for emporter-core
// Scenario tests run against the in-memory companion in support/

mod consent;
mod events;
mod lifecycle;
mod registry;
mod service;
mod support;
mod transport;
