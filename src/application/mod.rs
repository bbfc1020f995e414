pub mod auth_store;
pub mod bootstrap;
pub mod commands;
pub mod console;
pub mod focus_timer;
pub mod forms;
pub mod presenter;
pub mod services;
pub mod stats;

#[cfg(test)]
pub(crate) mod test_support;
