// Library for tests to access modules

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod memory;
pub mod models;
pub mod notifier;
pub mod os;
pub mod registry;
pub mod routes;
pub mod sampler;
pub mod state;
pub mod worker;
