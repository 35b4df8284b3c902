pub mod bootstrap;
pub mod commands;
pub mod endpoint_resolver;
pub mod stats_poller;
pub mod timer_engine;
pub mod timer_ticker;
