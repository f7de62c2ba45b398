pub mod app;
pub mod background;
pub mod cli;
pub mod config;
pub mod connector;
pub mod content;
pub mod global;
pub mod media;
pub mod page;
pub mod protocol;
pub mod transport;
