pub mod config;
pub mod convert;
pub mod events;
pub mod fallback;
pub mod hub;
pub mod loader;
pub mod scanner;
pub mod storage;
pub mod watcher;
