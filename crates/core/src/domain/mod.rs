pub mod event;
pub mod file;
pub mod message;
