pub mod config;
pub mod domain;
pub mod files;

pub use domain::event::{ActionEvent, CommandEvent, MessageEvent};
pub use domain::file::FileDescriptor;
pub use domain::message::MessageRef;
pub use files::{get_images, list_files, FileListError};
