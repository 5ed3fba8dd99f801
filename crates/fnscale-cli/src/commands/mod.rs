pub mod image;
pub mod init;
pub mod manifest;
