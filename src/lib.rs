pub mod archive;
pub mod config;
pub mod resolver;
pub mod s3;
pub mod server;
