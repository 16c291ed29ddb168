pub mod descriptor;
pub mod path;
pub mod streamer;

pub use descriptor::FileDescriptor;
pub use path::{build_entry_path, sanitize, sanitize_download_name};
pub use streamer::{ArchiveReport, ArchiveStreamer, SinkError, StreamerOptions};
