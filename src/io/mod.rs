//! Stream sources for archives.
//!
//! Discovery and extraction work over any `std::io::Read + Seek` value. This
//! module provides the two sources the CLI needs: a local file and a remote
//! file fetched lazily with HTTP Range requests. In-memory archives can use
//! `std::io::Cursor<Vec<u8>>` directly.

mod http;
mod local;

pub use http::HttpRangeStream;
pub use local::LocalFile;
