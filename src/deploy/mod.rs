//! Storage backends
//!
//! `s3` talks to any S3-compatible bucket; `local` keeps everything in a
//! sqlite file or in process memory.

pub mod local;
pub mod s3;
