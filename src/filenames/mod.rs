//! Filename conventions for FASTQ files handed to `mka`.

pub mod library_fastq;

pub use library_fastq::{FilenameFields, DEFAULT_READGROUP};
