// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Bootstrap ATAC-seq and RNA-seq analyses from FASTQ files.
//!
//! `mka new` works out which sample, library and read group every input file
//! belongs to, from the run info, a defaults file, the
//! `sample___library___readgroup___description` filename convention and
//! optionally the user, and renders an analysis control directory. The
//! `commands` script it writes runs `mka pipeline`, which stages the inputs
//! and writes a drmr pipeline script.

pub mod analysis;
pub mod cli;
pub mod control;
pub mod dates;
pub mod defaults;
pub mod error;
pub mod filenames;
pub mod logging;
pub mod metadata;
pub mod path;
pub mod pipeline;
pub mod prompt;
pub mod run_info;
pub mod templates;
pub mod utils;

pub use error::MkaError;
pub use filenames::FilenameFields;
pub use metadata::{describe_libraries, LibraryMap, LibraryMetadata};
