// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Utility methods.

use anyhow::{Context, Result};
use itertools::Itertools;
use std::io::{self, Read};
use std::path::Path;

/// Convert an io::Error to a string without the trailing "(os error N)".
fn io_error_to_string(err: &io::Error) -> String {
    let s = err.to_string();
    s.strip_suffix(&format!(" (os error {})", err.raw_os_error().unwrap_or(0)))
        .unwrap_or(&s)
        .to_string()
}

/// Format an error and its causes, one per line.
pub fn error_chain(err: &anyhow::Error) -> String {
    let chain = err.chain().join("\n\tCaused by: ");
    match err.downcast_ref::<io::Error>() {
        Some(io_err) if err.chain().len() <= 2 => {
            let io_str = io_error_to_string(io_err);
            if err.chain().len() == 1 {
                format!("ERROR: {io_str}")
            } else {
                format!("ERROR: {io_str}: {err}")
            }
        }
        _ => format!("ERROR: {chain}"),
    }
}

/// Print an error chain to stderr.
pub fn print_error_chain(err: &anyhow::Error) {
    eprintln!("{}", error_chain(err));
}

/// Read a whole file, or stdin when no path is given.
pub fn read_file_or_stdin(path: Option<&Path>) -> Result<String> {
    let mut text = String::new();
    match path {
        Some(p) => {
            text = std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?
        }
        None => {
            io::stdin()
                .lock()
                .read_to_string(&mut text)
                .context("reading standard input")?;
        }
    }
    Ok(text)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::MkaError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_chain() {
        let err = anyhow::Error::from(MkaError::PromptClosed("Sample".to_string()))
            .context("describing S1___L1.1.fq.gz");
        assert_eq!(
            error_chain(&err),
            "ERROR: describing S1___L1.1.fq.gz\n\tCaused by: input ended while waiting for an answer to \"Sample\""
        );
    }

    #[test]
    fn test_io_error_suffix_is_dropped() {
        let err = std::fs::read_to_string("/no/such/file").unwrap_err();
        let msg = error_chain(&anyhow::Error::from(err));
        assert!(!msg.contains("os error"));
        assert!(msg.starts_with("ERROR: "));
    }

    #[test]
    fn test_read_file() -> Result<()> {
        let tmp = tempfile::NamedTempFile::new()?;
        std::fs::write(tmp.path(), "{}")?;
        assert_eq!(read_file_or_stdin(Some(tmp.path()))?, "{}");
        Ok(())
    }
}
