//! Command line arguments of the `mka` binary.

use crate::analysis::AnalysisType;
use crate::control::{AnalysisLayout, NewAnalysis, DEFAULT_IO_LIMIT};
use crate::metadata::LibraryMap;
use crate::path::{absolute, readable_file};
use crate::pipeline::PipelineConfig;
use crate::utils::read_file_or_stdin;
use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_REFERENCE_ROOT: &str = "/lab/data/reference";

/// Parse and validate a job batch size, for use with clap's value_parser.
pub fn validate_io_limit(arg: &str) -> Result<usize> {
    let n: usize = arg.parse().context("must be a positive integer")?;
    ensure!(n > 0, "must be at least 1");
    Ok(n)
}

fn absolute_opt(path: Option<&PathBuf>) -> Result<Option<PathBuf>> {
    path.map(|p| absolute(p)).transpose()
}

/// Bootstrap ATAC-seq and RNA-seq analysis pipelines.
#[derive(Parser, Debug)]
#[clap(name = "mka", version, args_override_self = true)]
pub struct Mka {
    #[clap(subcommand)]
    pub subcmd: SubCommand,

    /// Log debugging detail.
    #[clap(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum SubCommand {
    /// Describe the input FASTQ files and write an analysis control directory.
    #[clap(name = "new")]
    New(NewArgs),

    /// Write the pipeline script for the libraries embedded in a control
    /// directory's commands file. Usually run by that file.
    #[clap(name = "pipeline")]
    Pipeline(PipelineArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct NewArgs {
    /// The kind of analysis to set up.
    #[clap(long, short = 't', value_enum, default_value_t = AnalysisType::AtacSeq)]
    pub analysis_type: AnalysisType,

    /// A name for the analysis. Defaults to the last component of ANALYSIS_PATH.
    #[clap(long, short)]
    pub name: Option<String>,

    /// A description of the analysis.
    #[clap(long, short, default_value = "")]
    pub description: String,

    /// Confirm or correct every file's metadata at the terminal.
    #[clap(long, short)]
    pub interactive: bool,

    /// JSON file of library metadata defaults, by sample, library or file.
    #[clap(long, short = 'l', value_name = "JSON", value_parser = readable_file)]
    pub library_defaults: Option<PathBuf>,

    /// Sample sheet exported by the sequencing core.
    #[clap(long, short = 'r', value_name = "CSV", value_parser = readable_file)]
    pub run_info: Option<PathBuf>,

    /// Directory of templates that override the bundled ones.
    #[clap(long, value_name = "DIR", env = "MKA_TEMPLATE_DIR")]
    pub template_dir: Option<PathBuf>,

    /// Reference genome for files no other source assigns one.
    #[clap(long, short = 'g')]
    pub genome: Option<String>,

    /// Root of the aligner indexes and annotations.
    #[clap(long, value_name = "DIR", env = "MKA_REFERENCE_ROOT", default_value = DEFAULT_REFERENCE_ROOT)]
    pub reference_root: PathBuf,

    /// Maximum number of I/O-heavy jobs run at once.
    #[clap(long, value_name = "N", default_value_t = DEFAULT_IO_LIMIT, value_parser = validate_io_limit)]
    pub io_limit: usize,

    /// Control directory. Defaults to ANALYSIS_PATH/control.
    #[clap(long, value_name = "DIR")]
    pub control_path: Option<PathBuf>,

    /// Data directory. Defaults to ANALYSIS_PATH/data.
    #[clap(long, value_name = "DIR")]
    pub data_path: Option<PathBuf>,

    /// Work directory. Defaults to ANALYSIS_PATH/work.
    #[clap(long, value_name = "DIR")]
    pub work_path: Option<PathBuf>,

    /// Where the analysis lives.
    #[clap(value_name = "ANALYSIS_PATH")]
    pub analysis_path: PathBuf,

    /// The FASTQ files to analyze.
    #[clap(value_name = "FILES", required = true, value_parser = readable_file)]
    pub files: Vec<PathBuf>,
}

impl NewArgs {
    pub fn to_request(&self) -> Result<NewAnalysis> {
        let layout = AnalysisLayout::new(
            absolute(&self.analysis_path)?,
            absolute_opt(self.control_path.as_ref())?,
            absolute_opt(self.data_path.as_ref())?,
            absolute_opt(self.work_path.as_ref())?,
        );
        Ok(NewAnalysis {
            name: self.name.clone(),
            description: self.description.clone(),
            analysis_type: self.analysis_type,
            interactive: self.interactive,
            files: self.files.clone(),
            library_defaults: self.library_defaults.clone(),
            run_info: self.run_info.clone(),
            template_dir: self.template_dir.clone(),
            genome: self.genome.clone(),
            reference_root: absolute(&self.reference_root)?,
            io_limit: self.io_limit,
            layout,
        })
    }
}

#[derive(Parser, Debug, Clone)]
pub struct PipelineArgs {
    #[clap(long, short = 't', value_enum)]
    pub analysis_type: AnalysisType,

    #[clap(long, value_name = "DIR")]
    pub analysis_path: PathBuf,

    /// Directory the input files are linked into.
    #[clap(long, value_name = "DIR")]
    pub data_path: PathBuf,

    /// Directory holding one subdirectory per stage.
    #[clap(long, value_name = "DIR")]
    pub work_path: PathBuf,

    /// Root of the aligner indexes and annotations.
    #[clap(long, value_name = "DIR", env = "MKA_REFERENCE_ROOT", default_value = DEFAULT_REFERENCE_ROOT)]
    pub reference_root: PathBuf,

    /// Where to write the pipeline script.
    #[clap(long, short, value_name = "FILE")]
    pub output: PathBuf,

    /// Library map JSON. Read from standard input when omitted.
    #[clap(long, value_name = "JSON")]
    pub libraries: Option<PathBuf>,

    /// Maximum number of I/O-heavy jobs run at once.
    #[clap(long, value_name = "N", default_value_t = DEFAULT_IO_LIMIT, value_parser = validate_io_limit)]
    pub io_limit: usize,

    /// Record each job's resource use with /usr/bin/time.
    #[clap(long)]
    pub time: bool,

    /// Run each job at reduced I/O priority.
    #[clap(long)]
    pub ionice: bool,
}

impl PipelineArgs {
    pub fn to_config(&self) -> Result<PipelineConfig> {
        Ok(PipelineConfig {
            analysis_type: self.analysis_type,
            analysis_path: absolute(&self.analysis_path)?,
            data_path: absolute(&self.data_path)?,
            work_path: absolute(&self.work_path)?,
            reference_root: absolute(&self.reference_root)?,
            output: absolute(&self.output)?,
            io_limit: self.io_limit,
            time: self.time,
            ionice: self.ionice,
        })
    }

    pub fn read_libraries(&self) -> Result<LibraryMap> {
        let text = read_file_or_stdin(self.libraries.as_deref())?;
        LibraryMap::from_json(&text)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_is_consistent() {
        Mka::command().debug_assert();
    }

    #[test]
    fn test_parse_new() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let fq = tmp.path().join("S1___L1.1.fq.gz");
        std::fs::write(&fq, "")?;

        let opts = Mka::try_parse_from([
            "mka",
            "new",
            "-t",
            "rna-seq",
            "--genome",
            "hg19",
            "--io-limit",
            "2",
            "/analyses/liver",
            fq.to_str().unwrap(),
        ])?;
        let SubCommand::New(args) = opts.subcmd else {
            panic!("expected new");
        };
        let req = args.to_request()?;
        assert_eq!(req.analysis_type, AnalysisType::RnaSeq);
        assert_eq!(req.io_limit, 2);
        assert_eq!(req.layout.control_path, PathBuf::from("/analyses/liver/control"));
        assert_eq!(req.files, vec![fq.clone()]);
        assert_eq!(req.name(), "liver");
        Ok(())
    }

    #[test]
    fn test_rejects_missing_file_and_zero_io_limit() {
        assert!(Mka::try_parse_from(["mka", "new", "/a", "/no/such.fq.gz"]).is_err());
        assert!(validate_io_limit("0").is_err());
        assert_eq!(validate_io_limit("3").unwrap(), 3);
    }

    #[test]
    fn test_parse_pipeline() -> Result<()> {
        let opts = Mka::try_parse_from([
            "mka",
            "pipeline",
            "--analysis-type",
            "atac-seq",
            "--analysis-path",
            "/a",
            "--data-path",
            "/a/data",
            "--work-path",
            "/a/work",
            "--reference-root",
            "/ref",
            "--output",
            "/a/control/pipeline",
            "--time",
            "--verbose",
        ])?;
        assert!(opts.verbose);
        let SubCommand::Pipeline(args) = opts.subcmd else {
            panic!("expected pipeline");
        };
        let config = args.to_config()?;
        assert!(config.time);
        assert!(!config.ionice);
        assert_eq!(config.io_limit, DEFAULT_IO_LIMIT);
        Ok(())
    }

    #[test]
    fn test_later_io_limit_wins() -> Result<()> {
        // commands passes its own --io-limit before the user's arguments
        let opts = Mka::try_parse_from([
            "mka",
            "pipeline",
            "--analysis-type",
            "rna-seq",
            "--analysis-path",
            "/a",
            "--data-path",
            "/a/data",
            "--work-path",
            "/a/work",
            "--io-limit",
            "4",
            "--output",
            "/a/control/pipeline",
            "--io-limit",
            "8",
        ])?;
        let SubCommand::Pipeline(args) = opts.subcmd else {
            panic!("expected pipeline");
        };
        assert_eq!(args.io_limit, 8);
        Ok(())
    }
}
