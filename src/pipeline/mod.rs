// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Write the drmr pipeline script for a described set of libraries.
//!
//! A pipeline is a list of stages. Each stage is a batch of independent shell
//! jobs sharing one resource request, and stages are separated by
//! `# drmr:wait` barriers so every job of a stage sees the outputs of the
//! previous one. Stages that hammer the filesystem are further split into
//! batches of at most `io_limit` jobs.

mod atac;
mod rna;

use crate::analysis::AnalysisType;
use crate::error::MkaError;
use crate::metadata::{LibraryMap, LibraryMetadata};
use crate::path::{mkdir, symlink};
use anyhow::{Context, Result};
use log::{debug, info};
use shell_escape::escape;
use std::borrow::Cow;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

const IONICE: &str = "ionice -c 2 -n 7";
const TIME: &str = "/usr/bin/time -v -o";

/// Resources requested for every job of a stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resources {
    pub time_limit: &'static str,
    pub processors: u32,
    pub memory: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    /// Unique within its stage; names the job's `.time` file.
    pub name: String,
    pub command: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stage {
    pub name: &'static str,
    pub comment: &'static str,
    pub resources: Resources,
    pub io_heavy: bool,
    pub jobs: Vec<Job>,
}

impl Stage {
    pub fn new(name: &'static str, comment: &'static str, resources: Resources) -> Stage {
        Stage {
            name,
            comment,
            resources,
            io_heavy: false,
            jobs: Vec::new(),
        }
    }

    pub fn io_heavy(mut self) -> Stage {
        self.io_heavy = true;
        self
    }

    pub fn push(&mut self, name: impl Into<String>, command: impl Into<String>) {
        self.jobs.push(Job {
            name: name.into(),
            command: command.into(),
        });
    }
}

/// Settings for one `mka pipeline` run.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub analysis_type: AnalysisType,
    pub analysis_path: PathBuf,
    pub data_path: PathBuf,
    pub work_path: PathBuf,
    pub reference_root: PathBuf,
    pub output: PathBuf,
    pub io_limit: usize,
    /// Record each job's resource use with `/usr/bin/time -v`.
    pub time: bool,
    /// Run each job at reduced I/O priority.
    pub ionice: bool,
}

impl PipelineConfig {
    pub fn stage_dir(&self, stage: &str) -> PathBuf {
        self.work_path.join(stage)
    }

    /// Where a library file is linked inside the data directory.
    pub fn staged(&self, file: &str) -> PathBuf {
        match Path::new(file).file_name() {
            Some(name) => self.data_path.join(name),
            None => self.data_path.join(file),
        }
    }

    pub fn analysis_name(&self) -> String {
        self.analysis_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "analysis".to_string())
    }
}

/// One read group's staged files: one for single-end, R1 then R2 for paired-end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadGroupInput {
    pub id: String,
    pub files: Vec<PathBuf>,
}

impl ReadGroupInput {
    pub fn is_paired(&self) -> bool {
        self.files.len() == 2
    }
}

/// Read groups of a library in id order, with their files in the data directory.
pub fn readgroup_inputs(
    config: &PipelineConfig,
    library: &LibraryMetadata,
) -> Result<Vec<ReadGroupInput>> {
    library
        .readgroups
        .iter()
        .map(|(id, files)| {
            if files.len() > 2 {
                return Err(MkaError::OversizedReadGroup {
                    library: library.library.clone(),
                    readgroup: id.clone(),
                    count: files.len(),
                }
                .into());
            }
            Ok(ReadGroupInput {
                id: id.clone(),
                files: files.iter().map(|f| config.staged(f)).collect(),
            })
        })
        .collect()
}

/// Quote a path for the shell.
pub fn q(path: &Path) -> Cow<'static, str> {
    escape(path.display().to_string().into())
}

/// Quote a word for the shell.
pub fn qs(word: &str) -> Cow<'static, str> {
    escape(word.to_string().into())
}

/// FastQC on every input file, shared by all analysis types.
fn fastqc_stage(config: &PipelineConfig, libraries: &LibraryMap) -> Stage {
    let mut stage = Stage::new(
        "fastqc",
        "Read quality reports for every input file",
        Resources {
            time_limit: "4h",
            processors: 1,
            memory: "4g",
        },
    );
    let out = config.stage_dir(stage.name);
    for (_, library) in libraries.iter() {
        for file in library.readgroups.files() {
            let staged = config.staged(file);
            let name = staged
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            stage.push(name, format!("fastqc -o {} {}", q(&out), q(&staged)));
        }
    }
    stage
}

/// The stages for `config.analysis_type`, in execution order.
pub fn plan(config: &PipelineConfig, libraries: &LibraryMap) -> Result<Vec<Stage>> {
    let mut stages = vec![fastqc_stage(config, libraries)];
    match config.analysis_type {
        AnalysisType::AtacSeq => stages.extend(atac::stages(config, libraries)?),
        AnalysisType::RnaSeq => stages.extend(rna::stages(config, libraries)?),
    }
    Ok(stages)
}

fn wrap(config: &PipelineConfig, stage: &Stage, job: &Job) -> String {
    if !config.time && !config.ionice {
        return job.command.clone();
    }
    let mut parts = Vec::with_capacity(3);
    if config.ionice {
        parts.push(IONICE.to_string());
    }
    if config.time {
        let time_file = config
            .stage_dir(stage.name)
            .join(format!("{}.time", job.name));
        parts.push(format!("{TIME} {}", q(&time_file)));
    }
    parts.push(format!("bash -c {}", qs(&job.command)));
    parts.join(" ")
}

/// The text of the pipeline script. Stages without jobs are left out.
pub fn render_pipeline(config: &PipelineConfig, stages: &[Stage]) -> String {
    let mut out = String::new();
    out.push_str("#!/bin/bash\n");
    let _ = writeln!(
        out,
        "#\n# {} pipeline for {}\n#",
        config.analysis_type,
        config.analysis_path.display()
    );

    let batch_size = config.io_limit.max(1);
    for stage in stages.iter().filter(|s| !s.jobs.is_empty()) {
        let r = &stage.resources;
        let _ = writeln!(out, "\n#\n# {}\n#", stage.comment);
        let _ = writeln!(out, "# drmr:label {}", stage.name);
        let _ = writeln!(
            out,
            "# drmr:job time_limit={} processors={} memory={} working_directory={}\n",
            r.time_limit,
            r.processors,
            r.memory,
            config.stage_dir(stage.name).display()
        );

        let batches: Vec<&[Job]> = if stage.io_heavy {
            stage.jobs.chunks(batch_size).collect()
        } else {
            vec![&stage.jobs[..]]
        };
        for (i, batch) in batches.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            for job in *batch {
                out.push_str(&wrap(config, stage, job));
                out.push('\n');
            }
            out.push_str("\n# drmr:wait\n");
        }
    }
    out
}

/// Link every library file into the data directory.
pub fn stage_inputs(config: &PipelineConfig, libraries: &LibraryMap) -> Result<()> {
    for (_, library) in libraries.iter() {
        for file in library.readgroups.files() {
            let src = Path::new(file);
            let dest = config.staged(file);
            if src == dest {
                continue;
            }
            debug!("linking {} to {}", dest.display(), src.display());
            symlink(src, &dest, true)?;
        }
    }
    Ok(())
}

/// Stage the inputs, create the work directories and write the pipeline script.
pub fn write_pipeline(config: &PipelineConfig, libraries: &LibraryMap) -> Result<Vec<Stage>> {
    let stages = plan(config, libraries)?;

    mkdir(&config.data_path)?;
    mkdir(&config.work_path)?;
    stage_inputs(config, libraries)?;
    for stage in stages.iter().filter(|s| !s.jobs.is_empty()) {
        mkdir(&config.stage_dir(stage.name))?;
    }

    let script = render_pipeline(config, &stages);
    if let Some(parent) = config.output.parent() {
        mkdir(parent)?;
    }
    fs::write(&config.output, script)
        .with_context(|| format!("writing pipeline {}", config.output.display()))?;

    let jobs: usize = stages.iter().map(|s| s.jobs.len()).sum();
    info!(
        "wrote {} jobs in {} stages to {}",
        jobs,
        stages.iter().filter(|s| !s.jobs.is_empty()).count(),
        config.output.display()
    );
    Ok(stages)
}
