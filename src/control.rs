// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Set up a new analysis: describe the libraries and write the control directory.

use crate::analysis::AnalysisType;
use crate::dates;
use crate::defaults::LibraryDefaults;
use crate::error::MkaError;
use crate::metadata::{describe_libraries, DescribeOptions, LibraryMap};
use crate::path::{check_readable_file, mkdir};
use crate::prompt::Prompter;
use crate::run_info::RunInfo;
use crate::templates::{render_control_dir, TemplateContext, COMMANDS};
use anyhow::{Context, Result};
use log::info;
use std::path::{Path, PathBuf};

pub const DEFAULT_IO_LIMIT: usize = 4;

/// The directories of one analysis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisLayout {
    pub analysis_path: PathBuf,
    pub control_path: PathBuf,
    pub data_path: PathBuf,
    pub work_path: PathBuf,
}

impl AnalysisLayout {
    /// Unset directories default to `control`, `data` and `work` under the analysis path.
    pub fn new(
        analysis_path: impl Into<PathBuf>,
        control_path: Option<PathBuf>,
        data_path: Option<PathBuf>,
        work_path: Option<PathBuf>,
    ) -> AnalysisLayout {
        let analysis_path = analysis_path.into();
        AnalysisLayout {
            control_path: control_path.unwrap_or_else(|| analysis_path.join("control")),
            data_path: data_path.unwrap_or_else(|| analysis_path.join("data")),
            work_path: work_path.unwrap_or_else(|| analysis_path.join("work")),
            analysis_path,
        }
    }

    /// An existing control directory may only be reused if mka wrote it.
    pub fn check_control_dir(&self) -> Result<()> {
        if self.control_path.exists() && !self.control_path.join(COMMANDS).is_file() {
            return Err(MkaError::UnrecognizedControlDir(self.control_path.clone()).into());
        }
        Ok(())
    }

    pub fn create(&self) -> Result<()> {
        for dir in [
            &self.analysis_path,
            &self.control_path,
            &self.data_path,
            &self.work_path,
        ] {
            if let Some(created) = mkdir(dir)? {
                info!("created {}", created.display());
            }
        }
        Ok(())
    }
}

/// Everything needed to set up an analysis.
#[derive(Clone, Debug)]
pub struct NewAnalysis {
    pub name: Option<String>,
    pub description: String,
    pub analysis_type: AnalysisType,
    pub interactive: bool,
    pub files: Vec<PathBuf>,
    pub library_defaults: Option<PathBuf>,
    pub run_info: Option<PathBuf>,
    pub template_dir: Option<PathBuf>,
    pub genome: Option<String>,
    pub reference_root: PathBuf,
    pub io_limit: usize,
    pub layout: AnalysisLayout,
}

/// What `create_analysis` produced.
#[derive(Clone, Debug)]
pub struct CreatedAnalysis {
    pub libraries: LibraryMap,
    pub written: Vec<PathBuf>,
}

impl NewAnalysis {
    /// The analysis name, defaulting to the last component of the analysis path.
    pub fn name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.layout
                .analysis_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

/// Check the inputs, resolve library metadata and render the control directory.
pub fn create_analysis(req: &NewAnalysis, prompter: &mut impl Prompter) -> Result<CreatedAnalysis> {
    let files = req
        .files
        .iter()
        .map(|f| check_readable_file(f))
        .collect::<Result<Vec<_>>>()?;

    req.layout.check_control_dir()?;

    let run_info = match &req.run_info {
        Some(path) => {
            let info = RunInfo::from_path(path)?;
            if info.is_empty() {
                return Err(MkaError::MissingRunInfo(path.clone()).into());
            }
            Some(info)
        }
        None => None,
    };

    let defaults = req
        .library_defaults
        .as_deref()
        .map(LibraryDefaults::from_path)
        .transpose()?;

    let today = dates::today();
    let opts = DescribeOptions {
        analysis_type: req.analysis_type,
        interactive: req.interactive,
        defaults: defaults.as_ref(),
        run_info: run_info.as_ref(),
        genome: req.genome.as_deref(),
        today,
    };
    let libraries = describe_libraries(&files, &opts, prompter)?;

    req.layout.create()?;

    let mka = std::env::current_exe().context("locating the mka executable")?;
    let context = TemplateContext {
        name: req.name(),
        description: req.description.clone(),
        analysis_type: req.analysis_type.to_string(),
        analysis_path: display(&req.layout.analysis_path),
        control_path: display(&req.layout.control_path),
        data_path: display(&req.layout.data_path),
        work_path: display(&req.layout.work_path),
        reference_root: display(&req.reference_root),
        io_limit: req.io_limit,
        libraries: libraries.to_json()?,
        mka: display(&mka),
        version: env!("CARGO_PKG_VERSION").to_string(),
        created: today.format("%Y-%m-%d").to_string(),
    };

    let written = render_control_dir(
        &req.layout.control_path,
        req.analysis_type,
        req.template_dir.as_deref(),
        &context,
    )?;

    info!(
        "{} analysis {} is ready; run {} to write its pipeline",
        req.analysis_type,
        context.name,
        req.layout.control_path.join(COMMANDS).display()
    );
    Ok(CreatedAnalysis { libraries, written })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::prompt::LinePrompter;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::io::Cursor;

    fn silent() -> LinePrompter<Cursor<&'static str>, Vec<u8>> {
        LinePrompter::new(Cursor::new(""), Vec::new())
    }

    fn request(root: &Path, files: Vec<PathBuf>) -> NewAnalysis {
        NewAnalysis {
            name: None,
            description: "test analysis".to_string(),
            analysis_type: AnalysisType::AtacSeq,
            interactive: false,
            files,
            library_defaults: None,
            run_info: None,
            template_dir: None,
            genome: Some("hg19".to_string()),
            reference_root: PathBuf::from("/ref"),
            io_limit: DEFAULT_IO_LIMIT,
            layout: AnalysisLayout::new(root.join("liver"), None, None, None),
        }
    }

    fn fastqs(dir: &Path, names: &[&str]) -> Result<Vec<PathBuf>> {
        names
            .iter()
            .map(|n| {
                let p = dir.join(n);
                fs::write(&p, "")?;
                Ok(p)
            })
            .collect()
    }

    #[test]
    fn test_layout_defaults() {
        let l = AnalysisLayout::new("/a", None, Some(PathBuf::from("/d")), None);
        assert_eq!(l.control_path, PathBuf::from("/a/control"));
        assert_eq!(l.data_path, PathBuf::from("/d"));
        assert_eq!(l.work_path, PathBuf::from("/a/work"));
    }

    #[test]
    fn test_create_analysis() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let files = fastqs(
            tmp.path(),
            &["GSM1___SRR1___1.1.fq.gz", "GSM1___SRR1___1.2.fq.gz"],
        )?;
        let req = request(tmp.path(), files);
        let created = create_analysis(&req, &mut silent())?;

        assert_eq!(req.name(), "liver");
        assert_eq!(created.libraries.len(), 1);
        assert_eq!(created.written.len(), 2);
        assert!(req.layout.data_path.is_dir());
        assert!(req.layout.work_path.is_dir());

        let commands = fs::read_to_string(req.layout.control_path.join("commands"))?;
        assert!(commands.contains("\"SRR1\""));

        // rerunning over our own control directory is fine
        create_analysis(&req, &mut silent())?;
        Ok(())
    }

    #[test]
    fn test_symlinked_inputs_keep_their_names() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let blobs = fastqs(tmp.path(), &["blob_0001.fq.gz", "blob_0002.fq.gz"])?;
        let links = [
            tmp.path().join("GSM1___SRR1___1.1.fq.gz"),
            tmp.path().join("GSM1___SRR1___1.2.fq.gz"),
        ];
        for (blob, link) in blobs.iter().zip(&links) {
            crate::path::symlink(blob, link, false)?;
        }

        let req = request(tmp.path(), links.to_vec());
        let created = create_analysis(&req, &mut silent())?;
        let lib = created.libraries.get("SRR1").unwrap();
        assert_eq!(lib.sample, "GSM1");
        assert_eq!(
            lib.readgroups.get("1").unwrap(),
            &[display(&links[0]), display(&links[1])]
        );
        Ok(())
    }

    #[test]
    fn test_foreign_control_dir() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let files = fastqs(tmp.path(), &["S___L.1.fq.gz"])?;
        let req = request(tmp.path(), files);
        fs::create_dir_all(&req.layout.control_path)?;

        let err = create_analysis(&req, &mut silent()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MkaError>(),
            Some(MkaError::UnrecognizedControlDir(_))
        ));
        Ok(())
    }

    #[test]
    fn test_missing_input() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let req = request(tmp.path(), vec![tmp.path().join("absent.fq.gz")]);
        let err = create_analysis(&req, &mut silent()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MkaError>(),
            Some(MkaError::MissingInput(_))
        ));
        assert!(!req.layout.analysis_path.exists());
        Ok(())
    }

    #[test]
    fn test_run_info_without_samples() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let files = fastqs(tmp.path(), &["S___L.1.fq.gz"])?;
        let sheet = tmp.path().join("SampleSheet.csv");
        fs::write(&sheet, "[Header]\nDate,2020-01-15\n")?;

        let mut req = request(tmp.path(), files);
        req.run_info = Some(sheet);
        let err = create_analysis(&req, &mut silent()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MkaError>(),
            Some(MkaError::MissingRunInfo(_))
        ));
        Ok(())
    }
}
