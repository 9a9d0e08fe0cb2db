// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Resolve per-library metadata for a set of FASTQ files.
//!
//! Each file's record is assembled from the run info, the library defaults,
//! the filename and, optionally, answers typed at the terminal, in that order
//! of increasing precedence. Files are then grouped by library, and each
//! library keeps an ordered list of files per read group.

mod builder;
mod fields;

pub use builder::{accession_url, MetadataBuilder, ResolvedFile};
pub use fields::{FieldSources, MetadataFields, Source, FIELD_NAMES};

use crate::analysis::AnalysisType;
use crate::defaults::LibraryDefaults;
use crate::error::MkaError;
use crate::filenames::FilenameFields;
use crate::prompt::Prompter;
use crate::run_info::RunInfo;
use anyhow::Result;
use chrono::NaiveDate;
use itertools::Itertools;
use log::{debug, error, info, warn};
use serde_derive::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Read group id to the files holding its reads, in the order they were given.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct ReadGroupFileSet(BTreeMap<String, Vec<String>>);

impl ReadGroupFileSet {
    pub fn push(&mut self, readgroup: &str, file: String) {
        self.0.entry(readgroup.to_string()).or_default().push(file);
    }

    pub fn get(&self, readgroup: &str) -> Option<&[String]> {
        self.0.get(readgroup).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    /// All files of every read group.
    pub fn files(&self) -> impl Iterator<Item = &String> {
        self.0.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything known about one library.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct LibraryMetadata {
    pub sample: String,
    pub library: String,
    pub reference_genome: String,
    pub description: String,
    pub url: String,
    pub sequencing_center: String,
    pub sequencing_date: String,
    pub sequencing_platform: String,
    pub sequencing_platform_model: String,
    pub analysis_options: BTreeMap<String, String>,
    pub readgroups: ReadGroupFileSet,
}

impl LibraryMetadata {
    /// Take the values of another record for the same library that come from
    /// a source at least as strong as the one behind the current value.
    fn absorb(
        &mut self,
        other: &LibraryMetadata,
        mine: &mut FieldSources,
        theirs: &FieldSources,
    ) {
        let pairs = [
            ("reference_genome", &mut self.reference_genome, &other.reference_genome),
            ("description", &mut self.description, &other.description),
            ("url", &mut self.url, &other.url),
            ("sequencing_center", &mut self.sequencing_center, &other.sequencing_center),
            ("sequencing_date", &mut self.sequencing_date, &other.sequencing_date),
            (
                "sequencing_platform",
                &mut self.sequencing_platform,
                &other.sequencing_platform,
            ),
            (
                "sequencing_platform_model",
                &mut self.sequencing_platform_model,
                &other.sequencing_platform_model,
            ),
        ];
        for (name, value, incoming) in pairs {
            let source = theirs.field(name);
            if !incoming.is_empty() && (value.is_empty() || source >= mine.field(name)) {
                value.clone_from(incoming);
                mine.set_field(name, source);
            }
        }
        for (k, v) in &other.analysis_options {
            let source = theirs.option(k);
            if !v.is_empty() && source >= mine.option(k) {
                self.analysis_options.insert(k.clone(), v.clone());
                mine.set_option(k, source);
            }
        }
    }

    pub fn option(&self, name: &str) -> Option<&str> {
        self.analysis_options.get(name).map(String::as_str)
    }
}

/// Library id to its resolved metadata. While files are being added, the
/// source of every library value is kept alongside.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(transparent)]
pub struct LibraryMap {
    libraries: BTreeMap<String, LibraryMetadata>,
    #[serde(skip)]
    sources: BTreeMap<String, FieldSources>,
}

impl PartialEq for LibraryMap {
    fn eq(&self, other: &LibraryMap) -> bool {
        self.libraries == other.libraries
    }
}

impl Eq for LibraryMap {}

impl LibraryMap {
    /// Add one resolved file, creating or updating its library.
    pub fn insert(&mut self, resolved: ResolvedFile) -> Result<()> {
        let ResolvedFile {
            file,
            readgroup,
            record,
            sources,
            ..
        } = resolved;

        match self.libraries.entry(record.library.clone()) {
            Entry::Occupied(mut e) => {
                let existing = e.get_mut();
                if existing.sample != record.sample {
                    error!(
                        "conflicting records for library {}:\n{}\n{}",
                        record.library,
                        serde_json::to_string_pretty(existing).unwrap_or_default(),
                        serde_json::to_string_pretty(&record).unwrap_or_default(),
                    );
                    return Err(MkaError::LibraryConflict {
                        library: record.library,
                        existing_sample: existing.sample.clone(),
                        new_sample: record.sample,
                    }
                    .into());
                }
                if existing.readgroups.files().any(|f| *f == file) {
                    return Err(MkaError::DuplicateInput(PathBuf::from(file)).into());
                }
                let mine = self.sources.entry(record.library.clone()).or_default();
                existing.absorb(&record, mine, &sources);
                existing.readgroups.push(&readgroup, file);
            }
            Entry::Vacant(e) => {
                let mut record = record;
                record.readgroups.push(&readgroup, file);
                self.sources.insert(record.library.clone(), sources);
                e.insert(record);
            }
        }
        Ok(())
    }

    pub fn get(&self, library: &str) -> Option<&LibraryMetadata> {
        self.libraries.get(library)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &LibraryMetadata)> {
        self.libraries.iter()
    }

    /// Libraries grouped under their sample id.
    pub fn samples(&self) -> BTreeMap<&str, Vec<&LibraryMetadata>> {
        let mut res: BTreeMap<&str, Vec<&LibraryMetadata>> = BTreeMap::new();
        for lib in self.libraries.values() {
            res.entry(lib.sample.as_str()).or_default().push(lib);
        }
        res
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    /// Pretty JSON with every object's keys sorted, so regenerated output diffs cleanly.
    pub fn to_json(&self) -> Result<String> {
        let value = serde_json::to_value(self)?;
        Ok(serde_json::to_string_pretty(&value)?)
    }

    pub fn from_json(text: &str) -> Result<LibraryMap> {
        serde_json::from_str(text).map_err(|e| MkaError::InvalidLibraryMap(e.to_string()).into())
    }
}

/// Everything `describe_libraries` needs besides the files themselves.
#[derive(Clone, Copy, Debug)]
pub struct DescribeOptions<'a> {
    pub analysis_type: AnalysisType,
    pub interactive: bool,
    pub defaults: Option<&'a LibraryDefaults>,
    pub run_info: Option<&'a RunInfo>,
    /// Reference genome used when no other source names one.
    pub genome: Option<&'a str>,
    pub today: NaiveDate,
}

/// Resolve the metadata of every file, in order, and group the files by library.
pub fn describe_libraries(
    files: &[PathBuf],
    opts: &DescribeOptions<'_>,
    prompter: &mut impl Prompter,
) -> Result<LibraryMap> {
    if let Some(dup) = files.iter().duplicates().next() {
        return Err(MkaError::DuplicateInput(dup.clone()).into());
    }

    let mut libraries = LibraryMap::default();

    for file in files {
        let resolved = describe_file(file, opts, prompter)?;
        debug!(
            "{}: library {} sample {} read group {} pair {:?}",
            resolved.file,
            resolved.record.library,
            resolved.record.sample,
            resolved.readgroup,
            resolved.pair_index,
        );
        libraries.insert(resolved)?;
    }

    info!(
        "described {} libraries from {} files",
        libraries.len(),
        files.len()
    );
    Ok(libraries)
}

fn describe_file(
    file: &Path,
    opts: &DescribeOptions<'_>,
    prompter: &mut impl Prompter,
) -> Result<ResolvedFile> {
    let basename = file
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parsed = FilenameFields::parse(file);
    if !parsed.is_match() {
        warn!(
            "{basename} does not follow the sample___library___readgroup___description naming convention"
        );
    }

    let mut builder = MetadataBuilder::new(file);

    if let Some(genome) = opts.genome {
        let fields = MetadataFields {
            reference_genome: genome.to_string(),
            ..Default::default()
        };
        builder = builder.layer(Source::Genome, &fields);
    }

    if let Some(record) = opts.run_info.and_then(|ri| ri.get(&parsed.sample)) {
        builder = builder.layer(Source::RunInfo, &record.to_fields());
    }

    if let Some(defaults) = opts.defaults {
        for (source, layer) in defaults.layers_for(&parsed.sample, &parsed.library, &basename) {
            builder = builder.layer(source, layer);
        }
    }

    builder = builder.layer(Source::Filename, &MetadataFields::from(&parsed));

    if opts.interactive {
        info!("describing {}", file.display());
        builder = builder.prompt_placement(prompter)?;
    }

    builder = builder.require_genome(prompter)?.derive_url();

    if opts.interactive {
        builder = builder.prompt_details(opts.analysis_type, prompter)?;
    }

    builder
        .settle_options(opts.analysis_type, opts.interactive, prompter)?
        .normalize_date(opts.interactive, opts.today, prompter)?
        .finish()
}
