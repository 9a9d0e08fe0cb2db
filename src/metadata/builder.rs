//! Resolution of one input file's metadata, one source at a time.

use super::fields::{FieldSources, MetadataFields, Source};
use super::LibraryMetadata;
use crate::analysis::AnalysisType;
use crate::dates;
use crate::error::MkaError;
use crate::filenames::DEFAULT_READGROUP;
use crate::prompt::Prompter;
use anyhow::Result;
use chrono::NaiveDate;
use log::warn;
use std::path::PathBuf;

const SRA_QUERY_URL: &str = "https://www.ncbi.nlm.nih.gov/sra?term=";
const GEO_QUERY_URL: &str = "https://www.ncbi.nlm.nih.gov/geo/query/acc.cgi?acc=";

/// Accession prefixes and the archive each belongs to.
const ACCESSION_URLS: &[(&str, &str)] = &[
    ("SRR", SRA_QUERY_URL),
    ("SRX", SRA_QUERY_URL),
    ("SRS", SRA_QUERY_URL),
    ("SRP", SRA_QUERY_URL),
    ("ERR", SRA_QUERY_URL),
    ("ERX", SRA_QUERY_URL),
    ("DRR", SRA_QUERY_URL),
    ("DRX", SRA_QUERY_URL),
    ("GSM", GEO_QUERY_URL),
    ("GSE", GEO_QUERY_URL),
];

/// Archive URL for an accession-style identifier like `SRR1234` or `GSM5678`.
pub fn accession_url(id: &str) -> Option<String> {
    let prefix = id.get(0..3)?;
    ACCESSION_URLS
        .iter()
        .find(|(p, _)| *p == prefix)
        .map(|(_, base)| format!("{base}{id}"))
}

/// A file's metadata after every source has been applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedFile {
    pub file: String,
    pub readgroup: String,
    pub pair_index: String,
    pub record: LibraryMetadata,
    pub sources: FieldSources,
}

/// Metadata for a single input file, built up by consuming each source in
/// ascending precedence. Every step takes the builder by value and hands it back.
#[derive(Clone, Debug)]
pub struct MetadataBuilder {
    file: PathBuf,
    fields: MetadataFields,
    sources: FieldSources,
}

impl MetadataBuilder {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        MetadataBuilder {
            file: file.into(),
            fields: MetadataFields::default(),
            sources: FieldSources::default(),
        }
    }

    fn file_label(&self) -> String {
        self.file.display().to_string()
    }

    /// Ask for one field. A changed answer is recorded as typed by the user.
    fn ask_field(
        &mut self,
        name: &'static str,
        question: &str,
        prompter: &mut impl Prompter,
    ) -> Result<()> {
        let current = self.fields.get(name).unwrap_or_default().to_string();
        let answer = prompter.ask(question, &current)?;
        if answer != current {
            if let Some(slot) = self.fields.get_mut(name) {
                *slot = answer;
                self.sources.set_field(name, Source::Answer);
            }
        }
        Ok(())
    }

    /// Apply a source: its non-empty values replace the current ones.
    pub fn layer(mut self, source: Source, fields: &MetadataFields) -> Self {
        self.fields.overlay(fields, source, &mut self.sources);
        self
    }

    /// Confirm or correct where the file belongs.
    pub fn prompt_placement(mut self, prompter: &mut impl Prompter) -> Result<Self> {
        if self.fields.readgroup.is_empty() {
            self.fields.readgroup = DEFAULT_READGROUP.to_string();
        }
        self.ask_field("sample", "Sample", prompter)?;
        self.ask_field("library", "Library", prompter)?;
        self.ask_field("readgroup", "Read group", prompter)?;
        self.ask_field(
            "pair_index",
            "Pair index (1 or 2, blank if single-end)",
            prompter,
        )?;
        self.ask_field("reference_genome", "Reference genome", prompter)?;
        Ok(self)
    }

    /// There is no default reference genome: ask until one is given.
    pub fn require_genome(mut self, prompter: &mut impl Prompter) -> Result<Self> {
        while self.fields.reference_genome.trim().is_empty() {
            let question = format!("Reference genome for {}", self.file_label());
            self.fields.reference_genome = prompter.ask(&question, "")?;
            self.sources.set_field("reference_genome", Source::Answer);
        }
        Ok(self)
    }

    /// Point the URL at the archive the library (or else the sample) came from,
    /// unless a URL is already set.
    pub fn derive_url(mut self) -> Self {
        if self.fields.url.is_empty() {
            let derived = accession_url(&self.fields.library)
                .or_else(|| accession_url(&self.fields.sample));
            if let Some(url) = derived {
                self.fields.url = url;
                self.sources.set_field("url", Source::Fallback);
            }
        }
        self
    }

    /// Ask for the descriptive fields and the analysis options.
    pub fn prompt_details(
        mut self,
        analysis_type: AnalysisType,
        prompter: &mut impl Prompter,
    ) -> Result<Self> {
        self.ask_field("description", "Description", prompter)?;
        self.ask_field("url", "URL", prompter)?;
        self.ask_field("sequencing_platform", "Sequencing platform", prompter)?;
        self.fields.sequencing_platform = self.fields.sequencing_platform.to_uppercase();
        self.ask_field("sequencing_center", "Sequencing center", prompter)?;
        self.ask_field("sequencing_date", "Sequencing date", prompter)?;

        for option in analysis_type.options() {
            let current = self
                .fields
                .analysis_options
                .get(option.name)
                .map_or(option.default, |v| v.as_str())
                .to_string();
            let answer = prompter.ask_option(option, &current)?;
            if answer != current {
                self.sources.set_option(option.name, Source::Answer);
            }
            self.fields
                .analysis_options
                .insert(option.name.to_string(), answer);
        }
        Ok(self)
    }

    /// Fill analysis options no source has set, and check the ones that were.
    /// An invalid value is re-asked when interactive and an error otherwise.
    pub fn settle_options(
        mut self,
        analysis_type: AnalysisType,
        interactive: bool,
        prompter: &mut impl Prompter,
    ) -> Result<Self> {
        for option in analysis_type.options() {
            let value = self
                .fields
                .analysis_options
                .entry(option.name.to_string())
                .or_insert_with(|| option.default.to_string());
            if option.accepts(value.as_str()) {
                continue;
            }
            let err = MkaError::InvalidChoice {
                option: option.name.to_string(),
                value: value.clone(),
                expected: option.expected(),
            };
            if !interactive {
                return Err(err.into());
            }
            warn!("{err}");
            *value = prompter.ask_option(option, option.default)?;
            self.sources.set_option(option.name, Source::Answer);
        }
        Ok(self)
    }

    /// Normalise the sequencing date to `YYYY-MM-DD`. An unparseable date is
    /// re-asked when interactive (a blank answer clears it) and an error otherwise.
    pub fn normalize_date(
        mut self,
        interactive: bool,
        today: NaiveDate,
        prompter: &mut impl Prompter,
    ) -> Result<Self> {
        while !self.fields.sequencing_date.is_empty() {
            if let Some(date) = dates::normalize_date(&self.fields.sequencing_date, today) {
                self.fields.sequencing_date = date;
                break;
            }
            let err = MkaError::UnparseableDate {
                file: self.file_label(),
                value: self.fields.sequencing_date.clone(),
            };
            if !interactive {
                return Err(err.into());
            }
            warn!("{err}");
            self.fields.sequencing_date = prompter.ask("Sequencing date (YYYY-MM-DD)", "")?;
            self.sources.set_field("sequencing_date", Source::Answer);
        }
        Ok(self)
    }

    /// Check the mandatory fields and split off the file's read group placement.
    pub fn finish(self) -> Result<ResolvedFile> {
        let file = self.file_label();
        let f = self.fields;
        for (field, value) in [
            ("sample", &f.sample),
            ("library", &f.library),
            ("reference genome", &f.reference_genome),
        ] {
            if value.trim().is_empty() {
                return Err(MkaError::MissingField { file, field }.into());
            }
        }

        let readgroup = if f.readgroup.is_empty() {
            DEFAULT_READGROUP.to_string()
        } else {
            f.readgroup
        };

        let record = LibraryMetadata {
            sample: f.sample,
            library: f.library,
            reference_genome: f.reference_genome,
            description: f.description,
            url: f.url,
            sequencing_center: f.sequencing_center,
            sequencing_date: f.sequencing_date,
            sequencing_platform: f.sequencing_platform.to_uppercase(),
            sequencing_platform_model: f.sequencing_platform_model,
            analysis_options: f.analysis_options,
            readgroups: Default::default(),
        };

        Ok(ResolvedFile {
            file,
            readgroup,
            pair_index: f.pair_index,
            record,
            sources: self.sources,
        })
    }
}
