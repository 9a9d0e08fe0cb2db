// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Read the run info (sample sheet) exported by a sequencing core.
//!
//! The file is a block of `Key,Value` header lines followed by a `[Data]`
//! section holding a regular CSV table with one row per sample:
//!
//! ```text
//! [Header]
//! Date,1/15/2020
//! Application,HiSeq FASTQ Only
//! [Data]
//! Sample_ID,Sample_Name,Description
//! Sample_42,lib42,liver
//! ```

use crate::dates;
use crate::metadata::MetadataFields;
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use csv::StringRecord;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::path::Path;

const DATA_SECTION: &str = "[Data]";
const SAMPLE_ID_PREFIX: &str = "Sample_";
const SAMPLE_ID_COL: &str = "Sample_ID";
const SAMPLE_NAME_COL: &str = "Sample_Name";
const DESCRIPTION_COL: &str = "Description";

pub const ILLUMINA_PLATFORM: &str = "ILLUMINA";

/// Instrument families named in the `Application` header of Illumina sample sheets.
const ILLUMINA_FAMILIES: &[&str] = &["HiSeq", "MiSeq", "NextSeq", "NovaSeq", "MiniSeq", "iSeq"];

/// What the sample sheet says about one sample.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunInfoRecord {
    pub sample: String,
    pub library: String,
    pub description: String,
    pub sequencing_center: String,
    pub sequencing_date: String,
    pub sequencing_platform: String,
    pub sequencing_platform_model: String,
}

impl RunInfoRecord {
    pub fn to_fields(&self) -> MetadataFields {
        MetadataFields {
            sample: self.sample.clone(),
            library: self.library.clone(),
            description: self.description.clone(),
            sequencing_center: self.sequencing_center.clone(),
            sequencing_date: self.sequencing_date.clone(),
            sequencing_platform: self.sequencing_platform.clone(),
            sequencing_platform_model: self.sequencing_platform_model.clone(),
            ..Default::default()
        }
    }
}

/// Run-wide fields taken from the header block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct RunHeader {
    center: String,
    date: String,
    platform: String,
    platform_model: String,
}

/// Sample sheet records keyed by sample id (without the `Sample_` prefix).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunInfo {
    records: BTreeMap<String, RunInfoRecord>,
}

impl RunInfo {
    /// Read a run info file. A file with no `[Data]` section yields an empty
    /// `RunInfo`, so check `is_empty()` when the run info is required.
    pub fn from_path(path: &Path) -> Result<RunInfo> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading run info file {}", path.display()))?;
        let info = RunInfo::parse_str(&text, dates::today())
            .with_context(|| format!("parsing run info file {}", path.display()))?;
        if info.is_empty() {
            warn!("no samples found in run info file {}", path.display());
        }
        Ok(info)
    }

    pub fn parse_str(text: &str, today: NaiveDate) -> Result<RunInfo> {
        let mut header_lines = Vec::new();
        let mut data = None;
        let mut offset = 0;
        for line in text.split_inclusive('\n') {
            if line.starts_with(DATA_SECTION) {
                data = Some(&text[offset + line.len()..]);
                break;
            }
            header_lines.push(line);
            offset += line.len();
        }

        let data = match data {
            Some(d) => d,
            None => return Ok(RunInfo::default()),
        };

        let header = parse_header(&header_lines.concat(), today)?;

        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(data.as_bytes());
        let headers = rdr.headers()?.clone();
        let col = |name: &str| headers.iter().position(|h| h == name);

        let sample_col = match col(SAMPLE_ID_COL) {
            Some(c) => c,
            None => bail!("the [Data] section has no {SAMPLE_ID_COL} column"),
        };
        let name_col = col(SAMPLE_NAME_COL);
        let description_col = col(DESCRIPTION_COL);

        let mut records = BTreeMap::new();
        for row in rdr.records() {
            let row = row?;
            let raw_id = cell(&row, Some(sample_col));
            if raw_id.is_empty() {
                continue;
            }
            let sample = raw_id.strip_prefix(SAMPLE_ID_PREFIX).unwrap_or(raw_id);
            let library = match cell(&row, name_col) {
                "" => sample,
                name => name,
            };

            let record = RunInfoRecord {
                sample: sample.to_string(),
                library: library.to_string(),
                description: cell(&row, description_col).to_string(),
                sequencing_center: header.center.clone(),
                sequencing_date: header.date.clone(),
                sequencing_platform: header.platform.clone(),
                sequencing_platform_model: header.platform_model.clone(),
            };
            debug!("run info for sample {}: {:?}", sample, record);
            records.insert(sample.to_string(), record);
        }

        Ok(RunInfo { records })
    }

    pub fn get(&self, sample: &str) -> Option<&RunInfoRecord> {
        self.records.get(sample)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn cell(row: &StringRecord, col: Option<usize>) -> &str {
    col.and_then(|c| row.get(c)).unwrap_or("")
}

/// Everything after the key. Unquoted values like `Jan 15, 2020` span several
/// cells, and sheets pad rows with empty ones.
fn header_value(row: &StringRecord) -> String {
    let cells: Vec<&str> = row.iter().skip(1).collect();
    let end = cells.iter().rposition(|c| !c.is_empty()).map_or(0, |i| i + 1);
    cells[..end].join(", ")
}

fn parse_header(text: &str, today: NaiveDate) -> Result<RunHeader> {
    let mut header = RunHeader::default();
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    for row in rdr.records() {
        let row = row?;
        let key = cell(&row, Some(0));
        let value = header_value(&row);
        let value = value.as_str();
        match key {
            "Date" => {
                // unparseable dates are kept verbatim and rejected during resolution
                header.date = dates::normalize_date(value, today).unwrap_or_else(|| value.to_string());
            }
            "Application" => {
                if let Some(family) = ILLUMINA_FAMILIES.iter().find(|f| value.contains(**f)) {
                    header.platform = ILLUMINA_PLATFORM.to_string();
                    header.platform_model = family.to_string();
                }
            }
            "Center" => header.center = value.to_string(),
            _ => {}
        }
    }
    Ok(header)
}
