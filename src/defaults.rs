// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Library defaults supplied as JSON.
//!
//! ```json
//! {
//!     "defaults": {"reference_genome": "hg19"},
//!     "samples": {"GSM1": {"description": "liver"}},
//!     "libraries": {"SRR1": {"sequencing_center": "NCBI"}},
//!     "files": {"GSM1___SRR1.1.fastq.gz": {"readgroup": "2"}}
//! }
//! ```
//!
//! Older files are a single flat object; it is treated as the `defaults` section.

use crate::error::MkaError;
use crate::metadata::{MetadataFields, Source};
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

const SECTIONS: &[&str] = &["defaults", "samples", "libraries", "files"];

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LibraryDefaults {
    pub global: MetadataFields,
    pub samples: BTreeMap<String, MetadataFields>,
    pub libraries: BTreeMap<String, MetadataFields>,
    pub files: BTreeMap<String, MetadataFields>,
}

impl LibraryDefaults {
    pub fn from_path(path: &Path) -> Result<LibraryDefaults> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading library defaults file {}", path.display()))?;
        let value: Value = serde_json::from_str(&text).map_err(|e| MkaError::InvalidDefaults {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        LibraryDefaults::from_value(&value).map_err(|reason| {
            MkaError::InvalidDefaults {
                path: path.to_path_buf(),
                reason,
            }
            .into()
        })
    }

    pub fn from_value(value: &Value) -> Result<LibraryDefaults, String> {
        let obj = value
            .as_object()
            .ok_or_else(|| "the top level must be a JSON object".to_string())?;

        let is_sectioned = obj.keys().any(|k| SECTIONS.contains(&k.as_str()));
        if !is_sectioned {
            return Ok(LibraryDefaults {
                global: MetadataFields::from_json_object(obj),
                ..Default::default()
            });
        }

        Ok(LibraryDefaults {
            global: section(obj, "defaults")?
                .map(MetadataFields::from_json_object)
                .unwrap_or_default(),
            samples: keyed_section(obj, "samples")?,
            libraries: keyed_section(obj, "libraries")?,
            files: keyed_section(obj, "files")?,
        })
    }

    /// The layers that apply to one file, lowest precedence first.
    pub fn layers_for(
        &self,
        sample: &str,
        library: &str,
        basename: &str,
    ) -> Vec<(Source, &MetadataFields)> {
        let mut layers = vec![(Source::GlobalDefaults, &self.global)];
        layers.extend(self.samples.get(sample).map(|f| (Source::SampleDefaults, f)));
        layers.extend(self.libraries.get(library).map(|f| (Source::LibraryDefaults, f)));
        layers.extend(self.files.get(basename).map(|f| (Source::FileDefaults, f)));
        layers
    }
}

fn section<'a>(
    obj: &'a Map<String, Value>,
    name: &str,
) -> Result<Option<&'a Map<String, Value>>, String> {
    match obj.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(m)) => Ok(Some(m)),
        Some(_) => Err(format!("\"{name}\" must be an object")),
    }
}

fn keyed_section(
    obj: &Map<String, Value>,
    name: &str,
) -> Result<BTreeMap<String, MetadataFields>, String> {
    let mut res = BTreeMap::new();
    if let Some(m) = section(obj, name)? {
        for (key, v) in m {
            let entry = v
                .as_object()
                .ok_or_else(|| format!("\"{name}\".\"{key}\" must be an object"))?;
            res.insert(key.clone(), MetadataFields::from_json_object(entry));
        }
    }
    Ok(res)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_sectioned() {
        let v = json!({
            "defaults": {"genome": "hg19"},
            "samples": {"S1": {"description": "liver"}},
            "libraries": {"L1": {"center": "core"}},
            "files": {"S1___L1.1.fq.gz": {"readgroup": "7"}},
        });
        let d = LibraryDefaults::from_value(&v).unwrap();
        assert_eq!(d.global.reference_genome, "hg19");
        assert_eq!(d.samples["S1"].description, "liver");
        assert_eq!(d.libraries["L1"].sequencing_center, "core");

        let layers = d.layers_for("S1", "L1", "S1___L1.1.fq.gz");
        assert_eq!(layers.len(), 4);
        assert_eq!(layers[3].0, Source::FileDefaults);
        assert_eq!(layers[3].1.readgroup, "7");
        assert_eq!(d.layers_for("S2", "L2", "x").len(), 1);
    }

    #[test]
    fn test_legacy_flat() {
        let v = json!({"reference_genome": "mm9", "sequencing_platform": "ILLUMINA"});
        let d = LibraryDefaults::from_value(&v).unwrap();
        assert_eq!(d.global.reference_genome, "mm9");
        assert!(d.samples.is_empty());
    }

    #[test]
    fn test_invalid() {
        assert!(LibraryDefaults::from_value(&json!([1, 2])).is_err());
        assert!(LibraryDefaults::from_value(&json!({"samples": "nope"})).is_err());
        assert!(LibraryDefaults::from_value(&json!({"samples": {"S1": 3}})).is_err());
    }

    #[test]
    fn test_from_path_reports_bad_json() -> Result<()> {
        let mut f = tempfile::NamedTempFile::new()?;
        f.write_all(b"{not json")?;
        let err = LibraryDefaults::from_path(f.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MkaError>(),
            Some(MkaError::InvalidDefaults { .. })
        ));
        Ok(())
    }
}
