//! A single layer of library metadata.

use crate::filenames::FilenameFields;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Placement and descriptive fields, in the order they are prompted for and reported.
pub const FIELD_NAMES: &[&str] = &[
    "sample",
    "library",
    "readgroup",
    "pair_index",
    "reference_genome",
    "description",
    "url",
    "sequencing_center",
    "sequencing_date",
    "sequencing_platform",
    "sequencing_platform_model",
];

/// Alternative spellings accepted in library defaults files.
const FIELD_ALIASES: &[(&str, &str)] = &[
    ("genome", "reference_genome"),
    ("reference", "reference_genome"),
    ("read_group", "readgroup"),
    ("pair", "pair_index"),
    ("center", "sequencing_center"),
    ("date", "sequencing_date"),
    ("platform", "sequencing_platform"),
    ("platform_model", "sequencing_platform_model"),
    ("model", "sequencing_platform_model"),
];

/// Key holding analysis-specific options as a nested object.
const OPTIONS_KEY: &str = "analysis_options";

/// Where a value came from, lowest precedence first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Source {
    /// Filled in because nothing else supplied a value.
    Fallback,
    Genome,
    RunInfo,
    GlobalDefaults,
    SampleDefaults,
    LibraryDefaults,
    FileDefaults,
    Filename,
    Answer,
}

/// The source of each field and analysis option of a record. A missing entry
/// ranks as [`Source::Fallback`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldSources {
    fields: BTreeMap<&'static str, Source>,
    options: BTreeMap<String, Source>,
}

impl FieldSources {
    pub fn field(&self, name: &str) -> Source {
        self.fields.get(name).copied().unwrap_or(Source::Fallback)
    }

    pub fn option(&self, name: &str) -> Source {
        self.options.get(name).copied().unwrap_or(Source::Fallback)
    }

    pub fn set_field(&mut self, name: &'static str, source: Source) {
        self.fields.insert(name, source);
    }

    pub fn set_option(&mut self, name: &str, source: Source) {
        self.options.insert(name.to_string(), source);
    }
}

/// Metadata contributed by one source. An empty string means the source has
/// nothing to say about that field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetadataFields {
    pub sample: String,
    pub library: String,
    pub readgroup: String,
    pub pair_index: String,
    pub reference_genome: String,
    pub description: String,
    pub url: String,
    pub sequencing_center: String,
    pub sequencing_date: String,
    pub sequencing_platform: String,
    pub sequencing_platform_model: String,
    pub analysis_options: BTreeMap<String, String>,
}

impl MetadataFields {
    pub fn get(&self, name: &str) -> Option<&str> {
        let v = match name {
            "sample" => &self.sample,
            "library" => &self.library,
            "readgroup" => &self.readgroup,
            "pair_index" => &self.pair_index,
            "reference_genome" => &self.reference_genome,
            "description" => &self.description,
            "url" => &self.url,
            "sequencing_center" => &self.sequencing_center,
            "sequencing_date" => &self.sequencing_date,
            "sequencing_platform" => &self.sequencing_platform,
            "sequencing_platform_model" => &self.sequencing_platform_model,
            _ => return None,
        };
        Some(v.as_str())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut String> {
        let v = match name {
            "sample" => &mut self.sample,
            "library" => &mut self.library,
            "readgroup" => &mut self.readgroup,
            "pair_index" => &mut self.pair_index,
            "reference_genome" => &mut self.reference_genome,
            "description" => &mut self.description,
            "url" => &mut self.url,
            "sequencing_center" => &mut self.sequencing_center,
            "sequencing_date" => &mut self.sequencing_date,
            "sequencing_platform" => &mut self.sequencing_platform,
            "sequencing_platform_model" => &mut self.sequencing_platform_model,
            _ => return None,
        };
        Some(v)
    }

    /// Copy every non-empty value of `other` over `self`, recording `source`
    /// for each one taken.
    pub fn overlay(&mut self, other: &MetadataFields, source: Source, sources: &mut FieldSources) {
        for name in FIELD_NAMES {
            let value = other.get(name).unwrap_or_default();
            if !value.is_empty() {
                if let Some(slot) = self.get_mut(name) {
                    *slot = value.to_string();
                    sources.set_field(name, source);
                }
            }
        }
        for (option, value) in &other.analysis_options {
            if !value.is_empty() {
                self.analysis_options.insert(option.clone(), value.clone());
                sources.set_option(option, source);
            }
        }
    }

    /// Build a layer from a defaults-file object. Known keys (and their
    /// aliases) fill fields. Anything else is an analysis option.
    pub fn from_json_object(obj: &Map<String, Value>) -> MetadataFields {
        let mut fields = MetadataFields::default();
        for (key, value) in obj {
            if key == OPTIONS_KEY {
                if let Value::Object(options) = value {
                    for (option, v) in options {
                        fields.analysis_options.insert(option.clone(), json_scalar(v));
                    }
                }
                continue;
            }

            let canonical = FIELD_ALIASES
                .iter()
                .find(|(alias, _)| *alias == key.as_str())
                .map_or(key.as_str(), |(_, name)| *name);

            match fields.get_mut(canonical) {
                Some(slot) => *slot = json_scalar(value),
                None => {
                    fields.analysis_options.insert(key.clone(), json_scalar(value));
                }
            }
        }
        fields
    }
}

impl From<&FilenameFields> for MetadataFields {
    fn from(parsed: &FilenameFields) -> Self {
        MetadataFields {
            sample: parsed.sample.clone(),
            library: parsed.library.clone(),
            readgroup: parsed.readgroup.clone(),
            pair_index: parsed.pair_index.clone(),
            description: parsed.description.clone(),
            ..Default::default()
        }
    }
}

/// Scalars become their text, null becomes empty, and anything nested is kept as JSON.
fn json_scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_overlay_skips_empty() {
        let mut base = MetadataFields {
            sample: "S1".to_string(),
            description: "from run info".to_string(),
            ..Default::default()
        };
        let layer = MetadataFields {
            description: "from defaults".to_string(),
            url: String::new(),
            ..Default::default()
        };
        let mut sources = FieldSources::default();
        base.overlay(&layer, Source::GlobalDefaults, &mut sources);
        assert_eq!(base.sample, "S1");
        assert_eq!(base.description, "from defaults");
        assert_eq!(base.url, "");
        assert_eq!(sources.field("description"), Source::GlobalDefaults);
        assert_eq!(sources.field("url"), Source::Fallback);
    }

    #[test]
    fn test_source_order() {
        assert!(Source::Fallback < Source::Genome);
        assert!(Source::RunInfo < Source::GlobalDefaults);
        assert!(Source::SampleDefaults < Source::LibraryDefaults);
        assert!(Source::FileDefaults < Source::Filename);
        assert!(Source::Filename < Source::Answer);
    }

    #[test]
    fn test_from_json_object() {
        let obj = json!({
            "genome": "hg19",
            "readgroup": 2,
            "platform": "illumina",
            "peak_mode": "narrow",
            "analysis_options": {"mapq": 20},
            "url": null,
        });
        let fields = MetadataFields::from_json_object(obj.as_object().unwrap());
        assert_eq!(fields.reference_genome, "hg19");
        assert_eq!(fields.readgroup, "2");
        assert_eq!(fields.sequencing_platform, "illumina");
        assert_eq!(fields.url, "");
        assert_eq!(fields.analysis_options["peak_mode"], "narrow");
        assert_eq!(fields.analysis_options["mapq"], "20");
    }
}
