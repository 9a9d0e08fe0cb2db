use lazy_static::lazy_static;
use regex::Regex;
use serde_derive::{Deserialize, Serialize};
use std::path::Path;

/// Read group assigned to files whose name does not carry one.
pub const DEFAULT_READGROUP: &str = "1";

/// Separator between the components of a conventional filename.
pub const FIELD_SEPARATOR: &str = "___";

lazy_static! {
    static ref LIBRARY_FASTQ_REGEX: Regex = Regex::new(
        r"^(?P<sample>[^.].*?)___(?P<library>[^.].*?)(?:___(?P<readgroup>[^.].*?))?(?:___(?P<description>[^.].*?))?(?:___)?(?:\.(?P<pair>\d+))?\.(?:fastq|fq)(?:\.gz)?$"
    )
    .unwrap();
}

/// Metadata encoded in a FASTQ filename of the form
/// `sample___library___[readgroup___][description___].<pair>.fastq.gz`.
///
/// Every field is empty when the name does not follow the convention.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct FilenameFields {
    pub sample: String,
    pub library: String,
    pub readgroup: String,
    pub description: String,
    pub pair_index: String,
}

impl FilenameFields {
    /// Parse the basename of `path`. Readgroup defaults to `1` and `%20` in
    /// the description is decoded to a space.
    pub fn parse(path: impl AsRef<Path>) -> FilenameFields {
        let filename = match path.as_ref().file_name().and_then(|f| f.to_str()) {
            Some(f) => f,
            None => return FilenameFields::default(),
        };

        let cap = match LIBRARY_FASTQ_REGEX.captures(filename) {
            Some(cap) => cap,
            None => return FilenameFields::default(),
        };

        let field = |name: &str| cap.name(name).map_or("", |m| m.as_str());

        // a component swallowing a separator means the name has too many parts
        if ["sample", "library", "readgroup", "description"]
            .iter()
            .any(|name| field(name).contains(FIELD_SEPARATOR))
        {
            return FilenameFields::default();
        }

        let readgroup = match field("readgroup") {
            "" => DEFAULT_READGROUP,
            rg => rg,
        };

        FilenameFields {
            sample: field("sample").to_string(),
            library: field("library").to_string(),
            readgroup: readgroup.to_string(),
            description: field("description").replace("%20", " "),
            pair_index: field("pair").to_string(),
        }
    }

    /// True if the filename followed the convention.
    pub fn is_match(&self) -> bool {
        !self.sample.is_empty() && !self.library.is_empty()
    }

    /// True if the file is one end of a paired-end read group.
    pub fn is_paired(&self) -> bool {
        !self.pair_index.is_empty()
    }

    /// Build a conventional filename carrying these fields, ending in `extension`
    /// (e.g. `fastq.gz`).
    pub fn to_filename(&self, extension: &str) -> String {
        let mut parts = vec![self.sample.as_str(), self.library.as_str()];
        let description = self.description.replace(' ', "%20");
        if !self.readgroup.is_empty() || !description.is_empty() {
            parts.push(if self.readgroup.is_empty() {
                DEFAULT_READGROUP
            } else {
                self.readgroup.as_str()
            });
        }
        if !description.is_empty() {
            parts.push(description.as_str());
        }

        let mut name = parts.join(FIELD_SEPARATOR);
        if self.is_paired() {
            name.push('.');
            name.push_str(&self.pair_index);
        }
        name.push('.');
        name.push_str(extension);
        name
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_parse_full() {
        let r = FilenameFields::parse("/data/GSM1___SRR1___2___ATAC%20rep1.1.fastq.gz");
        let expected = FilenameFields {
            sample: "GSM1".to_string(),
            library: "SRR1".to_string(),
            readgroup: "2".to_string(),
            description: "ATAC rep1".to_string(),
            pair_index: "1".to_string(),
        };
        assert_eq!(r, expected);
        assert!(r.is_match());
        assert!(r.is_paired());
    }

    #[test]
    fn test_parse_default_readgroup() {
        let r = FilenameFields::parse("liver_1___lib_7.2.fq.gz");
        assert_eq!(r.sample, "liver_1");
        assert_eq!(r.library, "lib_7");
        assert_eq!(r.readgroup, DEFAULT_READGROUP);
        assert_eq!(r.description, "");
        assert_eq!(r.pair_index, "2");
    }

    #[test]
    fn test_parse_single_end() {
        let r = FilenameFields::parse("s1___l1___3.fastq");
        assert_eq!(r.readgroup, "3");
        assert_eq!(r.pair_index, "");
        assert!(!r.is_paired());
    }

    #[test]
    fn test_parse_trailing_separator() {
        let a = FilenameFields::parse("s1___l1___1___desc___.1.fastq.gz");
        let b = FilenameFields::parse("s1___l1___1___desc.1.fastq.gz");
        assert_eq!(a, b);
        assert_eq!(a.description, "desc");
    }

    #[test]
    fn test_bad() {
        for name in [
            "heart_1k_v3_S1_L002_R2_001.fastq.gz",
            "s1___l1.1.bam",
            "s1___.1.fastq.gz",
            "a___b___c___d___e.1.fastq.gz",
        ] {
            assert_eq!(FilenameFields::parse(name), FilenameFields::default(), "{name}");
        }
    }

    #[test]
    fn test_to_filename() {
        let fields = FilenameFields {
            sample: "GSM1".to_string(),
            library: "SRR1".to_string(),
            readgroup: "1".to_string(),
            description: "two words".to_string(),
            pair_index: "2".to_string(),
        };
        assert_eq!(
            fields.to_filename("fastq.gz"),
            "GSM1___SRR1___1___two%20words.2.fastq.gz"
        );
    }

    proptest! {
        #[test]
        fn prop_filename_round_trip(
            sample in "[A-Za-z0-9][A-Za-z0-9-]{0,8}",
            library in "[A-Za-z0-9][A-Za-z0-9-]{0,8}",
            readgroup in "[0-9]{1,2}",
            description in "([A-Za-z0-9]{1,5}( [A-Za-z0-9]{1,5}){0,2})?",
            pair_index in "(1|2)?",
            extension in "(fastq|fq)(\\.gz)?",
        ) {
            let fields = FilenameFields { sample, library, readgroup, description, pair_index };
            let name = fields.to_filename(&extension);
            prop_assert_eq!(FilenameFields::parse(&name), fields);
        }
    }
}
