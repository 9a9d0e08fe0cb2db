//! Supported analysis types and their per-library options.

use clap::ValueEnum;
use serde_derive::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AnalysisType {
    #[default]
    #[serde(rename = "atac-seq")]
    #[value(name = "atac-seq")]
    AtacSeq,
    #[serde(rename = "rna-seq")]
    #[value(name = "rna-seq")]
    RnaSeq,
}

/// The values an option may take.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionValues {
    Choice(&'static [&'static str]),
    /// A mapping quality threshold.
    Mapq,
}

/// An option recorded for every library of an analysis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnalysisOption {
    pub name: &'static str,
    pub prompt: &'static str,
    pub values: OptionValues,
    pub default: &'static str,
}

impl AnalysisOption {
    pub fn accepts(&self, value: &str) -> bool {
        match self.values {
            OptionValues::Choice(choices) => choices.iter().any(|c| *c == value),
            OptionValues::Mapq => value.parse::<u8>().is_ok(),
        }
    }

    /// What an acceptable value looks like, for prompts and errors.
    pub fn expected(&self) -> String {
        match self.values {
            OptionValues::Choice(choices) => format!("one of {}", choices.join(", ")),
            OptionValues::Mapq => "an integer from 0 to 255".to_string(),
        }
    }
}

const ATAC_SEQ_OPTIONS: &[AnalysisOption] = &[
    AnalysisOption {
        name: "peak_mode",
        prompt: "Peak calling mode",
        values: OptionValues::Choice(&["broad", "narrow"]),
        default: "broad",
    },
    AnalysisOption {
        name: "mapq",
        prompt: "Minimum mapping quality of retained alignments",
        values: OptionValues::Mapq,
        default: "30",
    },
];

const RNA_SEQ_OPTIONS: &[AnalysisOption] = &[
    AnalysisOption {
        name: "strand",
        prompt: "Library strandedness",
        values: OptionValues::Choice(&["unstranded", "forward", "reverse"]),
        default: "unstranded",
    },
    AnalysisOption {
        name: "mapq",
        prompt: "Minimum mapping quality of retained alignments",
        values: OptionValues::Mapq,
        default: "255",
    },
];

impl AnalysisType {
    pub fn name(&self) -> &'static str {
        match self {
            AnalysisType::AtacSeq => "atac-seq",
            AnalysisType::RnaSeq => "rna-seq",
        }
    }

    pub fn options(&self) -> &'static [AnalysisOption] {
        match self {
            AnalysisType::AtacSeq => ATAC_SEQ_OPTIONS,
            AnalysisType::RnaSeq => RNA_SEQ_OPTIONS,
        }
    }

    pub fn option(&self, name: &str) -> Option<&'static AnalysisOption> {
        self.options().iter().find(|o| o.name == name)
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_names_match_serde() {
        for at in [AnalysisType::AtacSeq, AnalysisType::RnaSeq] {
            let json = serde_json::to_string(&at).unwrap();
            assert_eq!(json, format!("\"{}\"", at.name()));
            assert_eq!(AnalysisType::from_str(at.name(), false).unwrap(), at);
        }
    }

    #[test]
    fn test_option_choices() {
        let peak = AnalysisType::AtacSeq.option("peak_mode").unwrap();
        assert!(peak.accepts("narrow"));
        assert!(!peak.accepts("wide"));
        let mapq = AnalysisType::RnaSeq.option("mapq").unwrap();
        assert!(mapq.accepts("255"));
        assert!(mapq.accepts("0"));
        assert!(!mapq.accepts("high"));
        assert!(!mapq.accepts("256"));
        assert!(!mapq.accepts("-1"));
        assert!(AnalysisType::RnaSeq.option("peak_mode").is_none());
    }
}
