//! ATAC-seq stages: trim, align, mark duplicates, prune, call peaks, QC.

use super::{q, qs, readgroup_inputs, PipelineConfig, ReadGroupInput, Resources, Stage};
use crate::metadata::{LibraryMap, LibraryMetadata};
use anyhow::Result;
use itertools::Itertools;
use std::path::PathBuf;

/// Nextera transposase adapter, trimmed from single-end reads.
const NEXTERA_ADAPTER: &str = "CTGTCTCTTATACACATCT";

const DEFAULT_MAPQ: &str = "30";

/// What the peak caller and QC need to know about a reference genome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenomeFamily {
    Human,
    Mouse,
    Other,
}

impl GenomeFamily {
    pub fn of(genome: &str) -> GenomeFamily {
        let g = genome.to_ascii_lowercase();
        if g.starts_with("hg") || g.starts_with("grch") {
            GenomeFamily::Human
        } else if g.starts_with("mm") || g.starts_with("grcm") {
            GenomeFamily::Mouse
        } else {
            GenomeFamily::Other
        }
    }

    /// MACS2 effective genome size shortcut.
    pub fn macs2_genome_size(&self) -> Option<&'static str> {
        match self {
            GenomeFamily::Human => Some("hs"),
            GenomeFamily::Mouse => Some("mm"),
            GenomeFamily::Other => None,
        }
    }

    pub fn ataqv_organism(&self) -> Option<&'static str> {
        match self {
            GenomeFamily::Human => Some("human"),
            GenomeFamily::Mouse => Some("mouse"),
            GenomeFamily::Other => None,
        }
    }

    pub fn autosomes(&self) -> Vec<String> {
        let n = match self {
            GenomeFamily::Human => 22,
            GenomeFamily::Mouse => 19,
            GenomeFamily::Other => 0,
        };
        (1..=n).map(|i| format!("chr{i}")).collect()
    }
}

fn bwa_index(config: &PipelineConfig, genome: &str) -> PathBuf {
    config.reference_root.join("bwa").join(genome).join(genome)
}

fn trimmed(config: &PipelineConfig, library: &str, rg: &ReadGroupInput) -> Vec<PathBuf> {
    let dir = config.stage_dir("trim");
    (1..=rg.files.len())
        .map(|pair| dir.join(format!("{library}___{}.{pair}.trimmed.fq.gz", rg.id)))
        .collect()
}

fn readgroup_bam(config: &PipelineConfig, library: &str, rg: &ReadGroupInput) -> PathBuf {
    config
        .stage_dir("bwa")
        .join(format!("{library}___{}.bam", rg.id))
}

fn md_bam(config: &PipelineConfig, library: &str) -> PathBuf {
    config
        .stage_dir("mark_duplicates")
        .join(format!("{library}.md.bam"))
}

fn pruned_bam(config: &PipelineConfig, library: &str) -> PathBuf {
    config.stage_dir("prune").join(format!("{library}.pruned.bam"))
}

fn peak_file(config: &PipelineConfig, lib: &LibraryMetadata) -> PathBuf {
    let kind = if peak_mode(lib) == "narrow" {
        "narrowPeak"
    } else {
        "broadPeak"
    };
    config
        .stage_dir("macs2")
        .join(format!("{}_peaks.{kind}", lib.library))
}

fn ataqv_metrics(config: &PipelineConfig, library: &str) -> PathBuf {
    config
        .stage_dir("ataqv")
        .join(format!("{library}.ataqv.json.gz"))
}

fn peak_mode(lib: &LibraryMetadata) -> &str {
    lib.option("peak_mode").unwrap_or("broad")
}

/// A library is processed as paired-end when all of its read groups are.
fn is_paired(readgroups: &[ReadGroupInput]) -> bool {
    !readgroups.is_empty() && readgroups.iter().all(ReadGroupInput::is_paired)
}

fn read_group_line(lib: &LibraryMetadata, rg: &ReadGroupInput) -> String {
    let mut line = format!(
        "@RG\\tID:{}___{}\\tSM:{}\\tLB:{}",
        lib.library, rg.id, lib.sample, lib.library
    );
    if !lib.sequencing_platform.is_empty() {
        line.push_str(&format!("\\tPL:{}", lib.sequencing_platform));
    }
    if !lib.sequencing_center.is_empty() {
        line.push_str(&format!("\\tCN:{}", lib.sequencing_center));
    }
    line
}

pub(super) fn stages(config: &PipelineConfig, libraries: &LibraryMap) -> Result<Vec<Stage>> {
    let mut trim = Stage::new(
        "trim",
        "Trim adapter sequence",
        Resources {
            time_limit: "4h",
            processors: 1,
            memory: "4g",
        },
    );
    let mut bwa = Stage::new(
        "bwa",
        "Align each read group with bwa and sort the alignments",
        Resources {
            time_limit: "24h",
            processors: 8,
            memory: "32g",
        },
    );
    let mut mark_duplicates = Stage::new(
        "mark_duplicates",
        "Merge each library's read groups and mark duplicates",
        Resources {
            time_limit: "12h",
            processors: 2,
            memory: "16g",
        },
    )
    .io_heavy();
    let mut prune = Stage::new(
        "prune",
        "Keep properly mapped, unique, autosomal alignments",
        Resources {
            time_limit: "4h",
            processors: 1,
            memory: "4g",
        },
    )
    .io_heavy();
    let mut macs2 = Stage::new(
        "macs2",
        "Call peaks",
        Resources {
            time_limit: "8h",
            processors: 1,
            memory: "8g",
        },
    );
    let mut merge = Stage::new(
        "merge",
        "Merge the pruned alignments of each sample",
        Resources {
            time_limit: "8h",
            processors: 1,
            memory: "4g",
        },
    );
    let mut ataqv = Stage::new(
        "ataqv",
        "Measure ATAC-seq library quality",
        Resources {
            time_limit: "8h",
            processors: 1,
            memory: "8g",
        },
    );
    let mut mkarv = Stage::new(
        "mkarv",
        "Collect the quality metrics into one web viewer",
        Resources {
            time_limit: "2h",
            processors: 1,
            memory: "4g",
        },
    );

    for (_, lib) in libraries.iter() {
        let readgroups = readgroup_inputs(config, lib)?;
        let paired = is_paired(&readgroups);
        let family = GenomeFamily::of(&lib.reference_genome);
        let name = &lib.library;

        for rg in &readgroups {
            let outputs = trimmed(config, name, rg);
            let job = format!("{name}___{}", rg.id);
            if rg.is_paired() {
                trim.push(
                    &job,
                    format!(
                        "cta {} {} {} {}",
                        q(&rg.files[0]),
                        q(&rg.files[1]),
                        q(&outputs[0]),
                        q(&outputs[1])
                    ),
                );
            } else if let (Some(input), Some(output)) = (rg.files.first(), outputs.first()) {
                trim.push(
                    &job,
                    format!(
                        "cutadapt -a {NEXTERA_ADAPTER} -o {} {}",
                        q(output),
                        q(input)
                    ),
                );
            }

            let bam = readgroup_bam(config, name, rg);
            let sort_prefix = config.stage_dir("bwa").join(format!("{job}.sort"));
            bwa.push(
                &job,
                format!(
                    "bwa mem -M -t 8 -R {} {} {} | samtools sort -m 1g -@ 4 -O bam -T {} -o {} -",
                    qs(&read_group_line(lib, rg)),
                    q(&bwa_index(config, &lib.reference_genome)),
                    outputs.iter().map(|p| q(p)).join(" "),
                    q(&sort_prefix),
                    q(&bam)
                ),
            );
        }

        let md = md_bam(config, name);
        let metrics = config
            .stage_dir("mark_duplicates")
            .join(format!("{name}.markdup.metrics"));
        mark_duplicates.push(
            name,
            format!(
                "java -Xmx8g -jar $PICARD_HOME/picard.jar MarkDuplicates {} O={} ASSUME_SORTED=true \
                 METRICS_FILE={} VALIDATION_STRINGENCY=LENIENT TMP_DIR={} && samtools index {}",
                readgroups
                    .iter()
                    .map(|rg| format!("I={}", q(&readgroup_bam(config, name, rg))))
                    .join(" "),
                q(&md),
                q(&metrics),
                q(&config.stage_dir("mark_duplicates")),
                q(&md)
            ),
        );

        let pruned = pruned_bam(config, name);
        let flags = if paired {
            "-f 3 -F 4 -F 8 -F 256 -F 1024 -F 2048"
        } else {
            "-F 4 -F 256 -F 1024 -F 2048"
        };
        let mapq = lib.option("mapq").unwrap_or(DEFAULT_MAPQ);
        let mut regions = family.autosomes().join(" ");
        if !regions.is_empty() {
            regions.insert(0, ' ');
        }
        prune.push(
            name,
            format!(
                "samtools view -b -h {flags} -q {} {}{regions} > {} && samtools index {}",
                qs(mapq),
                q(&md),
                q(&pruned),
                q(&pruned)
            ),
        );

        let mut callpeak = format!(
            "macs2 callpeak -t {} -f {} -n {} --outdir {}",
            q(&pruned),
            if paired { "BAMPE" } else { "BAM" },
            qs(name),
            q(&config.stage_dir("macs2"))
        );
        if let Some(gsize) = family.macs2_genome_size() {
            callpeak.push_str(&format!(" -g {gsize}"));
        }
        if peak_mode(lib) == "narrow" {
            callpeak.push_str(" --nomodel --shift -100 --extsize 200 --keep-dup all -q 0.05");
        } else {
            callpeak.push_str(" --broad --nomodel --shift -100 --extsize 200 --keep-dup all --SPMR");
        }
        macs2.push(name, callpeak);

        let organism = match family.ataqv_organism() {
            Some(o) => o.to_string(),
            None => format!(
                "--autosomal-reference-file {} {}",
                q(&config
                    .reference_root
                    .join("autosomes")
                    .join(format!("{}.txt", lib.reference_genome))),
                qs(&lib.reference_genome)
            ),
        };
        let mut describe = String::new();
        if !lib.description.is_empty() {
            describe = format!(" --description {}", qs(&lib.description));
        }
        ataqv.push(
            name,
            format!(
                "ataqv --peak-file {} --name {}{describe} --metrics-file {} --tss-file {} {} {} > {}",
                q(&peak_file(config, lib)),
                qs(name),
                q(&ataqv_metrics(config, name)),
                q(&config
                    .reference_root
                    .join("annotations")
                    .join(format!("{}.tss.bed.gz", lib.reference_genome))),
                organism,
                q(&md),
                q(&config.stage_dir("ataqv").join(format!("{name}.ataqv.out")))
            ),
        );
    }

    for (sample, libs) in libraries.samples() {
        let merged = config
            .stage_dir("merge")
            .join(format!("{sample}.pruned.bam"));
        merge.push(
            sample,
            format!(
                "samtools merge -f {} {} && samtools index {}",
                q(&merged),
                libs.iter()
                    .map(|lib| q(&pruned_bam(config, &lib.library)))
                    .join(" "),
                q(&merged)
            ),
        );
    }

    if !libraries.is_empty() {
        mkarv.push(
            "mkarv",
            format!(
                "mkarv --force {} {}",
                q(&config.stage_dir("mkarv").join(config.analysis_name())),
                libraries
                    .iter()
                    .map(|(name, _)| q(&ataqv_metrics(config, name)))
                    .join(" ")
            ),
        );
    }

    Ok(vec![
        trim,
        bwa,
        mark_duplicates,
        prune,
        macs2,
        merge,
        ataqv,
        mkarv,
    ])
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::analysis::AnalysisType;
    use crate::pipeline::render_pipeline;
    use crate::pipeline::test::{config, libraries};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    #[test]
    fn test_genome_family() {
        assert_eq!(GenomeFamily::of("hg19"), GenomeFamily::Human);
        assert_eq!(GenomeFamily::of("GRCh38"), GenomeFamily::Human);
        assert_eq!(GenomeFamily::of("mm10"), GenomeFamily::Mouse);
        assert_eq!(GenomeFamily::of("dm6"), GenomeFamily::Other);
        assert_eq!(GenomeFamily::Human.autosomes().len(), 22);
        assert_eq!(GenomeFamily::Mouse.autosomes().last().unwrap(), "chr19");
        assert!(GenomeFamily::Other.autosomes().is_empty());
    }

    #[test]
    fn test_jobs_per_stage() -> Result<()> {
        let config = config(AnalysisType::AtacSeq, Path::new("/a"));
        let libs = libraries("hg19", Path::new("/in"));
        let stages = stages(&config, &libs)?;
        let counts: Vec<(&str, usize)> = stages.iter().map(|s| (s.name, s.jobs.len())).collect();
        assert_eq!(
            counts,
            vec![
                ("trim", 4),
                ("bwa", 4),
                ("mark_duplicates", 3),
                ("prune", 3),
                ("macs2", 3),
                ("merge", 2),
                ("ataqv", 3),
                ("mkarv", 1),
            ]
        );

        let md = &stages[2].jobs[0].command;
        assert!(md.contains("I=/a/work/bwa/L1___1.bam I=/a/work/bwa/L1___2.bam"));

        let bwa = &stages[1].jobs[0].command;
        assert!(bwa.starts_with("bwa mem -M -t 8 -R '@RG\\tID:L1___1\\tSM:S1\\tLB:L1\\tPL:ILLUMINA' /ref/bwa/hg19/hg19 "));
        assert!(bwa.contains("/a/work/trim/L1___1.1.trimmed.fq.gz /a/work/trim/L1___1.2.trimmed.fq.gz"));

        let trim = &stages[0].jobs[0].command;
        assert!(trim.starts_with("cta /a/data/S1___L1___1.1.fq.gz /a/data/S1___L1___1.2.fq.gz "));

        let prune = &stages[3].jobs[0].command;
        assert!(prune.contains("-f 3 -F 4 -F 8 -F 256 -F 1024 -F 2048 -q 30 /a/work/mark_duplicates/L1.md.bam chr1 chr2"));
        assert!(prune.contains(" chr22 > /a/work/prune/L1.pruned.bam"));

        assert!(stages[4].jobs[0].command.contains("--broad"));
        assert!(stages[4].jobs[1].command.contains("-f BAMPE"));
        assert!(!stages[4].jobs[1].command.contains("--broad"));
        assert!(stages[6].jobs[0].command.contains("--description 'liver rep 1'"));
        assert!(stages[6].jobs[1].command.contains("/a/work/macs2/L2_peaks.narrowPeak"));

        let merge = &stages[5].jobs[0].command;
        assert!(merge.contains("/a/work/prune/L1.pruned.bam /a/work/prune/L2.pruned.bam"));
        Ok(())
    }

    #[test]
    fn test_io_heavy_stages_are_batched() -> Result<()> {
        let config = config(AnalysisType::AtacSeq, Path::new("/a"));
        let libs = libraries("mm10", Path::new("/in"));
        let stages = stages(&config, &libs)?;
        let script = render_pipeline(&config, &stages);

        let start = script.find("# drmr:label mark_duplicates").unwrap();
        let end = script.find("# drmr:label prune").unwrap();
        // three libraries with an io limit of two
        assert_eq!(script[start..end].matches("# drmr:wait").count(), 2);
        assert!(script.contains(" -g mm "));
        Ok(())
    }

    #[test]
    fn test_single_end() -> Result<()> {
        let config = config(AnalysisType::AtacSeq, Path::new("/a"));
        let libs = LibraryMap::from_json(
            r#"{"L1": {"sample": "S1", "library": "L1", "reference_genome": "dm6",
                "readgroups": {"1": ["/in/S1___L1.fq.gz"]}}}"#,
        )?;
        let stages = stages(&config, &libs)?;
        assert_eq!(
            stages[0].jobs[0].command,
            "cutadapt -a CTGTCTCTTATACACATCT -o /a/work/trim/L1___1.1.trimmed.fq.gz /a/data/S1___L1.fq.gz"
        );
        let prune = &stages[3].jobs[0].command;
        assert!(prune.ends_with("-F 4 -F 256 -F 1024 -F 2048 -q 30 /a/work/mark_duplicates/L1.md.bam > /a/work/prune/L1.pruned.bam && samtools index /a/work/prune/L1.pruned.bam"));
        assert!(!stages[4].jobs[0].command.contains(" -g "));
        assert!(stages[6].jobs[0]
            .command
            .contains("--autosomal-reference-file /ref/autosomes/dm6.txt dm6"));
        Ok(())
    }
}
