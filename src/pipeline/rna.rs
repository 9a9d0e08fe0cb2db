//! RNA-seq stages: align with STAR, mark duplicates, prune, count, summarize.

use super::{q, qs, readgroup_inputs, PipelineConfig, Resources, Stage};
use crate::metadata::{LibraryMap, LibraryMetadata};
use anyhow::Result;
use itertools::Itertools;
use std::path::PathBuf;

/// STAR gives uniquely mapped reads a MAPQ of 255.
const DEFAULT_MAPQ: &str = "255";

fn star_bam(config: &PipelineConfig, library: &str) -> PathBuf {
    config
        .stage_dir("star")
        .join(format!("{library}.Aligned.sortedByCoord.out.bam"))
}

fn md_bam(config: &PipelineConfig, library: &str) -> PathBuf {
    config
        .stage_dir("mark_duplicates")
        .join(format!("{library}.md.bam"))
}

fn pruned_bam(config: &PipelineConfig, library: &str) -> PathBuf {
    config.stage_dir("prune").join(format!("{library}.pruned.bam"))
}

/// featureCounts `-s` value for the library's strandedness.
fn strand_flag(lib: &LibraryMetadata) -> &'static str {
    match lib.option("strand") {
        Some("forward") => "1",
        Some("reverse") => "2",
        _ => "0",
    }
}

pub(super) fn stages(config: &PipelineConfig, libraries: &LibraryMap) -> Result<Vec<Stage>> {
    let mut star = Stage::new(
        "star",
        "Align each library's read groups with STAR",
        Resources {
            time_limit: "12h",
            processors: 4,
            memory: "40g",
        },
    );
    let mut mark_duplicates = Stage::new(
        "mark_duplicates",
        "Mark duplicate alignments",
        Resources {
            time_limit: "12h",
            processors: 2,
            memory: "16g",
        },
    )
    .io_heavy();
    let mut prune = Stage::new(
        "prune",
        "Keep uniquely mapped primary alignments",
        Resources {
            time_limit: "4h",
            processors: 1,
            memory: "4g",
        },
    )
    .io_heavy();
    let mut featurecounts = Stage::new(
        "featurecounts",
        "Count reads per gene",
        Resources {
            time_limit: "4h",
            processors: 4,
            memory: "8g",
        },
    );
    let mut multiqc = Stage::new(
        "multiqc",
        "Summarize the quality reports",
        Resources {
            time_limit: "2h",
            processors: 1,
            memory: "4g",
        },
    );

    for (_, lib) in libraries.iter() {
        let readgroups = readgroup_inputs(config, lib)?;
        if readgroups.is_empty() {
            continue;
        }
        let name = &lib.library;
        let paired = readgroups.iter().all(|rg| rg.is_paired());

        let mates = if paired { 2 } else { 1 };
        let read_files = (0..mates)
            .map(|mate| {
                readgroups
                    .iter()
                    .filter_map(|rg| rg.files.get(mate))
                    .map(|f| q(f))
                    .join(",")
            })
            .join(" ");
        let compressed = readgroups
            .iter()
            .flat_map(|rg| rg.files.iter())
            .any(|f| f.extension().map_or(false, |e| e == "gz"));
        let rg_lines = readgroups
            .iter()
            .map(|rg| {
                let mut line = format!("ID:{name}___{} SM:{} LB:{name}", rg.id, qs(&lib.sample));
                if !lib.sequencing_platform.is_empty() {
                    line.push_str(&format!(" PL:{}", qs(&lib.sequencing_platform)));
                }
                line
            })
            .join(" , ");

        let mut command = format!(
            "STAR --runThreadN 4 --genomeLoad NoSharedMemory --genomeDir {} --readFilesIn {}",
            q(&config.reference_root.join("star").join(&lib.reference_genome)),
            read_files
        );
        if compressed {
            command.push_str(" --readFilesCommand zcat");
        }
        command.push_str(&format!(
            " --outSAMattributes NH HI AS nM XS --outSAMattrRGline {rg_lines} \
             --outSAMtype BAM SortedByCoordinate --outFileNamePrefix {}",
            q(&config.stage_dir("star").join(format!("{name}.")))
        ));
        star.push(name, command);

        let md = md_bam(config, name);
        mark_duplicates.push(
            name,
            format!(
                "java -Xmx8g -jar $PICARD_HOME/picard.jar MarkDuplicates I={} O={} ASSUME_SORTED=true \
                 METRICS_FILE={} VALIDATION_STRINGENCY=LENIENT TMP_DIR={} && samtools index {}",
                q(&star_bam(config, name)),
                q(&md),
                q(&config
                    .stage_dir("mark_duplicates")
                    .join(format!("{name}.markdup.metrics"))),
                q(&config.stage_dir("mark_duplicates")),
                q(&md)
            ),
        );

        let pruned = pruned_bam(config, name);
        prune.push(
            name,
            format!(
                "samtools view -b -h -F 4 -F 256 -F 1024 -F 2048 -q {} {} > {} && samtools index {}",
                qs(lib.option("mapq").unwrap_or(DEFAULT_MAPQ)),
                q(&md),
                q(&pruned),
                q(&pruned)
            ),
        );

        featurecounts.push(
            name,
            format!(
                "featureCounts -T 4{} -s {} -a {} -o {} {}",
                if paired { " -p" } else { "" },
                strand_flag(lib),
                q(&config
                    .reference_root
                    .join("annotations")
                    .join(format!("{}.gtf", lib.reference_genome))),
                q(&config
                    .stage_dir("featurecounts")
                    .join(format!("{name}.featureCounts.txt"))),
                q(&pruned)
            ),
        );
    }

    if !star.jobs.is_empty() {
        multiqc.push(
            "multiqc",
            format!(
                "multiqc -f -n {} -o {} {}",
                qs(&config.analysis_name()),
                q(&config.stage_dir("multiqc")),
                q(&config.work_path)
            ),
        );
    }

    Ok(vec![star, mark_duplicates, prune, featurecounts, multiqc])
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::analysis::AnalysisType;
    use crate::pipeline::test::{config, libraries};
    use crate::pipeline::render_pipeline;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    #[test]
    fn test_star_command() -> Result<()> {
        let config = config(AnalysisType::RnaSeq, Path::new("/a"));
        let libs = libraries("hg19", Path::new("/in"));
        let stages = stages(&config, &libs)?;

        let star = stages[0].jobs[0].command.as_str();
        assert_eq!(
            star,
            "STAR --runThreadN 4 --genomeLoad NoSharedMemory --genomeDir /ref/star/hg19 \
             --readFilesIn /a/data/S1___L1___1.1.fq.gz,/a/data/S1___L1___2.1.fq.gz \
             /a/data/S1___L1___1.2.fq.gz,/a/data/S1___L1___2.2.fq.gz \
             --readFilesCommand zcat --outSAMattributes NH HI AS nM XS \
             --outSAMattrRGline ID:L1___1 SM:S1 LB:L1 PL:ILLUMINA , ID:L1___2 SM:S1 LB:L1 PL:ILLUMINA \
             --outSAMtype BAM SortedByCoordinate --outFileNamePrefix /a/work/star/L1."
        );
        Ok(())
    }

    #[test]
    fn test_counts_and_summary() -> Result<()> {
        let config = config(AnalysisType::RnaSeq, Path::new("/a"));
        let libs = libraries("hg19", Path::new("/in"));
        let stages = stages(&config, &libs)?;

        let names: Vec<&str> = stages.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec!["star", "mark_duplicates", "prune", "featurecounts", "multiqc"]
        );
        assert!(stages[2].jobs[0].command.contains("-q 30 "));
        assert!(stages[3].jobs[0]
            .command
            .starts_with("featureCounts -T 4 -p -s 2 -a /ref/annotations/hg19.gtf"));
        assert!(stages[3].jobs[2].command.contains(" -s 0 "));
        assert_eq!(stages[4].jobs.len(), 1);

        let script = render_pipeline(&config, &stages);
        assert!(script.ends_with("multiqc -f -n a -o /a/work/multiqc /a/work\n\n# drmr:wait\n"));
        Ok(())
    }
}
