use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mka::analysis::AnalysisType;
use mka::metadata::{describe_libraries, DescribeOptions};
use mka::pipeline::{plan, render_pipeline, PipelineConfig};
use mka::prompt::LinePrompter;
use mka::FilenameFields;
use std::io::Cursor;
use std::path::PathBuf;

/// A flowcell's worth of paired-end files: 48 libraries over 12 samples, 4 lanes each.
fn flowcell_files() -> Vec<PathBuf> {
    let mut files = Vec::new();
    for lib in 0..48 {
        for lane in 1..=4 {
            for pair in 1..=2 {
                files.push(PathBuf::from(format!(
                    "/seq/run1/GSM{}___SRR{lib}___{lane}___liver%20rep%20{lib}.{pair}.fastq.gz",
                    lib % 12
                )));
            }
        }
    }
    files
}

fn options<'a>() -> DescribeOptions<'a> {
    DescribeOptions {
        analysis_type: AnalysisType::AtacSeq,
        interactive: false,
        defaults: None,
        run_info: None,
        genome: Some("hg19"),
        today: mka::dates::today(),
    }
}

fn pipeline_config() -> PipelineConfig {
    PipelineConfig {
        analysis_type: AnalysisType::AtacSeq,
        analysis_path: PathBuf::from("/analyses/liver"),
        data_path: PathBuf::from("/analyses/liver/data"),
        work_path: PathBuf::from("/analyses/liver/work"),
        reference_root: PathBuf::from("/lab/data/reference"),
        output: PathBuf::from("/analyses/liver/control/pipeline"),
        io_limit: 4,
        time: true,
        ionice: true,
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    let files = flowcell_files();

    c.bench_function("bench-parse-filenames", |b| {
        b.iter(|| {
            files
                .iter()
                .map(|f| black_box(FilenameFields::parse(f)))
                .filter(FilenameFields::is_match)
                .count()
        })
    });

    c.bench_function("bench-describe-libraries", |b| {
        b.iter(|| {
            let mut prompter = LinePrompter::new(Cursor::new(""), Vec::new());
            describe_libraries(&files, &options(), &mut prompter).unwrap()
        })
    });

    let mut prompter = LinePrompter::new(Cursor::new(""), Vec::new());
    let libraries = describe_libraries(&files, &options(), &mut prompter).unwrap();
    let config = pipeline_config();
    c.bench_function("bench-render-atac-pipeline", |b| {
        b.iter(|| {
            let stages = plan(&config, &libraries).unwrap();
            black_box(render_pipeline(&config, &stages))
        })
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(20);
    targets = criterion_benchmark
);
criterion_main!(benches);
