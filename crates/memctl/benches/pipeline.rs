use criterion::{criterion_group, criterion_main, Criterion};
use memctl_codec::{build_codebook, compress_text, optimize_tokens, rle_compress, IpFamilies, RleContext};
use memctl_core::{rule_compress, CodebookConfig};
use std::hint::black_box;

const WORKSPACE: &str = "/home/agent/workspace";

fn synthetic_file(day: usize) -> String {
    let mut text = format!("# Daily log {day}\n\n## Decisions\n");
    for i in 0..20 {
        text.push_str(&format!(
            "- Deployed gateway build {i} to 10.0.{}.{} from {WORKSPACE}/deploy/run.sh\n",
            day % 4,
            i + 1
        ));
        text.push_str("- Remember to configure the development environment before testing\n");
    }
    text.push_str("\n| Host | Role | Status |\n|---|---|---|\n");
    for i in 0..10 {
        text.push_str(&format!("| node{i} | worker | healthy |\n"));
    }
    text.push_str("\nLevels: DEBUG, INFO, WARN, ERROR, FATAL\n\n\n\n");
    text
}

fn bench_passes(c: &mut Criterion) {
    let corpus: Vec<String> = (0..30).map(synthetic_file).collect();
    let codebook = build_codebook(&corpus, &CodebookConfig::default());
    let ctx = RleContext {
        workspace_paths: vec![WORKSPACE.to_string()],
        ip_min_occurrences: 2,
        ip_families: IpFamilies::new(),
    };

    c.bench_function("rule_compress_30_files", |b| {
        b.iter(|| {
            for text in &corpus {
                black_box(rule_compress(black_box(text)));
            }
        });
    });

    c.bench_function("build_codebook_30_files", |b| {
        b.iter(|| black_box(build_codebook(black_box(&corpus), &CodebookConfig::default())));
    });

    c.bench_function("dictionary_compress_30_files", |b| {
        b.iter(|| {
            for text in &corpus {
                black_box(compress_text(black_box(text), &codebook));
            }
        });
    });

    c.bench_function("rle_compress_30_files", |b| {
        b.iter(|| {
            for text in &corpus {
                black_box(rle_compress(black_box(text), &ctx));
            }
        });
    });

    c.bench_function("optimize_tokens_30_files", |b| {
        b.iter(|| {
            for text in &corpus {
                black_box(optimize_tokens(black_box(text), true));
            }
        });
    });
}

criterion_group!(benches, bench_passes);
criterion_main!(benches);
