use aictx_sources::{IgnoreRules, is_binary};
use std::path::Path;

fn text_sample() -> Vec<u8> {
    "fn main() {\n    println!(\"hello\");\n}\n".repeat(64).into_bytes()
}

#[divan::bench]
fn binary_check_text(bencher: divan::Bencher) {
    let sample = text_sample();
    bencher.bench(|| is_binary(divan::black_box(&sample)));
}

#[divan::bench]
fn binary_check_control_bytes(bencher: divan::Bencher) {
    let sample: Vec<u8> = (0u8..32).cycle().take(4096).map(|b| b.max(1)).collect();
    bencher.bench(|| is_binary(divan::black_box(&sample)));
}

#[divan::bench]
fn ignore_rules(bencher: divan::Bencher) {
    let rules = IgnoreRules::new(&["tests", "*.snap", "docs/internal"]);
    let paths = [
        "src/main.rs",
        "web/node_modules",
        "assets/logo.png",
        "crate/tests",
        "docs/guide/intro.md",
    ];
    bencher.bench(|| {
        paths
            .iter()
            .filter(|p| rules.is_ignored(Path::new(divan::black_box(p))))
            .count()
    });
}

fn main() {
    divan::main();
}
