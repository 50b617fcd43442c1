use criterion::{black_box, criterion_group, criterion_main, Criterion};
use taskpilot::services::TaskAnalyzer;

const REQUESTS: &[(&str, &str)] = &[
    ("simple_zh", "今天天气怎么样？"),
    ("complex_zh", "先分析项目结构，然后创建配置文件，最后验证"),
    (
        "complex_en",
        "Implement the parser module, then write tests for every error path and verify the build \
         passes on the CI system before migrating the old config loader",
    ),
];

fn bench_analyze(c: &mut Criterion) {
    let analyzer = TaskAnalyzer::default();
    let mut group = c.benchmark_group("task_analyzer");
    for (name, text) in REQUESTS {
        group.bench_function(*name, |b| b.iter(|| analyzer.analyze(black_box(text))));
    }
    group.finish();
}

criterion_group!(benches, bench_analyze);
criterion_main!(benches);
