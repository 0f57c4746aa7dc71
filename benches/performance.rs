use criterion::{black_box, criterion_group, criterion_main, Criterion};
use modscope::config::AnalyzerConfig;
use modscope::core::{CodebaseAnalyzer, SourceFile};
use std::path::Path;

/// `packages` packages of `modules` modules each; every module imports its
/// predecessor relatively and the next package absolutely.
fn generated_tree(packages: usize, modules: usize) -> Vec<SourceFile> {
    let mut files = Vec::with_capacity(packages * (modules + 1));
    for p in 0..packages {
        files.push(SourceFile::new(
            format!("pkg_{p}/__init__.py"),
            "from .mod_0 import Model0\n\n__all__ = [\"Model0\"]\n",
        ));
        for m in 0..modules {
            let previous = if m == 0 {
                String::new()
            } else {
                format!("from .mod_{} import Model{}\n", m - 1, m - 1)
            };
            let base = if m == 0 {
                String::new()
            } else {
                format!("Model{}", m - 1)
            };
            let next_package = (p + 1) % packages;
            let content = format!(
                r#"import os
{previous}from pkg_{next_package} import Model0 as Upstream

class Model{m}({base}):
    """Generated model."""

    def __init__(self):
        self.value = {m}

    @property
    def doubled(self):
        return self.value * 2

    @staticmethod
    def build():
        return Model{m}()

async def load_{m}():
    return Model{m}.build()
"#
            );
            files.push(SourceFile::new(format!("pkg_{p}/mod_{m}.py"), content));
        }
    }
    files
}

fn benchmark_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("codebase_analysis");

    let small = generated_tree(2, 5);
    group.bench_function("small_tree", |b| {
        b.iter(|| {
            let analyzer = CodebaseAnalyzer::new(AnalyzerConfig::default());
            let report = analyzer.analyze(black_box(Path::new("bench")), black_box(small.clone()));
            black_box(report)
        });
    });

    let large = generated_tree(20, 25);
    group.bench_function("large_tree", |b| {
        b.iter(|| {
            let analyzer = CodebaseAnalyzer::new(AnalyzerConfig::default());
            let report = analyzer.analyze(black_box(Path::new("bench")), black_box(large.clone()));
            black_box(report)
        });
    });

    // Reusing one analyzer serves every extraction from the parse cache.
    let warm = CodebaseAnalyzer::new(AnalyzerConfig::default());
    group.bench_function("large_tree_warm_cache", |b| {
        b.iter(|| {
            let report = warm.analyze(black_box(Path::new("bench")), black_box(large.clone()));
            black_box(report)
        });
    });

    group.finish();
}

fn benchmark_cache_performance(c: &mut Criterion) {
    use modscope::core::Module;
    use modscope::parsers::cache::ParseCache;
    use modscope::parsers::python::PythonParser;
    use modscope::parsers::LanguageParser;

    let mut group = c.benchmark_group("cache_performance");

    let parser = PythonParser::default();
    let module = Module {
        id: "bench".to_string(),
        path: "bench.py".into(),
        is_package: false,
        source: "def test():\n    return 42\n".to_string(),
    };
    let extracted = parser.extract(&module).unwrap();

    group.bench_function("cache_store_and_retrieve", |b| {
        b.iter(|| {
            let cache = ParseCache::in_memory_only();
            let fingerprint = ParseCache::fingerprint(black_box(&module), parser.markers());
            cache.store(fingerprint, &extracted).unwrap();
            black_box(cache.get(fingerprint))
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_analysis, benchmark_cache_performance);
criterion_main!(benches);
