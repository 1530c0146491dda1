/*!
# Filter Benchmarks

Compiling, rendering, converting and translating search filters.

## Usage

```bash
# Run all benchmarks
cargo bench --bench filter_benchmarks

# Run one group
cargo bench --bench filter_benchmarks -- "Filter Compile"

# Quick run with fewer samples
cargo bench --bench filter_benchmarks -- --quick
```

HTML reports are generated in `target/criterion/report/index.html`.
*/

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use identity_search::convert::FilterConverter;
use identity_search::definitions::Catalog;
use identity_search::filter::{Filter, compile, translate};
use identity_search::search::SearchType;
use std::hint::black_box;
use std::time::Duration;

/// An expression with `terms` OR-ed groups of three predicates each.
fn expression(terms: usize) -> String {
    (0..terms)
        .map(|i| {
            format!(
                r#"(department == "Dept{i}" && risk_score >= {} && name.startsWith("user{i}"))"#,
                i * 10
            )
        })
        .collect::<Vec<_>>()
        .join(" || ")
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("Filter Compile");
    group.measurement_time(Duration::from_secs(5));
    for terms in [1, 10, 100] {
        let source = expression(terms);
        group.bench_with_input(BenchmarkId::new("compile", terms), &source, |b, source| {
            b.iter(|| compile(black_box(source)));
        });
        let filter = compile(&source).expect("benchmark expression compiles");
        group.bench_with_input(BenchmarkId::new("render", terms), &filter, |b, filter| {
            b.iter(|| black_box(filter).to_string());
        });
    }
    group.finish();
}

fn bench_translate(c: &mut Criterion) {
    let catalog = Catalog::embedded().expect("embedded catalog parses");
    let config = catalog
        .type_config(SearchType::Identity)
        .expect("identity type configured");
    let definitions = catalog.definitions_for(SearchType::Identity);

    let mut group = c.benchmark_group("Filter Translate");
    group.measurement_time(Duration::from_secs(5));
    for terms in [1, 10, 100] {
        let filter = compile(&expression(terms)).expect("benchmark expression compiles");
        let filters = vec![filter];
        group.bench_with_input(BenchmarkId::new("convert", terms), &filters, |b, filters| {
            b.iter(|| FilterConverter::new(&definitions).convert(black_box(filters)));
        });

        let converted: Vec<Filter> = FilterConverter::new(&definitions).convert(&filters);
        group.bench_with_input(BenchmarkId::new("translate", terms), &converted, |b, converted| {
            b.iter(|| {
                for filter in converted {
                    let _ = translate(black_box(filter), &config.schema);
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile, bench_translate);
criterion_main!(benches);
