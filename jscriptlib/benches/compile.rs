mod common;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use common::{compile_many, compile_table, src_array_workload, src_function_call_chain, units_for};

fn bench_compile(c: &mut Criterion) {
    let single = src_function_call_chain(1_000);
    let arrays = src_array_workload(1_000);
    let units = units_for(64);

    let mut group = c.benchmark_group("compile_pipeline");
    group.bench_function("compile_source", |b| {
        b.iter(|| {
            let _ = compile_table(black_box(&single));
        })
    });
    group.bench_function("compile_arrays", |b| {
        b.iter(|| {
            let _ = compile_table(black_box(&arrays));
        })
    });
    group.bench_function("compile_64_units", |b| {
        b.iter(|| {
            let _ = compile_many(black_box(&units));
        })
    });
    group.finish();
}

criterion_group!(benches, bench_compile);
criterion_main!(benches);
