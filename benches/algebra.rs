use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use reldb::{IndexConfig, IndexStrategy, LinearHashMap, Schema, Table, Value};
use std::hint::black_box;

fn setup_student(n: usize, strategy: IndexStrategy) -> Table {
    let schema =
        Schema::parse("sid name address status", "Integer String String String", "sid").unwrap();
    let rows = (0..n).map(|i| {
        vec![
            Value::Int(i as i64),
            Value::from(format!("name{i}")),
            Value::from(format!("{i} Main St")),
            Value::from(if i % 2 == 0 { "active" } else { "inactive" }),
        ]
    });
    Table::with_tuples("Student", schema, rows, strategy).unwrap()
}

fn setup_takes(n: usize, strategy: IndexStrategy) -> Table {
    let schema = Schema::parse("sid cid", "Integer Integer", "sid cid").unwrap();
    let rows = (0..n).map(|i| vec![Value::Int((i * 7 % n) as i64), Value::Int((i % 50) as i64)]);
    Table::with_tuples("Takes", schema, rows, strategy).unwrap()
}

fn bench_linear_hash_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("LinearHash_Put");

    for n in [1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, &n| {
            b.iter(|| {
                let mut map = LinearHashMap::with_config(&IndexConfig::default());
                for i in 0..n as i64 {
                    map.put(i, i);
                }
                black_box(map);
            });
        });
    }
    group.finish();
}

fn bench_select_where(c: &mut Criterion) {
    let mut group = c.benchmark_group("Select_Where_Performance");

    for n in [1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, &n| {
            let student = setup_student(n, IndexStrategy::LinearHash);
            b.iter(|| {
                let res = student.select_where(black_box("status == active")).unwrap();
                black_box(res);
            });
        });
    }
    group.finish();
}

fn bench_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("Join_Performance");

    for n in [500, 2000].iter() {
        let student = setup_student(*n, IndexStrategy::LinearHash);
        let takes = setup_takes(*n, IndexStrategy::LinearHash);
        group.bench_with_input(BenchmarkId::new("nested_loop", n), n, |b, _| {
            b.iter(|| black_box(student.join_str("sid", "sid", &takes).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("indexed", n), n, |b, _| {
            b.iter(|| black_box(student.indexed_join(&["sid"], &["sid"], &takes).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_linear_hash_put,
    bench_select_where,
    bench_join
);
criterion_main!(benches);
