//! Performance benchmarks for file manager operations.
//!
//! These benchmarks measure the hot paths in the daemon:
//! - Path parsing and name validation
//! - Directory listing
//! - Full command dispatch including envelope serialization

use std::fs;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use daemon::files::{is_valid_file_name, is_valid_folder_name, FileStore, RelativePath};
use daemon::i18n::Catalog;
use daemon::service::FileManagerService;
use protocol::messages::ListRequest;
use protocol::Command;
use tempfile::TempDir;

/// Benchmark path parsing and the name grammars.
fn bench_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("validation");

    group.bench_function("parse_nested_path", |b| {
        b.iter(|| RelativePath::parse(black_box("/docs/reports/2024/q1/summary.pdf")));
    });

    group.bench_function("parse_traversal", |b| {
        b.iter(|| RelativePath::parse(black_box("docs/../../etc/passwd")));
    });

    group.bench_function("folder_name", |b| {
        b.iter(|| is_valid_folder_name(black_box("Quarterly Reports_2024-final")));
    });

    group.bench_function("file_name", |b| {
        b.iter(|| is_valid_file_name(black_box("Quarterly Report_2024-final.pdf")));
    });

    group.finish();
}

fn populated_root(entries: usize) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    for i in 0..entries {
        if i % 4 == 0 {
            fs::create_dir(temp_dir.path().join(format!("folder{:04}", i))).unwrap();
        } else {
            fs::write(temp_dir.path().join(format!("file{:04}.txt", i)), "data").unwrap();
        }
    }
    temp_dir
}

/// Benchmark listing directories of increasing size.
fn bench_listing(c: &mut Criterion) {
    let mut group = c.benchmark_group("listing");

    for entries in [10usize, 100, 1000] {
        let temp_dir = populated_root(entries);
        let store = FileStore::new(temp_dir.path());

        group.throughput(Throughput::Elements(entries as u64));
        group.bench_with_input(BenchmarkId::new("confined", entries), &store, |b, store| {
            b.iter(|| store.list(&RelativePath::root()).unwrap());
        });

        let open = store.clone().confine_symlinks(false);
        group.bench_with_input(BenchmarkId::new("unconfined", entries), &open, |b, store| {
            b.iter(|| store.list(&RelativePath::root()).unwrap());
        });
    }

    group.finish();
}

/// Benchmark a list command end to end, as the daemon would answer it.
fn bench_dispatch(c: &mut Criterion) {
    let temp_dir = populated_root(100);
    let service =
        FileManagerService::new(FileStore::new(temp_dir.path()), Arc::new(Catalog::english()));
    let command = Command::List(ListRequest::default());

    c.bench_function("dispatch_list_to_json", |b| {
        b.iter(|| service.dispatch(black_box(&command)).to_json().unwrap());
    });
}

criterion_group!(benches, bench_validation, bench_listing, bench_dispatch);
criterion_main!(benches);
