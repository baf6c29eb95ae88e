// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use chrono::{TimeZone, Utc};
use cinder_core::{ProfileTree, PutInput, SampleKey};
use cinder_storage::{Segment, SegmentConfig, StorageBuilder};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const T0: i64 = 1_700_000_000;

fn profile() -> ProfileTree {
    ProfileTree::from_collapsed(
        "main;net::serve;handler::checkout;db::query 120\n\
         main;net::serve;handler::checkout;render 45\n\
         main;net::serve;handler::search 80\n\
         main;gc 12",
    )
    .unwrap()
}

fn bench_put_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("put_throughput");
    let value = profile();

    for apps in [1usize, 10, 100].iter() {
        group.throughput(Throughput::Elements(1_000));
        group.bench_with_input(BenchmarkId::from_parameter(apps), apps, |b, &apps| {
            let keys: Vec<SampleKey> = (0..apps)
                .map(|i| {
                    SampleKey::new(format!("app-{}", i))
                        .unwrap()
                        .with_label("env", "prod")
                        .unwrap()
                })
                .collect();

            b.iter(|| {
                let storage = StorageBuilder::new().build().unwrap();
                for i in 0..1_000i64 {
                    let key = keys[i as usize % apps].clone();
                    let start = Utc.timestamp_opt(T0 + i * 10, 0).unwrap();
                    let end = Utc.timestamp_opt(T0 + i * 10 + 10, 0).unwrap();
                    let input = PutInput::new(key, value.clone(), start, end);
                    storage.put(black_box(&input)).unwrap();
                }
            });
        });
    }

    group.finish();
}

fn bench_bucket_planning(c: &mut Criterion) {
    let mut group = c.benchmark_group("bucket_planning");

    for span_secs in [10i64, 1_000, 100_000].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(span_secs),
            span_secs,
            |b, &span_secs| {
                let start = Utc.timestamp_opt(T0, 0).unwrap();
                let end = Utc.timestamp_opt(T0 + span_secs, 0).unwrap();
                b.iter(|| {
                    let mut segment = Segment::new(SegmentConfig::default());
                    let plan = segment.bucket(start, end, 1).unwrap();
                    black_box(plan.count())
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_put_throughput, bench_bucket_planning);
criterion_main!(benches);
