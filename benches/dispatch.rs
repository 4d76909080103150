//! Dispatch benchmarks
//!
//! Measures the bridge's own overhead per forwarded call and per creation,
//! using the in-process host so interpreter cost stays out of the numbers.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pyproxy::testing::fixtures::{self, Car};
use pyproxy::testing::ScriptedRuntime;
use pyproxy::{args, Bridge, BridgeConfig, ForeignRuntime, Value, ValueMarshaller};

fn bridge() -> Bridge {
    Bridge::new(fixtures::shared_runtime(), BridgeConfig::isolated())
}

fn bench_forwarded_call(c: &mut Criterion) {
    let bridge = bridge();
    let car = bridge
        .create_proxy_instance::<dyn Car>(&args!["BENCH-1"])
        .unwrap();

    c.bench_function("forwarded_getter", |b| {
        b.iter(|| black_box(car.get_number_plate().unwrap()))
    });

    c.bench_function("forwarded_setter", |b| {
        b.iter(|| car.set_number_plate(black_box("BENCH-2")).unwrap())
    });

    c.bench_function("forwarded_multi_value", |b| {
        b.iter(|| black_box(car.specs().unwrap()))
    });
}

fn bench_creation(c: &mut Criterion) {
    let bridge = bridge();
    // Warm the state, binding and proxy type caches.
    let _ = bridge.create_proxy_instance::<dyn Car>(&[]).unwrap();

    c.bench_function("create_proxy_instance", |b| {
        b.iter(|| black_box(bridge.create_proxy_instance::<dyn Car>(&args!["NEW"]).unwrap()))
    });

    c.bench_function("create_instance_coerced", |b| {
        b.iter(|| {
            let building: fixtures::Building = bridge
                .create_instance("Building", "Building", &args![1, "name", "address"])
                .unwrap();
            black_box(building)
        })
    });
}

fn bench_marshalling(c: &mut Criterion) {
    let mut group = c.benchmark_group("marshal_args");
    let state = ScriptedRuntime::new().create_state().unwrap();

    for count in [1usize, 4, 16] {
        let values: Vec<Value> = (0..count as i64).map(Value::Int).collect();
        group.bench_with_input(BenchmarkId::from_parameter(count), &values, |b, values| {
            b.iter(|| {
                let marshalled = ValueMarshaller::to_foreign(state.as_ref(), values).unwrap();
                black_box(ValueMarshaller::to_native(state.as_ref(), marshalled.positional()).unwrap())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_forwarded_call, bench_creation, bench_marshalling);
criterion_main!(benches);
