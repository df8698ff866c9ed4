//! Performance benchmarks for dispatch_core using Criterion.rs.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dispatch_core::config::DispatchConfig;
use dispatch_core::dispatch::{Dispatch, RideRequest};
use dispatch_core::ecs::DriverId;
use dispatch_core::geo::Coordinates;
use dispatch_core::presence::PresenceStore;
use dispatch_core::test_helpers::{coords_km_east, coords_km_north, test_dispatch, BASE};

fn spread_coords(i: u64, count: u64) -> Coordinates {
    // Spread drivers over a rough 10x10 km grid around the base point.
    let row = (i % 10) as f64;
    let col = (i / 10 % 10) as f64;
    let scale = 10.0 / (count as f64).sqrt().max(1.0);
    Coordinates::new(
        coords_km_north(row * scale).lat,
        coords_km_east(col * scale).lng,
    )
}

fn dispatch_with_pool(drivers: u64) -> Dispatch {
    let (mut dispatch, locations) = test_dispatch(DispatchConfig::default());
    for i in 0..drivers {
        let driver = DriverId(i + 1);
        let coords = spread_coords(i, drivers);
        locations.set(driver, coords);
        dispatch.driver_go_online(driver, coords).expect("online");
    }
    dispatch
}

fn bench_submit_with_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_ride_request");
    for drivers in [100u64, 1_000, 10_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(drivers),
            &drivers,
            |b, &drivers| {
                let mut dispatch = dispatch_with_pool(drivers);
                b.iter(|| {
                    let ride = dispatch
                        .submit_ride_request(RideRequest::instant(
                            BASE,
                            coords_km_north(4.0),
                            12.0,
                        ))
                        .expect("submit");
                    black_box(ride);
                });
            },
        );
    }
    group.finish();
}

fn bench_radius_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("available_within");
    for drivers in [1_000u64, 10_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(drivers),
            &drivers,
            |b, &drivers| {
                let mut store = PresenceStore::new();
                for i in 0..drivers {
                    store
                        .set_online(DriverId(i + 1), spread_coords(i, drivers), 0)
                        .expect("online");
                }
                b.iter(|| black_box(store.available_within(BASE, Some(5.0))));
            },
        );
    }
    group.finish();
}

fn bench_accept_with_sibling_sweep(c: &mut Criterion) {
    c.bench_function("accept_sweeps_100_siblings", |b| {
        b.iter_batched(
            || {
                let mut dispatch = dispatch_with_pool(100);
                let ride = dispatch
                    .submit_ride_request(RideRequest::instant(BASE, coords_km_north(4.0), 12.0))
                    .expect("submit");
                (dispatch, ride)
            },
            |(mut dispatch, ride)| {
                black_box(dispatch.accept(ride, DriverId(1)).expect("accept"));
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_submit_with_pool,
    bench_radius_query,
    bench_accept_with_sibling_sweep
);
criterion_main!(benches);
