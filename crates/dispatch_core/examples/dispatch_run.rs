//! End-to-end demo: a few drivers come online, a rider requests a ride,
//! drivers race to accept, and the trip runs to completion.
//!
//! Run with `cargo run --example dispatch_run`, optionally with
//! `RUST_LOG=dispatch_core=debug` for the internal log stream.

use dispatch_core::config::DispatchConfig;
use dispatch_core::dispatch::RideRequest;
use dispatch_core::ecs::DriverId;
use dispatch_core::lifecycle::AcceptOutcome;
use dispatch_core::test_helpers::{coords_km_east, coords_km_north, test_dispatch, BASE};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (mut dispatch, locations) = test_dispatch(DispatchConfig::default());
    let rx = dispatch.subscribe();

    for (i, km_east) in [0.8, 2.5, 4.0].into_iter().enumerate() {
        let driver = DriverId(i as u64 + 1);
        let coords = coords_km_east(km_east);
        locations.set(driver, coords);
        dispatch.driver_go_online(driver, coords).expect("driver online");
    }

    let ride = dispatch
        .submit_ride_request(RideRequest::instant(BASE, coords_km_north(6.0), 17.50))
        .expect("ride submitted");
    println!("ride {ride:?} matched {} candidates", dispatch.queue_entries(ride).len());

    // Two drivers race for the same ride; exactly one wins.
    dispatch.express_interest(ride, DriverId(1)).expect("interest");
    dispatch.express_interest(ride, DriverId(2)).expect("interest");
    for driver in [DriverId(2), DriverId(1)] {
        match dispatch.accept(ride, driver).expect("accept") {
            AcceptOutcome::Committed { expired } => {
                println!("{driver:?} won the ride, {} siblings expired", expired.len())
            }
            AcceptOutcome::AlreadyCommitted => println!("{driver:?} already has this ride"),
            AcceptOutcome::AlreadyTaken => println!("{driver:?} was too late"),
        }
    }

    dispatch.start_trip(ride).expect("trip started");
    dispatch.advance_by(10 * 60 * 1000);
    dispatch.complete_trip(ride).expect("trip completed");

    println!("--- notification stream ---");
    for envelope in rx.try_iter() {
        println!("#{:03} {:?}", envelope.seq, envelope.event);
    }
}
