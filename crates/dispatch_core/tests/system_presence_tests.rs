mod support;

use dispatch_core::broadcast::Notification;
use dispatch_core::dispatch::RideRequest;
use dispatch_core::ecs::{DriverId, RideStatus};
use dispatch_core::error::DispatchError;
use dispatch_core::test_helpers::{coords_km_east, coords_km_north, online_driver, test_dispatch, BASE};

use support::{fast_config, published};

#[test]
fn refresh_tick_resamples_and_republishes_coordinates() {
    let (mut dispatch, locations) = test_dispatch(fast_config());
    let driver = DriverId(1);
    online_driver(&mut dispatch, &locations, driver, coords_km_east(1.0));

    // The driver moves between ticks; the next tick picks it up.
    locations.set(driver, coords_km_east(3.0));
    dispatch.advance_by(30_000);

    let record = dispatch.presence(driver).expect("presence");
    assert_eq!(record.coordinates, coords_km_east(3.0));

    let presence_events: Vec<_> = published(&dispatch)
        .into_iter()
        .filter(|n| matches!(n, Notification::Presence { .. }))
        .collect();
    // One on go-online, one per tick.
    assert_eq!(presence_events.len(), 2);
}

#[test]
fn failed_sample_keeps_the_previous_coordinates() {
    let (mut dispatch, locations) = test_dispatch(fast_config());
    let driver = DriverId(1);
    online_driver(&mut dispatch, &locations, driver, coords_km_east(1.0));

    locations.clear(driver);
    dispatch.advance_by(30_000);

    let record = dispatch.presence(driver).expect("presence");
    assert!(record.online);
    assert_eq!(record.coordinates, coords_km_east(1.0));
    assert_eq!(record.missed_refreshes, 1);
}

#[test]
fn consecutive_missed_refreshes_force_the_driver_offline() {
    let (mut dispatch, locations) = test_dispatch(fast_config());
    let driver = DriverId(1);
    online_driver(&mut dispatch, &locations, driver, coords_km_east(1.0));

    locations.clear(driver);
    // max_missed_refreshes defaults to 3, one miss per tick.
    dispatch.advance_by(90_000);

    let record = dispatch.presence(driver).expect("presence");
    assert!(!record.online);
    assert!(!record.available);

    // The tick chain is dead: nothing more is published.
    let before = dispatch.notifications().len();
    dispatch.advance_by(120_000);
    assert_eq!(dispatch.notifications().len(), before);
}

#[test]
fn a_strict_miss_limit_offlines_after_a_single_failure() {
    let (mut dispatch, locations) = test_dispatch(fast_config().with_max_missed_refreshes(1));
    let driver = DriverId(1);
    online_driver(&mut dispatch, &locations, driver, coords_km_east(1.0));

    locations.clear(driver);
    dispatch.advance_by(30_000);
    assert!(!dispatch.presence(driver).expect("presence").online);
}

#[test]
fn a_successful_sample_resets_the_miss_count() {
    let (mut dispatch, locations) = test_dispatch(fast_config());
    let driver = DriverId(1);
    online_driver(&mut dispatch, &locations, driver, coords_km_east(1.0));

    locations.clear(driver);
    dispatch.advance_by(60_000);
    assert_eq!(dispatch.presence(driver).expect("presence").missed_refreshes, 2);

    locations.set(driver, coords_km_east(2.0));
    dispatch.advance_by(30_000);
    let record = dispatch.presence(driver).expect("presence");
    assert_eq!(record.missed_refreshes, 0);
    assert!(record.online);
}

#[test]
fn going_offline_stops_the_refresh_chain_within_one_interval() {
    let (mut dispatch, locations) = test_dispatch(fast_config());
    let driver = DriverId(1);
    online_driver(&mut dispatch, &locations, driver, coords_km_east(1.0));

    dispatch.driver_go_offline(driver).expect("offline");
    let before = dispatch.notifications().len();
    dispatch.advance_by(300_000);
    assert_eq!(dispatch.notifications().len(), before);
}

#[test]
fn offline_online_flip_does_not_fork_the_tick_chain() {
    let (mut dispatch, locations) = test_dispatch(fast_config());
    let driver = DriverId(1);
    online_driver(&mut dispatch, &locations, driver, coords_km_east(1.0));

    // Flip within one interval: the original chain is still scheduled.
    dispatch.advance_by(10_000);
    dispatch.driver_go_offline(driver).expect("offline");
    dispatch.driver_go_online(driver, coords_km_east(1.0)).expect("online again");

    let before = published(&dispatch)
        .iter()
        .filter(|n| matches!(n, Notification::Presence { .. }))
        .count();
    dispatch.advance_by(30_000);
    let after = published(&dispatch)
        .iter()
        .filter(|n| matches!(n, Notification::Presence { .. }))
        .count();
    // Exactly one tick fired in the window, not two.
    assert_eq!(after - before, 1);
}

#[test]
fn offline_driver_mid_decision_simply_stops_matching() {
    let (mut dispatch, locations) = test_dispatch(fast_config());
    let wanderer = DriverId(1);
    online_driver(&mut dispatch, &locations, wanderer, coords_km_east(1.0));

    let ride = dispatch
        .submit_ride_request(RideRequest::instant(BASE, coords_km_north(3.0), 10.0))
        .expect("submit");
    dispatch.express_interest(ride, wanderer).expect("interest");

    // The driver vanishes; their entry stays but they are out of the pool.
    dispatch.driver_go_offline(wanderer).expect("offline");
    assert_eq!(dispatch.queue_entries(ride).len(), 1);
    assert_eq!(dispatch.ride(ride).expect("ride").status, RideStatus::Pending);

    let second = dispatch
        .submit_ride_request(RideRequest::instant(BASE, coords_km_north(3.0), 10.0))
        .expect("second");
    assert!(dispatch.queue_entries(second).is_empty());
}

#[test]
fn coordinate_updates_require_an_online_driver() {
    let (mut dispatch, _locations) = test_dispatch(fast_config());
    let driver = DriverId(7);
    assert_eq!(
        dispatch.update_driver_coordinates(driver, BASE),
        Err(DispatchError::NotOnline(driver))
    );
    assert_eq!(dispatch.driver_go_offline(driver), Err(DispatchError::UnknownDriver(driver)));
}
