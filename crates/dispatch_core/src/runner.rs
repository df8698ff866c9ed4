//! Event loop: advances the clock and routes events into the ECS.
//!
//! Clock progression and event routing happen here, outside systems. Each
//! step pops the next event from [DispatchClock], inserts it as
//! [CurrentEvent], then runs the schedule. Systems are gated by event kind
//! so only the relevant one does work per step.

use bevy_ecs::prelude::{Res, Schedule, World};
use bevy_ecs::schedule::IntoSystemConfigs;

use crate::clock::{CurrentEvent, DispatchClock, EventKind};
use crate::systems::{
    presence_refresh::presence_refresh_system, rematch::rematch_system,
    ride_timeout::ride_timeout_system,
};

fn is_presence_refresh_tick(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::PresenceRefreshTick)
        .unwrap_or(false)
}

fn is_pending_ride_timeout(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::PendingRideTimeout)
        .unwrap_or(false)
}

fn is_rematch_sweep(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::RematchSweep)
        .unwrap_or(false)
}

/// Builds the dispatch schedule: every clock-driven system, each gated on
/// its event kind.
pub fn dispatch_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems((
        presence_refresh_system.run_if(is_presence_refresh_tick),
        ride_timeout_system.run_if(is_pending_ride_timeout),
        rematch_system.run_if(is_rematch_sweep),
    ));
    schedule
}

/// Runs one step: pops the next event, inserts it as [CurrentEvent], then
/// runs the schedule. Returns `false` if the clock was empty.
pub fn run_next_event(world: &mut World, schedule: &mut Schedule) -> bool {
    let event = match world.resource_mut::<DispatchClock>().pop_next() {
        Some(e) => e,
        None => return false,
    };
    world.insert_resource(CurrentEvent(event));
    schedule.run(world);
    true
}

/// Processes every event due at or before `until_ms`, then settles the clock
/// at `until_ms`. Returns the number of events processed.
pub fn run_due_events(world: &mut World, schedule: &mut Schedule, until_ms: u64) -> usize {
    let mut steps = 0;
    loop {
        let due = world
            .resource::<DispatchClock>()
            .next_event_time()
            .is_some_and(|ts| ts <= until_ms);
        if !due || !run_next_event(world, schedule) {
            break;
        }
        steps += 1;
    }
    world.resource_mut::<DispatchClock>().advance_to(until_ms);
    steps
}

/// Drains the event queue up to `max_steps`. Returns the steps executed.
pub fn run_until_empty(world: &mut World, schedule: &mut Schedule, max_steps: usize) -> usize {
    let mut steps = 0;
    while steps < max_steps && run_next_event(world, schedule) {
        steps += 1;
    }
    steps
}
