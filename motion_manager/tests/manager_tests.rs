//! Registry, checkout and resolution behavior of the motion manager.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak, mpsc};
use std::time::Duration;

use motion::consts::{MAX_MOTIONS, NUM_FRAMES};
use motion::event::{EventKind, EventLog};
use motion::ids::{AccessorId, McId};
use motion::output::{OutputCmd, OutputPid};
use motion::priority;
use motion_manager::arbitration::OutputFrames;
use motion_manager::{
    BoxError, CommandCore, MotionCommand, MotionError, MotionManager, OutputSink, PidUpdate, PostureMotion,
    motion_object,
};

const MAIN: AccessorId = AccessorId::MAIN;
const MOTION: AccessorId = AccessorId::MOTION;

// ─── Test command ───────────────────────────────────────────────────

type Hook = Box<dyn FnMut(McId, &mut OutputSink) + Send>;

#[derive(Default)]
struct Probe {
    updates: AtomicU32,
    stops: AtomicU32,
    drops: AtomicU32,
}

impl Probe {
    fn updates(&self) -> u32 {
        self.updates.load(Ordering::SeqCst)
    }
    fn stops(&self) -> u32 {
        self.stops.load(Ordering::SeqCst)
    }
    fn drops(&self) -> u32 {
        self.drops.load(Ordering::SeqCst)
    }
}

struct Scripted {
    core: CommandCore,
    probe: Arc<Probe>,
    outputs: Vec<(usize, OutputCmd)>,
    pids: Vec<(usize, OutputPid)>,
    alive_for: Option<u32>,
    fail_start: bool,
    hook: Option<Hook>,
    updates: u32,
}

impl Scripted {
    fn new(probe: &Arc<Probe>) -> Self {
        Self {
            core: CommandCore::new(),
            probe: Arc::clone(probe),
            outputs: Vec::new(),
            pids: Vec::new(),
            alive_for: None,
            fail_start: false,
            hook: None,
            updates: 0,
        }
    }

    fn output(mut self, channel: usize, cmd: OutputCmd) -> Self {
        self.outputs.push((channel, cmd));
        self
    }

    fn pid(mut self, joint: usize, pid: OutputPid) -> Self {
        self.pids.push((joint, pid));
        self
    }

    fn alive_for(mut self, updates: u32) -> Self {
        self.alive_for = Some(updates);
        self
    }

    fn failing(mut self) -> Self {
        self.fail_start = true;
        self
    }

    fn hook(mut self, hook: impl FnMut(McId, &mut OutputSink) + Send + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }
}

impl MotionCommand for Scripted {
    fn core(&self) -> &CommandCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut CommandCore {
        &mut self.core
    }
    fn update_outputs(&mut self, sink: &mut OutputSink) -> u32 {
        self.updates += 1;
        self.probe.updates.fetch_add(1, Ordering::SeqCst);
        for (channel, cmd) in &self.outputs {
            sink.set_output(*channel, *cmd);
        }
        for (joint, pid) in &self.pids {
            sink.set_pid(*joint, *pid);
        }
        let id = self.id();
        if let Some(hook) = &mut self.hook {
            hook(id, sink);
        }
        self.outputs.len() as u32
    }
    fn is_dirty(&self) -> bool {
        true
    }
    fn is_alive(&self) -> bool {
        self.alive_for.is_none_or(|n| self.updates < n)
    }
    fn do_start(&mut self) -> Result<(), BoxError> {
        if self.fail_start {
            return Err("actuator not calibrated".into());
        }
        Ok(())
    }
    fn do_stop(&mut self) {
        self.probe.stops.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for Scripted {
    fn drop(&mut self) {
        self.probe.drops.fetch_add(1, Ordering::SeqCst);
    }
}

fn add(mgr: &MotionManager, cmd: Scripted, prio: f32) -> McId {
    let id = mgr.add_persistent_motion(MAIN, motion_object(cmd), prio).unwrap();
    assert!(id.is_valid());
    id
}

fn constant(probe: &Arc<Probe>, channel: usize, value: f32) -> Scripted {
    Scripted::new(probe).output(channel, OutputCmd::new(value))
}

fn tick(mgr: &MotionManager) -> OutputFrames {
    mgr.get_outputs(MOTION).unwrap()
}

fn iterate(mgr: &MotionManager, accessor: AccessorId) -> Vec<McId> {
    let mut ids = Vec::new();
    let mut id = mgr.begin(accessor);
    while id != mgr.end() {
        ids.push(id);
        id = mgr.next(accessor, id);
    }
    ids
}

// ─── Registry ───────────────────────────────────────────────────────

#[test]
fn iteration_visits_each_motion_once_in_registration_order() {
    let mgr = MotionManager::new();
    let probe = Arc::new(Probe::default());
    let ids: Vec<McId> = (0..5).map(|i| add(&mgr, constant(&probe, i, 1.0), priority::STD)).collect();

    mgr.remove_motion(MAIN, ids[2]);
    let expected = vec![ids[0], ids[1], ids[3], ids[4]];
    assert_eq!(iterate(&mgr, MAIN), expected);
    assert_eq!(mgr.motions(MAIN), expected);
    assert_eq!(mgr.size(), 4);

    // A re-used slot is appended, not inserted in place.
    let late = add(&mgr, constant(&probe, 9, 1.0), priority::STD);
    assert_eq!(late.slot(), ids[2].slot());
    assert_eq!(iterate(&mgr, MAIN).last(), Some(&late));
}

#[test]
fn remove_is_idempotent() {
    let events = Arc::new(EventLog::new());
    let mgr = MotionManager::new().with_event_sink(events.clone());
    let probe = Arc::new(Probe::default());
    let id = add(&mgr, constant(&probe, 0, 1.0), priority::STD);
    let other = add(&mgr, constant(&probe, 1, 1.0), priority::STD);

    mgr.remove_motion(MAIN, id);
    mgr.remove_motion(MAIN, id);
    mgr.remove_motion(MOTION, id);
    mgr.remove_motion(MAIN, McId::new(40, 7));
    mgr.remove_motion(MAIN, McId::INVALID);

    assert_eq!(mgr.size(), 1);
    assert!(mgr.is_registered(other));
    assert_eq!(probe.stops(), 1);
    let deactivations = events
        .for_source(id)
        .iter()
        .filter(|e| e.kind == EventKind::Deactivate)
        .count();
    assert_eq!(deactivations, 1);
}

#[test]
fn exhaustion_returns_invalid() {
    let mgr = MotionManager::new();
    let probe = Arc::new(Probe::default());
    for _ in 0..MAX_MOTIONS {
        add(&mgr, Scripted::new(&probe), priority::STD);
    }

    let overflow = Arc::new(Probe::default());
    let id = mgr
        .add_persistent_motion(MAIN, motion_object(Scripted::new(&overflow)), priority::STD)
        .unwrap();
    assert_eq!(id, McId::INVALID);
    assert_eq!(mgr.size(), MAX_MOTIONS);
    // The refused object had no other holder.
    assert_eq!(overflow.drops(), 1);
}

#[test]
fn failed_start_rolls_back() {
    let events = Arc::new(EventLog::new());
    let mgr = MotionManager::new().with_event_sink(events.clone());
    let probe = Arc::new(Probe::default());

    let err = mgr
        .add_prunable_motion(MAIN, motion_object(Scripted::new(&probe).failing()), priority::STD)
        .unwrap_err();
    let MotionError::StartFailed { id, source } = err else {
        panic!("expected StartFailed");
    };
    assert_eq!(source.to_string(), "actuator not calibrated");
    assert!(!mgr.is_registered(id));
    assert_eq!(mgr.size(), 0);
    assert_eq!(probe.drops(), 1);
    assert_eq!(probe.stops(), 0);
    assert!(events.is_empty());

    // The slot is free again.
    let next = add(&mgr, Scripted::new(&probe), priority::STD);
    assert_eq!(next.slot(), id.slot());
    assert_ne!(next, id);
}

#[test]
fn motion_in_transit_is_skipped_until_attached() {
    let mgr = MotionManager::new();
    let probe = Arc::new(Probe::default());
    let first = add(&mgr, Scripted::new(&probe), priority::STD);
    let second = add(&mgr, Scripted::new(&probe), priority::STD);

    assert_eq!(iterate(&mgr, MAIN), vec![first, second]);
    assert!(iterate(&mgr, MOTION).is_empty());

    // Checkout performs the one-time resolution for that accessor.
    assert!(mgr.checkout_motion(MOTION, second, false).is_some());
    mgr.checkin_motion(MOTION, second).unwrap();
    assert_eq!(iterate(&mgr, MOTION), vec![second]);

    assert_eq!(mgr.process_pending(MOTION), 1);
    assert_eq!(iterate(&mgr, MOTION), vec![first, second]);
}

// ─── Resolution ─────────────────────────────────────────────────────

#[test]
fn higher_priority_wins_in_any_order() {
    let probe = Arc::new(Probe::default());
    for low_first in [true, false] {
        let mgr = MotionManager::new();
        if low_first {
            add(&mgr, constant(&probe, 0, 1.0), 5.0);
            add(&mgr, constant(&probe, 0, 2.0), 10.0);
        } else {
            add(&mgr, constant(&probe, 0, 2.0), 10.0);
            add(&mgr, constant(&probe, 0, 1.0), 5.0);
        }
        let frames = tick(&mgr);
        for frame in frames {
            assert_eq!(frame[0], 2.0);
        }
    }
}

#[test]
fn equal_priorities_blend_by_weight() {
    let probe = Arc::new(Probe::default());

    let mgr = MotionManager::new();
    add(&mgr, Scripted::new(&probe).output(0, OutputCmd::weighted(0.0, 1.0)), 5.0);
    add(&mgr, Scripted::new(&probe).output(0, OutputCmd::weighted(10.0, 1.0)), 5.0);
    assert_eq!(tick(&mgr)[0][0], 5.0);

    let mgr = MotionManager::new();
    add(&mgr, Scripted::new(&probe).output(0, OutputCmd::weighted(0.0, 1.0)), 5.0);
    add(&mgr, Scripted::new(&probe).output(0, OutputCmd::weighted(10.0, 3.0)), 5.0);
    assert_eq!(tick(&mgr)[0][0], 7.5);
}

#[test]
fn removed_driver_leaves_value_held() {
    let mgr = MotionManager::new();
    let probe = Arc::new(Probe::default());
    let id = add(&mgr, constant(&probe, 3, 0.8), priority::STD);
    assert_eq!(tick(&mgr)[NUM_FRAMES - 1][3], 0.8);

    mgr.remove_motion(MAIN, id);
    let frames = tick(&mgr);
    assert!(frames.iter().all(|frame| frame[3] == 0.8));
    assert_eq!(mgr.committed_output(3), Some(0.8));
}

#[test]
fn zero_weight_tier_holds_without_falling_through() {
    let mgr = MotionManager::new();
    let probe = Arc::new(Probe::default());
    let first = add(&mgr, constant(&probe, 0, 3.0), priority::LOW);
    tick(&mgr);
    mgr.remove_motion(MAIN, first);

    add(&mgr, constant(&probe, 0, 1.0), priority::LOW);
    add(&mgr, Scripted::new(&probe).output(0, OutputCmd::weighted(9.0, 0.0)), priority::HIGH);
    assert_eq!(tick(&mgr)[0][0], 3.0);
}

#[test]
fn ignored_priority_never_drives() {
    let mgr = MotionManager::new();
    let probe = Arc::new(Probe::default());
    add(&mgr, constant(&probe, 0, 4.0), priority::IGNORED);
    assert_eq!(tick(&mgr)[0][0], 0.0);
    add(&mgr, constant(&probe, 0, 1.0), priority::BACKGROUND);
    assert_eq!(tick(&mgr)[0][0], 1.0);
}

#[test]
fn higher_priority_override_and_release() {
    let mgr = MotionManager::new();
    let probe = Arc::new(Probe::default());
    add(&mgr, constant(&probe, 0, 1.0), priority::STD);
    let b = add(&mgr, constant(&probe, 0, -1.0), priority::HIGH);

    assert_eq!(tick(&mgr)[0][0], -1.0);
    mgr.remove_motion(MAIN, b);
    assert_eq!(tick(&mgr)[0][0], 1.0);
}

#[test]
fn priority_change_applies_next_tick() {
    let mgr = MotionManager::new();
    let probe = Arc::new(Probe::default());
    let a = add(&mgr, constant(&probe, 0, 1.0), priority::LOW);
    add(&mgr, constant(&probe, 0, 2.0), priority::STD);
    assert_eq!(tick(&mgr)[0][0], 2.0);

    assert!(mgr.set_priority(a, priority::HIGH));
    assert_eq!(mgr.get_priority(a), Some(priority::HIGH));
    assert_eq!(tick(&mgr)[0][0], 1.0);
}

#[test]
fn per_frame_requests_hold_between_frames() {
    let mgr = MotionManager::new();
    let probe = Arc::new(Probe::default());
    add(
        &mgr,
        Scripted::new(&probe).hook(|_, sink| {
            sink.set_output_frame(2, OutputCmd::new(0.5), 1);
        }),
        priority::STD,
    );
    let frames = tick(&mgr);
    assert_eq!(frames[0][2], 0.0);
    assert!(frames[1..].iter().all(|frame| frame[2] == 0.5));
}

// ─── Lifetime ───────────────────────────────────────────────────────

#[test]
fn remove_destructs_payload_exactly_once() {
    let mgr = MotionManager::new();
    let probe = Arc::new(Probe::default());
    let obj = motion_object(Scripted::new(&probe));
    let client = obj.clone();

    let id = mgr.add_persistent_motion(MAIN, obj, priority::STD).unwrap();
    mgr.process_pending(MOTION);
    // Client, MAIN and MOTION.
    assert_eq!(client.ref_count(), 3);

    mgr.remove_motion(MAIN, id);
    assert_eq!(client.ref_count(), 1);
    assert_eq!(probe.stops(), 1);
    assert_eq!(probe.drops(), 0);

    assert!(client.release());
    assert_eq!(probe.drops(), 1);
}

#[test]
fn remove_without_client_handle_destructs_immediately() {
    let mgr = MotionManager::new();
    let probe = Arc::new(Probe::default());
    let id = add(&mgr, Scripted::new(&probe), priority::STD);
    tick(&mgr);

    mgr.remove_motion(MOTION, id);
    assert_eq!(probe.drops(), 1);
    assert_eq!(probe.stops(), 1);
}

#[test]
fn prunable_motion_is_removed_on_next_evaluation() {
    let events = Arc::new(EventLog::new());
    let mgr = MotionManager::new().with_event_sink(events.clone());
    let probe = Arc::new(Probe::default());
    let id = mgr
        .add_prunable_motion(MAIN, motion_object(constant(&probe, 0, 1.0).alive_for(2)), priority::STD)
        .unwrap();

    tick(&mgr);
    tick(&mgr);
    assert_eq!(probe.updates(), 2);
    assert!(mgr.is_registered(id));

    tick(&mgr);
    assert_eq!(probe.updates(), 2);
    assert!(!mgr.is_registered(id));
    assert_eq!(probe.stops(), 1);
    assert_eq!(probe.drops(), 1);

    tick(&mgr);
    assert_eq!(probe.updates(), 2);
    assert_eq!(mgr.committed_output(0), Some(1.0));

    let kinds: Vec<_> = events.for_source(id).iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![EventKind::Activate, EventKind::Deactivate]);
}

#[test]
fn persistent_motion_survives_death() {
    let mgr = MotionManager::new();
    let probe = Arc::new(Probe::default());
    let id = add(&mgr, Scripted::new(&probe).alive_for(1), priority::STD);
    for _ in 0..3 {
        tick(&mgr);
    }
    assert!(mgr.is_registered(id));
    assert_eq!(probe.updates(), 3);
}

#[test]
fn completion_posts_status_event() {
    let events = Arc::new(EventLog::new());
    let mgr = MotionManager::new().with_event_sink(events.clone());
    let posture = PostureMotion::new()
        .with_target(0, OutputCmd::new(1.0))
        .with_lifetime(1)
        .with_completion_status();
    let id = mgr
        .add_prunable_motion(MAIN, motion_object(posture), priority::STD)
        .unwrap();

    tick(&mgr);
    tick(&mgr);
    let kinds: Vec<_> = events.for_source(id).iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![EventKind::Activate, EventKind::Status, EventKind::Deactivate]
    );
    assert_eq!(events.for_source(id)[1].tick, 0);
}

// ─── Checkout ───────────────────────────────────────────────────────

#[test]
fn checkin_without_checkout_is_an_error() {
    let mgr = MotionManager::new();
    let probe = Arc::new(Probe::default());
    let id = add(&mgr, Scripted::new(&probe), priority::STD);

    assert!(matches!(
        mgr.checkin_motion(MAIN, id),
        Err(MotionError::NotCheckedOut { accessor: AccessorId::MAIN, .. })
    ));
    // Stale ids are ignored.
    assert!(mgr.checkin_motion(MAIN, McId::new(50, 3)).is_ok());
}

#[test]
fn checkout_is_recursive_per_accessor() {
    let mgr = MotionManager::new();
    let probe = Arc::new(Probe::default());
    let id = add(&mgr, Scripted::new(&probe), priority::STD);

    assert!(mgr.checkout_motion(MAIN, id, true).is_some());
    assert!(mgr.checkout_motion(MAIN, id, false).is_some());
    assert!(mgr.checkout_motion(MOTION, id, false).is_none());

    mgr.checkin_motion(MAIN, id).unwrap();
    assert!(mgr.checkout_motion(MOTION, id, false).is_none());
    mgr.checkin_motion(MAIN, id).unwrap();

    assert!(mgr.checkout_motion(MOTION, id, false).is_some());
    mgr.checkin_motion(MOTION, id).unwrap();
}

#[test]
fn typed_checkout_gives_mutable_access() {
    let mgr = MotionManager::new();
    let id = mgr
        .add_persistent_motion(
            MAIN,
            motion_object(PostureMotion::new().with_target(0, OutputCmd::new(1.0))),
            priority::STD,
        )
        .unwrap();
    tick(&mgr);

    {
        let posture = mgr.checkout::<PostureMotion>(MAIN, id).unwrap();
        assert_eq!(posture.id(), id);
        let mut cmd = posture.lock().unwrap();
        assert_eq!(cmd.ticks(), 1);
        cmd.set_target(0, OutputCmd::new(-0.5));
    }
    assert_eq!(tick(&mgr)[0][0], -0.5);

    // Wrong type is refused and leaves the motion unlocked.
    let probe = Arc::new(Probe::default());
    let other = add(&mgr, Scripted::new(&probe), priority::STD);
    assert!(mgr.checkout::<PostureMotion>(MAIN, other).is_none());
    assert!(mgr.try_checkout::<Scripted>(MOTION, other).is_some());
}

#[test]
fn try_checkout_is_rejected_while_other_accessor_holds() {
    let mgr = MotionManager::new();
    let probe = Arc::new(Probe::default());
    let id = add(&mgr, Scripted::new(&probe), priority::STD);

    let held = mgr.checkout::<Scripted>(MAIN, id).unwrap();
    assert!(mgr.try_checkout::<Scripted>(MOTION, id).is_none());
    drop(held);
    assert!(mgr.try_checkout::<Scripted>(MOTION, id).is_some());
}

#[test]
fn tick_waits_for_checked_out_motion() {
    let mgr = Arc::new(MotionManager::new());
    let probe = Arc::new(Probe::default());
    let id = add(&mgr, constant(&probe, 0, 1.0), priority::STD);
    let held = mgr.checkout::<Scripted>(MAIN, id).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let worker = {
        let mgr = Arc::clone(&mgr);
        let done = Arc::clone(&done);
        std::thread::spawn(move || {
            mgr.get_outputs(MOTION).unwrap();
            done.store(true, Ordering::SeqCst);
        })
    };

    std::thread::sleep(Duration::from_millis(30));
    assert!(!done.load(Ordering::SeqCst));
    assert_eq!(probe.updates(), 0);

    drop(held);
    worker.join().unwrap();
    assert!(done.load(Ordering::SeqCst));
    assert_eq!(probe.updates(), 1);
}

#[test]
fn nested_typed_checkout_while_payload_is_held() {
    let mgr = MotionManager::new();
    let probe = Arc::new(Probe::default());
    let id = add(&mgr, Scripted::new(&probe), priority::STD);

    let outer = mgr.checkout::<Scripted>(MAIN, id).unwrap();
    let payload = outer.lock().unwrap();

    let inner = mgr.try_checkout::<Scripted>(MAIN, id);
    assert!(inner.is_some());
    assert!(mgr.try_checkout::<PostureMotion>(MAIN, id).is_none());
    assert!(mgr.try_checkout::<Scripted>(MOTION, id).is_none());
    drop(inner);

    drop(payload);
    drop(outer);
    assert!(mgr.try_checkout::<Scripted>(MOTION, id).is_some());
}

// ─── Re-entrancy ────────────────────────────────────────────────────

#[test]
fn command_may_call_back_into_manager_during_update() {
    let mgr = Arc::new(MotionManager::new());
    let probe = Arc::new(Probe::default());
    let results = Arc::new(AtomicU32::new(0));

    let weak: Weak<MotionManager> = Arc::downgrade(&mgr);
    let seen = Arc::clone(&results);
    let id = add(
        &mgr,
        Scripted::new(&probe).hook(move |id, _| {
            let Some(mgr) = weak.upgrade() else { return };
            if mgr.set_output(id, 7, OutputCmd::new(2.0)) {
                seen.fetch_add(1, Ordering::SeqCst);
            }
            if mgr.checkout_motion(MOTION, id, false).is_some() {
                seen.fetch_add(1, Ordering::SeqCst);
                mgr.checkin_motion(MOTION, id).unwrap();
            }
            if mgr.get_priority(id) == Some(priority::STD) {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        }),
        priority::STD,
    );

    let frames = tick(&mgr);
    assert_eq!(results.load(Ordering::SeqCst), 3);
    assert_eq!(frames[0][7], 2.0);
    assert!(mgr.is_registered(id));
}

#[test]
fn command_may_check_itself_out_during_update() {
    let mgr = Arc::new(MotionManager::new());
    let probe = Arc::new(Probe::default());
    let checked_out = Arc::new(AtomicU32::new(0));

    let weak = Arc::downgrade(&mgr);
    let seen = Arc::clone(&checked_out);
    add(
        &mgr,
        Scripted::new(&probe).hook(move |id, _| {
            let Some(mgr) = weak.upgrade() else { return };
            if let Some(own) = mgr.try_checkout::<Scripted>(MOTION, id) {
                assert_eq!(own.id(), id);
                seen.fetch_add(1, Ordering::SeqCst);
            }
            if mgr.checkout::<Scripted>(MOTION, id).is_some() {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        }),
        priority::STD,
    );

    let (tx, rx) = mpsc::channel();
    let worker = {
        let mgr = Arc::clone(&mgr);
        std::thread::spawn(move || {
            let finished = mgr.get_outputs(MOTION).is_ok();
            let _ = tx.send(finished);
        })
    };
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(true));
    worker.join().unwrap();
    assert_eq!(checked_out.load(Ordering::SeqCst), 2);
    assert_eq!(probe.updates(), 1);

    // Every nested checkout was checked back in.
    assert!(mgr.try_checkout::<Scripted>(MAIN, mgr.begin(MAIN)).is_some());
}

#[test]
fn command_may_remove_itself_during_update() {
    let events = Arc::new(EventLog::new());
    let mgr = Arc::new(MotionManager::new().with_event_sink(events.clone()));
    let probe = Arc::new(Probe::default());

    let weak = Arc::downgrade(&mgr);
    let id = add(
        &mgr,
        Scripted::new(&probe).hook(move |id, _| {
            if let Some(mgr) = weak.upgrade() {
                mgr.remove_motion(MOTION, id);
            }
        }),
        priority::STD,
    );

    tick(&mgr);
    assert!(!mgr.is_registered(id));
    assert_eq!(probe.updates(), 1);
    assert_eq!(probe.stops(), 1);
    assert_eq!(probe.drops(), 1);
    assert!(events.for_source(id).iter().any(|e| e.kind == EventKind::Deactivate));

    tick(&mgr);
    assert_eq!(probe.updates(), 1);
}

// ─── Accessor rules ─────────────────────────────────────────────────

#[test]
fn resolution_is_reserved_to_motion_accessor() {
    let mgr = MotionManager::new();
    assert!(matches!(
        mgr.get_outputs(MAIN),
        Err(MotionError::WrongAccessor { operation: "get_outputs", .. })
    ));
    assert!(matches!(
        mgr.update_pids(MAIN),
        Err(MotionError::WrongAccessor { operation: "update_pids", .. })
    ));
    assert_eq!(mgr.tick(), 0);
}

#[test]
fn update_pids_reports_only_changes() {
    let mgr = MotionManager::new();
    let probe = Arc::new(Probe::default());
    let id = add(
        &mgr,
        Scripted::new(&probe).pid(2, OutputPid::new(8.0, 0.5, 0.1)),
        priority::STD,
    );

    tick(&mgr);
    let updates = mgr.update_pids(MOTION).unwrap();
    assert_eq!(
        updates.as_slice(),
        &[PidUpdate {
            joint: 2,
            pid: [8.0, 0.5, 0.1]
        }]
    );

    tick(&mgr);
    assert!(mgr.update_pids(MOTION).unwrap().is_empty());

    // Gains hold once the driver is gone.
    mgr.remove_motion(MAIN, id);
    tick(&mgr);
    assert!(mgr.update_pids(MOTION).unwrap().is_empty());
    assert_eq!(mgr.committed().pids[2], [8.0, 0.5, 0.1]);

    let id = add(
        &mgr,
        Scripted::new(&probe).pid(2, OutputPid::new(4.0, 0.0, 0.0)),
        priority::STD,
    );
    tick(&mgr);
    let updates = mgr.update_pids(MOTION).unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].pid, [4.0, 0.0, 0.0]);
    assert!(mgr.is_registered(id));
}

// ─── Guard ──────────────────────────────────────────────────────────

#[test]
fn guard_removes_on_drop() {
    let mgr = Arc::new(MotionManager::new());
    let probe = Arc::new(Probe::default());
    let guard = mgr
        .add_guarded(MAIN, motion_object(Scripted::new(&probe)), priority::STD, false)
        .unwrap();
    let id = guard.id();
    assert!(guard.is_active());

    drop(guard);
    assert!(!mgr.is_registered(id));
    assert_eq!(probe.drops(), 1);
}

#[test]
fn guard_tracks_pruning() {
    let mgr = Arc::new(MotionManager::new());
    let probe = Arc::new(Probe::default());
    let guard = mgr
        .add_guarded(MAIN, motion_object(Scripted::new(&probe).alive_for(1)), priority::STD, true)
        .unwrap();

    tick(&mgr);
    assert!(guard.is_active());
    tick(&mgr);
    assert!(!guard.is_active());
    drop(guard);
    assert_eq!(probe.stops(), 1);
}

#[test]
fn guard_can_release_ownership() {
    let mgr = Arc::new(MotionManager::new());
    let probe = Arc::new(Probe::default());
    let guard = mgr
        .add_guarded(MAIN, motion_object(Scripted::new(&probe)), priority::STD, false)
        .unwrap();
    let id = guard.into_id();
    assert!(mgr.is_registered(id));
}
