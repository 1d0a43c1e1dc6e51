//! Six-phase ordered system scheduler.
//!
//! Systems are grouped into named phases that always run in the same
//! relative order: `input, update, prePhysics, physics, postPhysics,
//! render`. Within a phase, systems run in `(order, insertion_counter)`
//! order so ties are broken by registration order rather than hash-map
//! iteration order. `render` is skipped entirely off-client.
//!
//! A system is `fn(&mut World) -> Result<(), SystemError>` -- there is no
//! async variant to reject at runtime, because the type system already
//! won't accept a `Future`-returning function here.

use crate::EcsError;
use crate::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Input,
    Update,
    PrePhysics,
    Physics,
    PostPhysics,
    Render,
}

pub const PHASES_CLIENT: [Phase; 6] = [
    Phase::Input,
    Phase::Update,
    Phase::PrePhysics,
    Phase::Physics,
    Phase::PostPhysics,
    Phase::Render,
];

pub const PHASES_SERVER: [Phase; 5] = [
    Phase::Input,
    Phase::Update,
    Phase::PrePhysics,
    Phase::Physics,
    Phase::PostPhysics,
];

pub type SystemFn = fn(&mut World) -> Result<(), EcsError>;

struct RegisteredSystem {
    name: &'static str,
    order: i32,
    insertion: u64,
    func: SystemFn,
}

#[derive(Default)]
pub struct Scheduler {
    phases: std::collections::HashMap<Phase, Vec<RegisteredSystem>>,
    insertion_counter: u64,
}

impl Scheduler {
    pub fn new() -> Scheduler {
        Scheduler::default()
    }

    /// Register `func` to run in `phase`. Systems with equal `order` run
    /// in the order they were added.
    pub fn add_system(&mut self, phase: Phase, name: &'static str, order: i32, func: SystemFn) {
        let insertion = self.insertion_counter;
        self.insertion_counter += 1;
        let list = self.phases.entry(phase).or_default();
        list.push(RegisteredSystem {
            name,
            order,
            insertion,
            func,
        });
        list.sort_by_key(|s| (s.order, s.insertion));
    }

    pub fn system_names(&self, phase: Phase) -> Vec<&'static str> {
        self.phases
            .get(&phase)
            .map(|v| v.iter().map(|s| s.name).collect())
            .unwrap_or_default()
    }

    /// Run every phase appropriate for `is_client`, in order, stopping at
    /// the first system error.
    pub fn run_tick(&self, world: &mut World, is_client: bool) -> Result<(), EcsError> {
        let phases: &[Phase] = if is_client {
            &PHASES_CLIENT
        } else {
            &PHASES_SERVER
        };
        for &phase in phases {
            if let Some(systems) = self.phases.get(&phase) {
                for system in systems {
                    (system.func)(world)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static CALL_ORDER: AtomicUsize = AtomicUsize::new(0);
    static FIRST: AtomicUsize = AtomicUsize::new(usize::MAX);
    static SECOND: AtomicUsize = AtomicUsize::new(usize::MAX);

    fn sys_a(_w: &mut World) -> Result<(), EcsError> {
        FIRST.store(CALL_ORDER.fetch_add(1, Ordering::SeqCst), Ordering::SeqCst);
        Ok(())
    }

    fn sys_b(_w: &mut World) -> Result<(), EcsError> {
        SECOND.store(CALL_ORDER.fetch_add(1, Ordering::SeqCst), Ordering::SeqCst);
        Ok(())
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let mut sched = Scheduler::new();
        sched.add_system(Phase::Update, "a", 0, sys_a);
        sched.add_system(Phase::Update, "b", 0, sys_b);
        let mut world = World::new(16);
        sched.run_tick(&mut world, true).unwrap();
        assert!(FIRST.load(Ordering::SeqCst) < SECOND.load(Ordering::SeqCst));
    }

    #[test]
    fn render_skipped_off_client() {
        let mut sched = Scheduler::new();
        sched.add_system(Phase::Render, "r", 0, |_w| Ok(()));
        let names = sched.system_names(Phase::Render);
        assert_eq!(names, vec!["r"]);
        // Running as non-client should not invoke render; verified by the
        // absence of Render in PHASES_SERVER.
        assert!(!PHASES_SERVER.contains(&Phase::Render));
        assert!(PHASES_CLIENT.contains(&Phase::Render));
    }
}
