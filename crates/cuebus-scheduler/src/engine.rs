use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use cuebus_core::config::{IterationMode, SchedulerConfig};
use cuebus_core::{
    Command, CommandId, Group, GroupId, NewCommand, NewTarget, Target, TargetId, TimerState,
    Trigger, TriggerKind,
};
use cuebus_store::{Dataset, Repository};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;
use crate::error::{EngineError, Result};
use crate::publish::{Publisher, StateSnapshot, TimersSnapshot};
use crate::registry::TargetRegistry;
use crate::timer::{spawn_countdown, Countdown, GroupTimer, PlaybackAction, Tick};

/// Everything guarded by the engine lock. Each mutation and the publish that
/// follows it happen under one acquisition, so subscribers never observe a
/// half-applied change.
struct EngineState {
    groups: BTreeMap<GroupId, Group>,
    registry: TargetRegistry,
    timers: BTreeMap<GroupId, GroupTimer>,
}

impl EngineState {
    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            groups: self.groups.values().cloned().collect(),
            targets: self.registry.snapshot(),
        }
    }

    fn timers_snapshot(&self) -> TimersSnapshot {
        self.timers.iter().map(|(id, t)| (*id, t.state())).collect()
    }
}

/// The scheduling and dispatch engine.
///
/// Owns the canonical in-memory model, one [`GroupTimer`] per group, and the
/// two publish feeds. Repository calls and network sends are never made while
/// the state lock is held.
pub struct Engine {
    repo: Arc<dyn Repository>,
    dispatcher: Dispatcher,
    config: SchedulerConfig,
    state: Mutex<EngineState>,
    publisher: Publisher,
}

impl Engine {
    /// Read the full dataset from `repo` and build the engine from it.
    pub fn load(
        repo: Arc<dyn Repository>,
        dispatcher: Dispatcher,
        config: SchedulerConfig,
    ) -> Result<Arc<Self>> {
        let dataset = repo.load_all()?;
        Ok(Self::new(repo, dataset, dispatcher, config))
    }

    /// Every group starts with an idle timer showing its interval.
    pub fn new(
        repo: Arc<dyn Repository>,
        dataset: Dataset,
        dispatcher: Dispatcher,
        config: SchedulerConfig,
    ) -> Arc<Self> {
        let timers = dataset
            .groups
            .iter()
            .map(|g| (g.id, GroupTimer::new(g.trigger.interval())))
            .collect();
        let state = EngineState {
            groups: dataset.groups.into_iter().map(|g| (g.id, g)).collect(),
            registry: TargetRegistry::new(dataset.targets),
            timers,
        };
        let publisher = Publisher::new(state.snapshot(), state.timers_snapshot());
        info!(
            groups = state.groups.len(),
            targets = state.registry.len(),
            iteration = ?config.iteration,
            "engine loaded"
        );
        Arc::new(Self {
            repo,
            dispatcher,
            config,
            state: Mutex::new(state),
            publisher,
        })
    }

    // --- targets -----------------------------------------------------------

    pub fn add_target(&self, target: NewTarget) -> Result<Target> {
        let target = self.repo.create_target(&target)?;
        let mut st = self.lock();
        st.registry.add(target.clone());
        self.publish_state(&st);
        info!(target_id = %target.id, host = %target.host, port = target.port, "target added");
        Ok(target)
    }

    /// Remove a target. Removing an unknown id is a no-op and returns `false`.
    pub fn remove_target(&self, id: TargetId) -> Result<bool> {
        let deleted = self.repo.delete_target(id)?;
        let mut st = self.lock();
        let registered = st.registry.remove(id).is_some();
        if deleted || registered {
            self.publish_state(&st);
            info!(target_id = %id, "target removed");
        }
        Ok(deleted || registered)
    }

    // --- groups ------------------------------------------------------------

    /// Create a group with the default interval and an idle timer.
    pub fn add_group(&self, name: &str, kind: TriggerKind) -> Result<Group> {
        let trigger = match kind {
            TriggerKind::Timer => Trigger::timer(self.config.default_interval_secs),
        };
        let group = self.repo.create_group(name, trigger)?;
        let mut st = self.lock();
        st.timers.insert(group.id, GroupTimer::new(trigger.interval()));
        st.groups.insert(group.id, group.clone());
        self.publish_state(&st);
        self.publish_timers(&st);
        info!(group_id = %group.id, interval = trigger.interval(), "group added");
        Ok(group)
    }

    /// Change a group's interval. `None` keeps the current one.
    ///
    /// A running countdown keeps going and the new interval applies from its
    /// next expiry; an idle or paused timer shows the new interval at once.
    pub fn edit_group(&self, id: GroupId, interval: Option<u64>) -> Result<Group> {
        if interval == Some(0) {
            return Err(EngineError::InvalidInterval("must be at least 1 second".into()));
        }
        let current = self
            .lock()
            .groups
            .get(&id)
            .map(|g| g.trigger)
            .ok_or(EngineError::UnknownGroup(id))?;
        let trigger = interval.map(Trigger::timer).unwrap_or(current);
        let stored = self.repo.update_trigger(id, trigger)?;

        let mut guard = self.lock();
        let st = &mut *guard;
        if let Some(i) = interval {
            if let Some(timer) = st.timers.get_mut(&id) {
                timer.set_interval(i);
            }
        }
        let group = match st.groups.get_mut(&id) {
            Some(group) => {
                group.trigger = stored.trigger;
                group.clone()
            }
            None => stored,
        };
        self.publish_state(st);
        self.publish_timers(st);
        info!(group_id = %id, interval = group.trigger.interval(), "group edited");
        Ok(group)
    }

    /// Delete a group with its commands and stop its timer. Unknown ids are a
    /// no-op and return `false`.
    pub fn remove_group(&self, id: GroupId) -> Result<bool> {
        let deleted = self.repo.delete_group(id)?;
        let mut st = self.lock();
        let known = st.groups.remove(&id).is_some();
        // dropping the timer cancels its countdown
        let had_timer = st.timers.remove(&id).is_some();
        if deleted || known || had_timer {
            self.publish_state(&st);
            self.publish_timers(&st);
            info!(group_id = %id, "group removed");
        }
        Ok(deleted || known)
    }

    // --- commands ----------------------------------------------------------

    pub fn add_command(&self, command: NewCommand) -> Result<Command> {
        if !command.tag.starts_with('/') {
            return Err(EngineError::InvalidTag(command.tag));
        }
        let command = self.repo.create_command(&command)?;
        let mut st = self.lock();
        if let Some(group) = st.groups.get_mut(&command.group_id) {
            group.commands.push(command.clone());
        }
        self.publish_state(&st);
        info!(
            group_id = %command.group_id,
            command_id = %command.id,
            target_id = %command.target_id,
            tag = %command.tag,
            "command added"
        );
        Ok(command)
    }

    pub fn remove_command(&self, group_id: GroupId, command_id: CommandId) -> Result<bool> {
        let deleted = self.repo.delete_command(group_id, command_id)?;
        let mut st = self.lock();
        let mut removed = false;
        if let Some(group) = st.groups.get_mut(&group_id) {
            let before = group.commands.len();
            group.commands.retain(|c| c.id != command_id);
            removed = group.commands.len() != before;
        }
        if deleted || removed {
            self.publish_state(&st);
            info!(%group_id, %command_id, "command removed");
        }
        Ok(deleted || removed)
    }

    // --- playback ----------------------------------------------------------

    /// Apply a play/pause/reset action to a group's timer.
    ///
    /// Returns the resulting timer state, or `None` when the group or its
    /// timer is unknown (the call is then a no-op).
    pub fn playback_control(self: &Arc<Self>, id: GroupId, action: PlaybackAction) -> Option<TimerState> {
        let mut guard = self.lock();
        let st = &mut *guard;
        let Some(interval) = st.groups.get(&id).map(|g| g.trigger.interval()) else {
            debug!(group_id = %id, ?action, "playback for unknown group ignored");
            return None;
        };
        let timer = st.timers.get_mut(&id)?;
        let countdown = timer.apply(action, interval);
        let state = timer.state();
        if let Some(countdown) = countdown {
            self.spawn_timer(id, countdown);
        }
        self.publish_timers(st);
        drop(guard);

        info!(group_id = %id, ?action, state = %state.state, duration = state.duration, "playback");
        Some(state)
    }

    /// Cancel every running countdown. Used at shutdown.
    pub fn shutdown(&self) {
        let mut st = self.lock();
        for timer in st.timers.values_mut() {
            timer.cancel();
        }
        info!(timers = st.timers.len(), "engine timers cancelled");
    }

    // --- reads and subscriptions ------------------------------------------

    pub fn state(&self) -> Arc<StateSnapshot> {
        self.publisher.state.current()
    }

    pub fn timers(&self) -> Arc<TimersSnapshot> {
        self.publisher.timers.current()
    }

    /// Structural feed. The receiver starts at the latest snapshot.
    pub fn subscribe_state(&self) -> watch::Receiver<Arc<StateSnapshot>> {
        self.publisher.state.subscribe()
    }

    /// Timer feed. The receiver starts at the latest timer map.
    pub fn subscribe_timers(&self) -> watch::Receiver<Arc<TimersSnapshot>> {
        self.publisher.timers.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.publisher.state.subscriber_count() + self.publisher.timers.subscriber_count()
    }

    // --- private helpers ---------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish_state(&self, st: &EngineState) {
        self.publisher.state.publish(st.snapshot());
    }

    fn publish_timers(&self, st: &EngineState) {
        self.publisher.timers.publish(st.timers_snapshot());
    }

    /// The iteration number conditions are evaluated against on expiry.
    fn dispatch_iteration(&self, fire_count: u64) -> u64 {
        match self.config.iteration {
            IterationMode::Constant => 0,
            IterationMode::Counting => fire_count,
        }
    }

    fn spawn_timer(self: &Arc<Self>, group_id: GroupId, countdown: Countdown) {
        let engine: Weak<Self> = Arc::downgrade(self);
        spawn_countdown(countdown, move |generation| {
            let engine = engine.clone();
            async move {
                match engine.upgrade() {
                    Some(engine) => engine.on_tick(group_id, generation),
                    None => false,
                }
            }
        });
    }

    /// One second of a group's countdown. Returns `false` when the ticking
    /// task should stop.
    fn on_tick(&self, group_id: GroupId, generation: u64) -> bool {
        let mut guard = self.lock();
        let st = &mut *guard;
        let Some(interval) = st.groups.get(&group_id).map(|g| g.trigger.interval()) else {
            return false;
        };
        let Some(timer) = st.timers.get_mut(&group_id) else {
            return false;
        };

        match timer.tick(generation, interval) {
            Tick::Stale => {
                warn!(%group_id, generation, "stale timer callback dropped");
                false
            }
            Tick::Counted => {
                self.publish_timers(st);
                debug!(%group_id, "timer tick");
                true
            }
            Tick::Expired { fire_count } => {
                let iteration = self.dispatch_iteration(fire_count);
                let commands = st
                    .groups
                    .get(&group_id)
                    .map(|g| g.commands.clone())
                    .unwrap_or_default();
                let targets = st.registry.snapshot();
                self.publish_timers(st);
                drop(guard);

                info!(%group_id, iteration, commands = commands.len(), "group timer expired");
                let dispatcher = self.dispatcher.clone();
                tokio::spawn(async move {
                    let report = dispatcher.dispatch(&commands, &targets, iteration).await;
                    debug!(
                        %group_id,
                        sent = report.sent,
                        failed = report.failed,
                        skipped = report.skipped,
                        "dispatch finished"
                    );
                });
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use cuebus_core::{Argument, Condition, TimerStatus};
    use cuebus_store::{SqliteRepository, StoreError};

    use crate::dispatch::tests::RecordingTransport;

    /// SQLite repository whose writes can be made to fail on demand.
    struct FlakyRepo {
        inner: SqliteRepository,
        fail_writes: AtomicBool,
    }

    impl FlakyRepo {
        fn check(&self) -> cuebus_store::Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Corrupt {
                    entity: "test",
                    id: 0,
                    reason: "injected failure".into(),
                });
            }
            Ok(())
        }
    }

    impl Repository for FlakyRepo {
        fn load_all(&self) -> cuebus_store::Result<Dataset> {
            self.inner.load_all()
        }
        fn create_target(&self, target: &NewTarget) -> cuebus_store::Result<Target> {
            self.check()?;
            self.inner.create_target(target)
        }
        fn delete_target(&self, id: TargetId) -> cuebus_store::Result<bool> {
            self.check()?;
            self.inner.delete_target(id)
        }
        fn create_group(&self, name: &str, trigger: Trigger) -> cuebus_store::Result<Group> {
            self.check()?;
            self.inner.create_group(name, trigger)
        }
        fn update_trigger(&self, id: GroupId, trigger: Trigger) -> cuebus_store::Result<Group> {
            self.check()?;
            self.inner.update_trigger(id, trigger)
        }
        fn delete_group(&self, id: GroupId) -> cuebus_store::Result<bool> {
            self.check()?;
            self.inner.delete_group(id)
        }
        fn create_command(&self, command: &NewCommand) -> cuebus_store::Result<Command> {
            self.check()?;
            self.inner.create_command(command)
        }
        fn delete_command(&self, group_id: GroupId, command_id: CommandId) -> cuebus_store::Result<bool> {
            self.check()?;
            self.inner.delete_command(group_id, command_id)
        }
    }

    struct Harness {
        engine: Arc<Engine>,
        repo: Arc<FlakyRepo>,
        transport: Arc<RecordingTransport>,
    }

    fn harness(iteration: IterationMode) -> Harness {
        let repo = Arc::new(FlakyRepo {
            inner: SqliteRepository::open_in_memory().unwrap(),
            fail_writes: AtomicBool::new(false),
        });
        let transport = Arc::new(RecordingTransport::default());
        let config = SchedulerConfig {
            iteration,
            ..SchedulerConfig::default()
        };
        let engine = Engine::load(repo.clone(), Dispatcher::new(transport.clone()), config).unwrap();
        Harness { engine, repo, transport }
    }

    fn new_target(port: u16) -> NewTarget {
        NewTarget {
            name: "T1".into(),
            host: "127.0.0.1".into(),
            port,
        }
    }

    fn new_command(group: GroupId, target: TargetId, tag: &str, condition: Condition) -> NewCommand {
        NewCommand {
            group_id: group,
            target_id: target,
            tag: tag.into(),
            offset: 0,
            arguments: vec![Argument::Int(1)],
            condition,
            active: true,
        }
    }

    /// Target + group with `interval` + one unconditional `/play 1` command.
    fn scenario(h: &Harness, interval: u64) -> GroupId {
        let target = h.engine.add_target(new_target(9000)).unwrap();
        let group = h.engine.add_group("G1", TriggerKind::Timer).unwrap();
        h.engine.edit_group(group.id, Some(interval)).unwrap();
        h.engine
            .add_command(new_command(group.id, target.id, "/play", Condition::Always))
            .unwrap();
        group.id
    }

    fn timer(h: &Harness, id: GroupId) -> TimerState {
        h.engine.timers()[&id]
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_sends_one_batch_and_restarts() {
        let h = harness(IterationMode::Constant);
        let g = scenario(&h, 5);

        h.engine.playback_control(g, PlaybackAction::Start).unwrap();
        tokio::time::sleep(Duration::from_millis(4500)).await;
        assert!(h.transport.sent.lock().unwrap().is_empty());
        assert_eq!(timer(&h, g).duration, 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        {
            let sent = h.transport.sent.lock().unwrap();
            assert_eq!(sent.len(), 1);
            let (addr, batch) = &sent[0];
            assert_eq!(addr.to_string(), "127.0.0.1:9000");
            assert_eq!(batch.messages.len(), 1);
            assert_eq!(batch.messages[0].tag, "/play");
            assert_eq!(batch.messages[0].arguments, vec![Argument::Int(1)]);
        }
        let state = timer(&h, g);
        assert_eq!(state.duration, 5);
        assert_eq!(state.state, TimerStatus::Running);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(timer(&h, g).duration, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_retains_and_resume_continues() {
        let h = harness(IterationMode::Constant);
        let g = scenario(&h, 10);

        h.engine.playback_control(g, PlaybackAction::Start);
        tokio::time::sleep(Duration::from_millis(3500)).await;
        let paused = h.engine.playback_control(g, PlaybackAction::Stop).unwrap();
        assert_eq!(paused.state, TimerStatus::Paused);
        assert_eq!(paused.duration, 7);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(timer(&h, g).duration, 7);
        assert!(h.transport.sent.lock().unwrap().is_empty());

        let resumed = h.engine.playback_control(g, PlaybackAction::Start).unwrap();
        assert_eq!(resumed.duration, 7);
        // half a second was already spent before the pause
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(timer(&h, g).duration, 6);
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(timer(&h, g).duration, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_reset_and_restart_leaves_one_countdown() {
        let h = harness(IterationMode::Constant);
        let g = scenario(&h, 10);

        h.engine.playback_control(g, PlaybackAction::Start);
        tokio::time::sleep(Duration::from_millis(500)).await;
        h.engine.playback_control(g, PlaybackAction::Reset);
        h.engine.playback_control(g, PlaybackAction::Start);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        // one tick from the second countdown only
        assert_eq!(timer(&h, g).duration, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_returns_to_idle_with_interval() {
        let h = harness(IterationMode::Constant);
        let g = scenario(&h, 10);

        h.engine.playback_control(g, PlaybackAction::Start);
        tokio::time::sleep(Duration::from_millis(2500)).await;
        let state = h.engine.playback_control(g, PlaybackAction::Reset).unwrap();
        assert_eq!(state, TimerState { duration: 10, iteration: 0, state: TimerStatus::Idle });

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(h.transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn edit_while_running_applies_next_cycle() {
        let h = harness(IterationMode::Constant);
        let g = scenario(&h, 5);

        h.engine.playback_control(g, PlaybackAction::Start);
        tokio::time::sleep(Duration::from_millis(2500)).await;
        h.engine.edit_group(g, Some(10)).unwrap();
        assert_eq!(timer(&h, g).duration, 3);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(h.transport.sent.lock().unwrap().len(), 1);
        assert_eq!(timer(&h, g).duration, 10);
    }

    #[tokio::test]
    async fn edit_while_idle_or_paused_shows_new_interval() {
        let h = harness(IterationMode::Constant);
        let g = h.engine.add_group("G", TriggerKind::Timer).unwrap().id;
        assert_eq!(timer(&h, g).duration, 180);

        h.engine.edit_group(g, Some(30)).unwrap();
        assert_eq!(timer(&h, g).duration, 30);
        assert_eq!(h.engine.state().groups[0].trigger.interval(), 30);

        h.engine.playback_control(g, PlaybackAction::Start);
        h.engine.playback_control(g, PlaybackAction::Stop);
        h.engine.edit_group(g, Some(12)).unwrap();
        assert_eq!(timer(&h, g).duration, 12);

        let unchanged = h.engine.edit_group(g, None).unwrap();
        assert_eq!(unchanged.trigger.interval(), 12);
        assert!(matches!(
            h.engine.edit_group(g, Some(0)),
            Err(EngineError::InvalidInterval(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn constant_iteration_passes_every_modulo_condition() {
        let h = harness(IterationMode::Constant);
        let target = h.engine.add_target(new_target(9000)).unwrap();
        let g = h.engine.add_group("G", TriggerKind::Timer).unwrap().id;
        h.engine.edit_group(g, Some(1)).unwrap();
        h.engine
            .add_command(new_command(g, target.id, "/even", Condition::leaf(2)))
            .unwrap();

        h.engine.playback_control(g, PlaybackAction::Start);
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(h.transport.sent.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn counting_iteration_threads_fire_count() {
        let h = harness(IterationMode::Counting);
        let target = h.engine.add_target(new_target(9000)).unwrap();
        let g = h.engine.add_group("G", TriggerKind::Timer).unwrap().id;
        h.engine.edit_group(g, Some(1)).unwrap();
        h.engine
            .add_command(new_command(g, target.id, "/even", Condition::leaf(2)))
            .unwrap();

        h.engine.playback_control(g, PlaybackAction::Start);
        tokio::time::sleep(Duration::from_millis(3500)).await;
        // fire counts 0, 1, 2 -> only 0 and 2 pass
        assert_eq!(h.transport.sent.lock().unwrap().len(), 2);
        assert_eq!(timer(&h, g).iteration, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn removed_target_is_skipped_at_expiry() {
        let h = harness(IterationMode::Constant);
        let g = scenario(&h, 2);
        let target_id = h.engine.state().targets[0].id;
        h.engine.remove_target(target_id).unwrap();

        h.engine.playback_control(g, PlaybackAction::Start);
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(h.transport.sent.lock().unwrap().is_empty());
        assert_eq!(h.engine.state().groups[0].commands.len(), 1);
    }

    #[tokio::test]
    async fn remove_target_twice_is_a_noop() {
        let h = harness(IterationMode::Constant);
        let t = h.engine.add_target(new_target(9000)).unwrap();
        assert!(h.engine.remove_target(t.id).unwrap());
        assert!(!h.engine.remove_target(t.id).unwrap());
        assert!(h.engine.state().targets.is_empty());
    }

    #[tokio::test]
    async fn failed_write_leaves_state_untouched() {
        let h = harness(IterationMode::Constant);
        let t = h.engine.add_target(new_target(9000)).unwrap();
        let mut rx = h.engine.subscribe_state();
        rx.borrow_and_update();

        h.repo.fail_writes.store(true, Ordering::SeqCst);
        assert!(h.engine.add_target(new_target(9001)).is_err());
        assert!(h.engine.remove_target(t.id).is_err());
        assert!(h.engine.add_group("G", TriggerKind::Timer).is_err());

        assert_eq!(h.engine.state().targets, vec![t]);
        assert!(h.engine.state().groups.is_empty());
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn add_command_validates_tag_and_group() {
        let h = harness(IterationMode::Constant);
        let g = h.engine.add_group("G", TriggerKind::Timer).unwrap().id;

        let err = h
            .engine
            .add_command(new_command(g, TargetId(1), "play", Condition::Always))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTag(_)));

        let err = h
            .engine
            .add_command(new_command(GroupId(404), TargetId(1), "/play", Condition::Always))
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
        assert!(h.engine.state().groups[0].commands.is_empty());
    }

    #[tokio::test]
    async fn remove_command_updates_group() {
        let h = harness(IterationMode::Constant);
        let g = h.engine.add_group("G", TriggerKind::Timer).unwrap().id;
        let a = h.engine.add_command(new_command(g, TargetId(1), "/a", Condition::Always)).unwrap();
        h.engine.add_command(new_command(g, TargetId(1), "/b", Condition::Always)).unwrap();

        assert!(h.engine.remove_command(g, a.id).unwrap());
        assert!(!h.engine.remove_command(g, a.id).unwrap());
        let tags: Vec<_> = h.engine.state().groups[0]
            .commands
            .iter()
            .map(|c| c.tag.clone())
            .collect();
        assert_eq!(tags, vec!["/b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn remove_group_stops_its_timer() {
        let h = harness(IterationMode::Constant);
        let g = scenario(&h, 2);
        h.engine.playback_control(g, PlaybackAction::Start);

        assert!(h.engine.remove_group(g).unwrap());
        assert!(!h.engine.timers().contains_key(&g));
        assert!(!h.engine.remove_group(g).unwrap());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(h.transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn playback_on_unknown_group_is_a_noop() {
        let h = harness(IterationMode::Constant);
        assert!(h.engine.playback_control(GroupId(7), PlaybackAction::Start).is_none());
        assert!(h.engine.timers().is_empty());
    }

    #[tokio::test]
    async fn subscribers_get_snapshot_then_updates() {
        let h = harness(IterationMode::Constant);
        let mut state_rx = h.engine.subscribe_state();
        let mut timers_rx = h.engine.subscribe_timers();
        assert!(state_rx.borrow_and_update().groups.is_empty());
        timers_rx.borrow_and_update();

        let g = h.engine.add_group("G", TriggerKind::Timer).unwrap();
        state_rx.changed().await.unwrap();
        assert_eq!(state_rx.borrow_and_update().groups[0].id, g.id);
        timers_rx.changed().await.unwrap();
        assert_eq!(timers_rx.borrow_and_update()[&g.id].state, TimerStatus::Idle);

        // timer-only changes do not touch the structural feed
        h.engine.playback_control(g.id, PlaybackAction::Start);
        assert!(timers_rx.has_changed().unwrap());
        assert!(!state_rx.has_changed().unwrap());
        h.engine.shutdown();
    }

    #[tokio::test]
    async fn load_restores_groups_with_idle_timers() {
        let repo = Arc::new(SqliteRepository::open_in_memory().unwrap());
        let g = repo.create_group("G", Trigger::timer(42)).unwrap();
        let engine = Engine::load(
            repo,
            Dispatcher::new(Arc::new(RecordingTransport::default())),
            SchedulerConfig::default(),
        )
        .unwrap();

        assert_eq!(
            engine.timers()[&g.id],
            TimerState { duration: 42, iteration: 0, state: TimerStatus::Idle }
        );
        assert_eq!(engine.state().groups.len(), 1);
    }
}
