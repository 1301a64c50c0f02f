//! Discrete tick derivation and tick-boundary notification

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use netsync_core::{check_delta, NetworkTime, SyncResult};
use parking_lot::Mutex;
use tracing::trace;

use crate::TimeSystem;

/// Emitted once per update that crossed at least one tick boundary
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickEvent {
    /// Tick index after the update
    pub tick: i64,
    /// Tick index before the update
    pub previous_tick: i64,
    /// `tick - previous_tick`; may exceed 1 (catch-up) or be negative (reset)
    pub ticks_elapsed: i64,
    pub local_time: NetworkTime,
    pub server_time: NetworkTime,
}

/// Handle returned by [`TickListeners::subscribe`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&TickEvent) + Send + Sync>;

#[derive(Default)]
struct ListenerRegistry {
    next_id: u64,
    listeners: Vec<(ListenerId, Listener)>,
    channels: Vec<Sender<TickEvent>>,
}

/// Shared tick listener registry.
///
/// Cloning yields another handle to the same registry, so a listener can
/// hold one and subscribe or unsubscribe while being fired. Firing works on
/// a snapshot taken before the first listener runs; changes made during a
/// fire apply from the next one.
#[derive(Clone, Default)]
pub struct TickListeners {
    inner: Arc<Mutex<ListenerRegistry>>,
}

impl TickListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback, invoked in registration order
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&TickEvent) + Send + Sync + 'static,
    {
        let mut registry = self.inner.lock();
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Remove a callback. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut registry = self.inner.lock();
        let before = registry.listeners.len();
        registry.listeners.retain(|(lid, _)| *lid != id);
        registry.listeners.len() != before
    }

    /// Receive tick events by polling instead of callback.
    /// Dropping the receiver unsubscribes it.
    pub fn subscribe_channel(&self) -> Receiver<TickEvent> {
        let (tx, rx) = unbounded();
        self.inner.lock().channels.push(tx);
        rx
    }

    /// Number of callback listeners
    pub fn len(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver an event; returns how many callbacks ran
    pub fn fire(&self, event: &TickEvent) -> usize {
        let snapshot: Vec<Listener> = {
            let mut registry = self.inner.lock();
            registry.channels.retain(|tx| tx.send(*event).is_ok());
            registry.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };

        for listener in &snapshot {
            listener(event);
        }
        snapshot.len()
    }
}

/// Derives ticks from continuous time at a fixed rate
pub struct TickSystem {
    tick_rate: u32,
    local_time: NetworkTime,
    server_time: NetworkTime,
    listeners: TickListeners,
    fire_count: u64,
}

impl TickSystem {
    pub fn new(tick_rate: u32) -> SyncResult<Self> {
        Ok(TickSystem {
            tick_rate,
            local_time: NetworkTime::zero(tick_rate)?,
            server_time: NetworkTime::zero(tick_rate)?,
            listeners: TickListeners::new(),
            fire_count: 0,
        })
    }

    /// Registry handle; clone it to share with listeners
    pub fn listeners(&self) -> &TickListeners {
        &self.listeners
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&TickEvent) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    pub fn subscribe_channel(&self) -> Receiver<TickEvent> {
        self.listeners.subscribe_channel()
    }

    /// Set both clocks without firing
    pub fn reset(&mut self, local_time: f64, server_time: f64) -> SyncResult<()> {
        self.local_time = NetworkTime::new(self.tick_rate, local_time)?;
        self.server_time = NetworkTime::new(self.tick_rate, server_time)?;
        Ok(())
    }

    /// Move to new clock values, firing at most once.
    ///
    /// Skipped ticks are coalesced: crossing five boundaries in one call
    /// produces a single event with `ticks_elapsed == 5`.
    pub fn update(&mut self, local_time: f64, server_time: f64) -> SyncResult<Option<TickEvent>> {
        let local = NetworkTime::new(self.tick_rate, local_time)?;
        let server = NetworkTime::new(self.tick_rate, server_time)?;

        let previous_tick = self.local_time.tick();
        self.local_time = local;
        self.server_time = server;

        let tick = local.tick();
        if tick == previous_tick {
            return Ok(None);
        }

        let event = TickEvent {
            tick,
            previous_tick,
            ticks_elapsed: tick - previous_tick,
            local_time: local,
            server_time: server,
        };
        self.fire_count += 1;
        let notified = self.listeners.fire(&event);
        trace!(tick, previous_tick, notified, "tick");

        Ok(Some(event))
    }

    /// Advance both clocks by `delta_time` seconds
    pub fn advance(&mut self, delta_time: f64) -> SyncResult<Option<TickEvent>> {
        let delta_time = check_delta(delta_time)?;
        let local = self.local_time.time() + delta_time;
        let server = self.server_time.time() + delta_time;
        self.update(local, server)
    }

    /// Follow a time system's clocks
    pub fn advance_from(&mut self, time: &TimeSystem) -> SyncResult<Option<TickEvent>> {
        self.update(time.local_time(), time.server_time())
    }

    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    /// Current local tick
    pub fn tick(&self) -> i64 {
        self.local_time.tick()
    }

    /// Current server tick
    pub fn server_tick(&self) -> i64 {
        self.server_time.tick()
    }

    pub fn local_time(&self) -> NetworkTime {
        self.local_time
    }

    pub fn server_time(&self) -> NetworkTime {
        self.server_time
    }

    /// Number of notifications fired so far
    pub fn fire_count(&self) -> u64 {
        self.fire_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(ticks: &TickSystem) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        ticks.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        count
    }

    #[test]
    fn test_sub_tick_update_is_silent() {
        let mut ticks = TickSystem::new(10).unwrap();
        let count = counter(&ticks);

        assert!(ticks.advance(0.05).unwrap().is_none());
        assert!(ticks.advance(0.04).unwrap().is_none());
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(ticks.tick(), 0);
    }

    #[test]
    fn test_multiple_ticks_fire_once() {
        let mut ticks = TickSystem::new(10).unwrap();
        let count = counter(&ticks);

        let event = ticks.advance(0.3).unwrap().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(event.ticks_elapsed, 3);
        assert_eq!(ticks.tick(), 3);
        assert_eq!(ticks.fire_count(), 1);
    }

    #[test]
    fn test_backward_jump_fires() {
        let mut ticks = TickSystem::new(10).unwrap();
        ticks.reset(5.0, 5.0).unwrap();
        let event = ticks.update(4.0, 4.0).unwrap().unwrap();
        assert_eq!(event.ticks_elapsed, -10);
    }

    #[test]
    fn test_listeners_in_registration_order() {
        let mut ticks = TickSystem::new(1).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let o = Arc::clone(&order);
            ticks.subscribe(move |_| o.lock().push(i));
        }
        ticks.advance(1.0).unwrap();
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_listener_can_unsubscribe_others() {
        let mut ticks = TickSystem::new(1).unwrap();
        let registry = ticks.listeners().clone();
        let victim_calls = Arc::new(AtomicUsize::new(0));

        let victim_slot = Arc::new(Mutex::new(None::<ListenerId>));
        let slot = Arc::clone(&victim_slot);
        ticks.subscribe(move |_| {
            if let Some(id) = slot.lock().take() {
                registry.unsubscribe(id);
            }
        });

        let vc = Arc::clone(&victim_calls);
        let victim = ticks.subscribe(move |_| {
            vc.fetch_add(1, Ordering::SeqCst);
        });
        *victim_slot.lock() = Some(victim);

        // removed mid-fire: still sees this event from the snapshot
        ticks.advance(1.0).unwrap();
        assert_eq!(victim_calls.load(Ordering::SeqCst), 1);
        assert_eq!(ticks.listeners().len(), 1);

        ticks.advance(1.0).unwrap();
        assert_eq!(victim_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_can_subscribe_during_fire() {
        let mut ticks = TickSystem::new(1).unwrap();
        let registry = ticks.listeners().clone();
        ticks.subscribe(move |_| {
            registry.subscribe(|_| {});
        });

        ticks.advance(1.0).unwrap();
        assert_eq!(ticks.listeners().len(), 2);
    }

    #[test]
    fn test_channel_subscription() {
        let mut ticks = TickSystem::new(10).unwrap();
        let rx = ticks.subscribe_channel();

        ticks.advance(0.25).unwrap();
        ticks.advance(0.01).unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.tick, 2);
        assert!(rx.try_recv().is_err());

        drop(rx);
        // pruned without error
        assert!(ticks.advance(0.1).unwrap().is_some());
    }

    #[test]
    fn test_follows_time_system() {
        let mut time = TimeSystem::with_tick_rate(20).unwrap();
        time.reset(1.0, 0.0).unwrap();
        let mut ticks = TickSystem::new(20).unwrap();
        ticks.reset(time.local_time(), time.server_time()).unwrap();

        let mut fired = 0;
        for _ in 0..20 {
            time.advance(0.05).unwrap();
            if ticks.advance_from(&time).unwrap().is_some() {
                fired += 1;
            }
        }
        assert_eq!(fired, 20);
        assert_eq!(ticks.server_tick(), ticks.server_time().tick());
    }

    proptest! {
        #[test]
        fn prop_at_most_one_fire_per_update(
            rate in 1u32..120,
            deltas in proptest::collection::vec(0.0f64..0.5, 1..60),
        ) {
            let mut ticks = TickSystem::new(rate).unwrap();
            let count = counter(&ticks);
            let mut changed = 0;
            for dt in deltas {
                let before = ticks.tick();
                let fired = ticks.advance(dt).unwrap().is_some();
                prop_assert_eq!(fired, ticks.tick() != before);
                if fired {
                    changed += 1;
                }
            }
            prop_assert_eq!(count.load(Ordering::SeqCst), changed);
        }
    }
}
