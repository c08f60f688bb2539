//! Bidirectional prefetch cache.
//!
//! Layout of the shared state (nearest page first in both queues):
//!
//! ```text
//!   backward[B-1] .. backward[0]  <-  current  ->  forward[0] .. forward[F-1]
//! ```
//!
//! One background worker extends both queues toward their capacity while the
//! consumer pops from them via `next()` / `previous()`. Everything shared sits
//! behind a single `Mutex<State>`:
//!
//! - `forward_ready` / `backward_ready`: signalled when the worker appends,
//!   and on stop so a blocked consumer can give up.
//! - `wake`: signalled by navigation and stop so the idle worker does not
//!   sleep out its full tick.
//!
//! The provider is always called with the lock released. After a fetch the
//! worker re-validates adjacency against the queue tail before appending,
//! because navigation may have moved the tail while the fetch was running.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};

use crate::page::{Page, PageId};
use crate::provider::PageProvider;

/// Upper bound for `lookahead` / `lookbehind`.
pub const MAX_DEPTH: usize = 64;

/// Shortest worker sleep; a zero tick would spin on a full buffer.
pub const MIN_IDLE_TICK: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct PrefetchConfig {
    /// Maximum pages buffered ahead of the current one.
    pub lookahead: usize,
    /// Maximum pages buffered behind the current one.
    pub lookbehind: usize,
    /// Worker sleep when an iteration made no progress.
    pub idle_tick: Duration,
    /// How long `next()` / `previous()` wait for data. `None` waits forever.
    pub wait_timeout: Option<Duration>,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            lookahead: 3,
            lookbehind: 3,
            idle_tick: Duration::from_secs(1),
            wait_timeout: None,
        }
    }
}

impl PrefetchConfig {
    fn capacity(&self, dir: Direction) -> usize {
        match dir {
            Direction::Forward => self.lookahead,
            Direction::Backward => self.lookbehind,
        }
    }
}

/// Point-in-time copy of the cache layout, queues nearest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub current: PageId,
    pub forward: Vec<PageId>,
    pub backward: Vec<PageId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

impl Direction {
    fn opposite(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
        }
    }

    /// The neighbour link followed when moving in this direction.
    fn link(self, page: &Page) -> Option<&PageId> {
        match self {
            Direction::Forward => page.next(),
            Direction::Backward => page.previous(),
        }
    }

    /// Whether `page` is the immediate neighbour of `anchor` in this direction.
    fn follows(self, page: &Page, anchor: &Page) -> bool {
        match self {
            Direction::Forward => page.is_next_of(anchor),
            Direction::Backward => page.is_previous_of(anchor),
        }
    }
}

struct State {
    current: Arc<Page>,
    forward: VecDeque<Arc<Page>>,
    backward: VecDeque<Arc<Page>>,
    stopped: bool,
    /// Bumped by every reset; stale waiters and workers compare against it.
    generation: u64,
    /// Bumped by every navigation; lets the idle worker skip its sleep.
    moves: u64,
}

impl State {
    fn queue(&self, dir: Direction) -> &VecDeque<Arc<Page>> {
        match dir {
            Direction::Forward => &self.forward,
            Direction::Backward => &self.backward,
        }
    }

    fn queue_mut(&mut self, dir: Direction) -> &mut VecDeque<Arc<Page>> {
        match dir {
            Direction::Forward => &mut self.forward,
            Direction::Backward => &mut self.backward,
        }
    }

    /// Far end of the chain in `dir`: the page whose neighbour comes next.
    fn anchor(&self, dir: Direction) -> &Arc<Page> {
        self.queue(dir).back().unwrap_or(&self.current)
    }
}

struct Shared {
    state: Mutex<State>,
    forward_ready: Condvar,
    backward_ready: Condvar,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ready(&self, dir: Direction) -> &Condvar {
        match dir {
            Direction::Forward => &self.forward_ready,
            Direction::Backward => &self.backward_ready,
        }
    }

    fn notify_all(&self) {
        self.forward_ready.notify_all();
        self.backward_ready.notify_all();
        self.wake.notify_all();
    }
}

/// Page buffer ahead of and behind the current page, filled by one
/// background worker thread.
///
/// All methods take `&self`; the cache may be shared across threads.
/// The worker is joined by `stop()` and on drop.
pub struct PrefetchCache {
    shared: Arc<Shared>,
    provider: Mutex<Arc<dyn PageProvider>>,
    config: PrefetchConfig,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PrefetchCache {
    /// Start caching around `seed`. The worker starts immediately.
    pub fn new(provider: Arc<dyn PageProvider>, seed: Page, mut config: PrefetchConfig) -> Self {
        let (lookahead, lookbehind) = (
            config.lookahead.clamp(1, MAX_DEPTH),
            config.lookbehind.clamp(1, MAX_DEPTH),
        );
        if (lookahead, lookbehind) != (config.lookahead, config.lookbehind) {
            warn!(
                "prefetch: lookahead={} lookbehind={} clamped to {lookahead}/{lookbehind}",
                config.lookahead, config.lookbehind
            );
            config.lookahead = lookahead;
            config.lookbehind = lookbehind;
        }
        if config.idle_tick < MIN_IDLE_TICK {
            warn!("prefetch: idle tick {:?} raised to {MIN_IDLE_TICK:?}", config.idle_tick);
            config.idle_tick = MIN_IDLE_TICK;
        }

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                current: Arc::new(seed),
                forward: VecDeque::new(),
                backward: VecDeque::new(),
                stopped: false,
                generation: 0,
                moves: 0,
            }),
            forward_ready: Condvar::new(),
            backward_ready: Condvar::new(),
            wake: Condvar::new(),
        });

        let cache = Self {
            shared,
            provider: Mutex::new(provider),
            config,
            worker: Mutex::new(None),
        };
        let handle = cache.spawn_worker(0);
        *cache.lock_worker() = Some(handle);
        cache
    }

    /// Step to the next page, waiting for the worker if it is not buffered
    /// yet. At the end of the sequence the current page is returned as is.
    pub fn next(&self) -> Arc<Page> {
        self.step(Direction::Forward)
    }

    /// Step to the previous page. Mirror image of [`next`](Self::next).
    pub fn previous(&self) -> Arc<Page> {
        self.step(Direction::Backward)
    }

    /// Jump to `seed`, dropping everything buffered.
    pub fn reset(&self, seed: Page) {
        let provider = self.provider();
        self.reset_with(provider, seed);
    }

    /// Jump to `seed` of a different provider.
    pub fn reset_with(&self, provider: Arc<dyn PageProvider>, seed: Page) {
        let mut worker = self.lock_worker();
        self.halt(&mut worker);

        *self.provider.lock().unwrap_or_else(PoisonError::into_inner) = provider;
        let generation = {
            let mut state = self.shared.lock();
            info!("prefetch: reset to {}", seed.id());
            state.current = Arc::new(seed);
            state.forward.clear();
            state.backward.clear();
            state.stopped = false;
            state.generation += 1;
            state.generation
        };
        self.shared.notify_all();
        *worker = Some(self.spawn_worker(generation));
    }

    /// Stop the worker and wait for it to exit. Idempotent.
    ///
    /// Consumers blocked in `next()` / `previous()` return the current page.
    pub fn stop(&self) {
        let mut worker = self.lock_worker();
        self.halt(&mut worker);
    }

    pub fn is_running(&self) -> bool {
        !self.shared.lock().stopped
    }

    pub fn current(&self) -> Arc<Page> {
        Arc::clone(&self.shared.lock().current)
    }

    pub fn provider(&self) -> Arc<dyn PageProvider> {
        self.provider
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn config(&self) -> &PrefetchConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.shared.lock();
        Snapshot {
            current: state.current.id().clone(),
            forward: state.forward.iter().map(|p| p.id().clone()).collect(),
            backward: state.backward.iter().map(|p| p.id().clone()).collect(),
        }
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn halt(&self, worker: &mut Option<JoinHandle<()>>) {
        self.shared.lock().stopped = true;
        self.shared.notify_all();
        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                warn!("prefetch: worker panicked");
            }
            info!("prefetch: worker joined");
        }
    }

    fn spawn_worker(&self, generation: u64) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        let provider = self.provider();
        let config = self.config.clone();
        thread::spawn(move || run_worker(&shared, provider.as_ref(), &config, generation))
    }

    fn step(&self, dir: Direction) -> Arc<Page> {
        let mut state = self.shared.lock();
        if dir.link(&state.current).is_none() {
            trace!("{}: end of sequence at {}", dir.label(), state.current.id());
            return Arc::clone(&state.current);
        }

        let generation = state.generation;
        let deadline = self.config.wait_timeout.map(|t| Instant::now() + t);
        let wait_start = Instant::now();
        let page = loop {
            if state.generation != generation {
                debug!("{}: cache was reset while waiting", dir.label());
                return Arc::clone(&state.current);
            }
            if let Some(page) = state.queue_mut(dir).pop_front() {
                break page;
            }
            if state.stopped {
                debug!("{}: cache stopped while waiting", dir.label());
                return Arc::clone(&state.current);
            }
            let cond = self.shared.ready(dir);
            state = match deadline {
                None => cond.wait(state).unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        warn!(
                            "{}: no page after {:.1}s, staying at {}",
                            dir.label(),
                            wait_start.elapsed().as_secs_f64(),
                            state.current.id()
                        );
                        return Arc::clone(&state.current);
                    }
                    cond.wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        };

        let waited = wait_start.elapsed();
        if waited > Duration::from_millis(1) {
            debug!(
                "{}: waited {:.1}ms for {}",
                dir.label(),
                waited.as_secs_f64() * 1000.0,
                page.id()
            );
        }

        let back = dir.opposite();
        let cap = self.config.capacity(back);
        let old = std::mem::replace(&mut state.current, page);
        let queue = state.queue_mut(back);
        queue.push_front(old);
        queue.truncate(cap);
        state.moves += 1;
        debug!("{}: now at {}", dir.label(), state.current.id());

        self.shared.wake.notify_one();
        Arc::clone(&state.current)
    }
}

impl Drop for PrefetchCache {
    fn drop(&mut self) {
        self.stop();
    }
}

/// What one fill attempt achieved.
enum Fill {
    Appended,
    Idle,
    Failed,
    Stale,
    Exit,
}

fn run_worker(
    shared: &Shared,
    provider: &dyn PageProvider,
    config: &PrefetchConfig,
    generation: u64,
) {
    debug!("prefetch worker: started (generation {generation}, provider {})", provider.name());
    loop {
        let moves_seen = shared.lock().moves;
        let mut progressed = false;
        for dir in [Direction::Forward, Direction::Backward] {
            match fill(shared, provider, config, dir, generation) {
                Fill::Appended => progressed = true,
                Fill::Exit => {
                    debug!("prefetch worker: exiting (generation {generation})");
                    return;
                }
                Fill::Idle | Fill::Failed | Fill::Stale => {}
            }
        }
        if progressed {
            continue;
        }

        let state = shared.lock();
        let (state, _) = shared
            .wake
            .wait_timeout_while(state, config.idle_tick, |s| {
                !s.stopped && s.generation == generation && s.moves == moves_seen
            })
            .unwrap_or_else(PoisonError::into_inner);
        if state.stopped || state.generation != generation {
            debug!("prefetch worker: exiting (generation {generation})");
            return;
        }
    }
}

/// Try to extend the queue in `dir` by one page.
fn fill(
    shared: &Shared,
    provider: &dyn PageProvider,
    config: &PrefetchConfig,
    dir: Direction,
    generation: u64,
) -> Fill {
    let target = {
        let state = shared.lock();
        if state.stopped || state.generation != generation {
            return Fill::Exit;
        }
        if state.queue(dir).len() >= config.capacity(dir) {
            return Fill::Idle;
        }
        match dir.link(state.anchor(dir)) {
            Some(id) => id.clone(),
            None => return Fill::Idle,
        }
    };

    let start = Instant::now();
    let page = match provider.load(&target) {
        Ok(page) => Arc::new(page),
        Err(e) => {
            warn!("prefetch worker: {} fetch of {target} failed: {e}", dir.label());
            return Fill::Failed;
        }
    };
    trace!(
        "prefetch worker: fetched {target} in {:.1}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );

    let mut state = shared.lock();
    if state.stopped || state.generation != generation {
        debug!("prefetch worker: dropping {target}, cache stopped or reset");
        return Fill::Exit;
    }
    if state.queue(dir).len() >= config.capacity(dir) || !dir.follows(&page, state.anchor(dir)) {
        debug!("prefetch worker: dropping stale {} page {target}", dir.label());
        return Fill::Stale;
    }
    state.queue_mut(dir).push_back(page);
    debug!(
        "prefetch worker: {} queue +{target} (len {})",
        dir.label(),
        state.queue(dir).len()
    );
    shared.ready(dir).notify_all();
    Fill::Appended
}
