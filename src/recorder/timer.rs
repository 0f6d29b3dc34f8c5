//! Segment timer
//!
//! Cancellable periodic ticker that drives phase progress. Progress is the
//! fraction of ticks elapsed, so it reaches exactly 1.0 on the last tick.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Number of ticks needed to cover `duration`, at least one
fn ticks_for(duration: Duration, interval: Duration) -> u64 {
    let ticks = duration.as_nanos().div_ceil(interval.as_nanos()).max(1);
    u64::try_from(ticks).unwrap_or(u64::MAX)
}

pub struct SegmentTimer {
    interval: Duration,
    running: Arc<AtomicBool>,
    /// Bumped on every start and cancel; a tick task only calls back while
    /// its own generation is current
    generation: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl SegmentTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(MIN_INTERVAL),
            running: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            task: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start ticking towards `duration`.
    ///
    /// `on_tick` receives 0.0 immediately and then the progress after every
    /// tick. `on_complete` runs once after the tick that reaches 1.0.
    /// Returns `false` without doing anything if a phase is already running.
    pub fn start<T, C>(&mut self, duration: Duration, on_tick: T, on_complete: C) -> bool
    where
        T: Fn(f64) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        if self.is_running() {
            tracing::debug!("Segment timer already running, ignoring start");
            return false;
        }

        if let Some(finished) = self.task.take() {
            finished.abort();
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let current = self.generation.clone();
        let running = self.running.clone();
        let interval = self.interval;
        let total_ticks = ticks_for(duration, interval);

        running.store(true, Ordering::SeqCst);
        on_tick(0.0);

        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            let mut ticks = 0u64;

            loop {
                ticker.tick().await;
                if current.load(Ordering::SeqCst) != generation {
                    return;
                }

                ticks += 1;
                let progress = (ticks as f64 / total_ticks as f64).min(1.0);
                on_tick(progress);

                if ticks >= total_ticks {
                    running.store(false, Ordering::SeqCst);
                    on_complete();
                    return;
                }
            }
        }));

        true
    }

    /// Stop ticking. No callbacks fire afterwards.
    pub fn cancel(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for SegmentTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    struct Recorded {
        ticks: Arc<Mutex<Vec<f64>>>,
        completions: Arc<AtomicUsize>,
    }

    fn start(timer: &mut SegmentTimer, duration: Duration) -> (bool, Recorded) {
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let completions = Arc::new(AtomicUsize::new(0));
        let t = ticks.clone();
        let c = completions.clone();
        let started = timer.start(
            duration,
            move |p| t.lock().push(p),
            move || {
                c.fetch_add(1, Ordering::SeqCst);
            },
        );
        (started, Recorded { ticks, completions })
    }

    #[test]
    fn test_ticks_for() {
        let tick = Duration::from_millis(100);
        assert_eq!(ticks_for(Duration::from_secs(5), tick), 50);
        assert_eq!(ticks_for(Duration::from_millis(150), tick), 2);
        assert_eq!(ticks_for(Duration::ZERO, tick), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_five_seconds_is_fifty_ticks() {
        let mut timer = SegmentTimer::new(Duration::from_millis(100));
        let (started, recorded) = start(&mut timer, Duration::from_secs(5));
        assert!(started);
        assert!(timer.is_running());

        tokio::time::sleep(Duration::from_millis(4_950)).await;
        assert_eq!(recorded.completions.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(recorded.completions.load(Ordering::SeqCst), 1);
        assert!(!timer.is_running());

        let ticks = recorded.ticks.lock().clone();
        // Initial 0.0 plus one per tick
        assert_eq!(ticks.len(), 51);
        assert_eq!(ticks[0], 0.0);
        assert_eq!(*ticks.last().unwrap(), 1.0);
        assert!(ticks.windows(2).all(|w| w[0] <= w[1]));

        // Inert afterwards
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(recorded.completions.load(Ordering::SeqCst), 1);
        assert_eq!(recorded.ticks.lock().len(), 51);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_running_is_noop() {
        let mut timer = SegmentTimer::new(Duration::from_millis(100));
        let (_, first) = start(&mut timer, Duration::from_secs(1));
        let (started, second) = start(&mut timer, Duration::from_secs(1));
        assert!(!started);

        tokio::time::sleep(Duration::from_millis(1_050)).await;
        assert_eq!(first.completions.load(Ordering::SeqCst), 1);
        assert_eq!(second.completions.load(Ordering::SeqCst), 0);
        assert!(second.ticks.lock().is_empty());

        // Restart after completion
        let (started, third) = start(&mut timer, Duration::from_millis(200));
        assert!(started);
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(third.completions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_callbacks() {
        let mut timer = SegmentTimer::new(Duration::from_millis(100));
        let (_, recorded) = start(&mut timer, Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(350)).await;
        timer.cancel();
        let seen = recorded.ticks.lock().len();
        assert_eq!(seen, 4);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(recorded.ticks.lock().len(), seen);
        assert_eq!(recorded.completions.load(Ordering::SeqCst), 0);
        assert!(!timer.is_running());
    }
}
