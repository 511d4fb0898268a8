//! Rate limiting of recomputation. A `Throttle` decides, for a stream of trigger events, when
//! work should actually run: at most once per interval, and always once more after the last
//! trigger so that the final state is never lost. Time is read through a `Clock` so the same
//! logic runs against the system clock in use and against a manual clock in tests.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// A monotonic time source. `now` is measured from an arbitrary fixed epoch.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// The monotonic system clock, measured from the moment it was created
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}

/// A clock which only moves when told to. Clones share the same time, so a test can keep one
/// handle while another is owned by the code under test.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, now: Duration) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// What a throttle decided to do with a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The interval has elapsed, run now
    RunNow,

    /// Too soon; a single deferred run is scheduled at this time, replacing any earlier one
    Deferred(Duration),
}

/// Leading and trailing edge rate limiter.
///
/// A trigger after the interval has elapsed since the last run is answered with
/// `Trigger::RunNow`. A trigger before that schedules one deferred run at the interval
/// boundary. Further triggers inside the same interval move nothing and add nothing: there is
/// only ever one pending deadline, and whoever runs it reads the latest state at that time.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last_run: Option<Duration>,
    deadline: Option<Duration>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_run: None,
            deadline: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Change the interval. An already scheduled deadline is moved to match.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
        if let (Some(_), Some(last)) = (self.deadline, self.last_run) {
            self.deadline = Some(last + interval);
        }
    }

    pub fn trigger(&mut self, now: Duration) -> Trigger {
        if let Some(deadline) = self.deadline {
            log::trace!("throttle: trigger at {:?} folded into deadline {:?}", now, deadline);
            return Trigger::Deferred(deadline);
        }

        match self.last_run {
            Some(last) if now < last + self.interval => {
                let deadline = last + self.interval;
                self.deadline = Some(deadline);
                log::trace!("throttle: trigger at {:?} deferred to {:?}", now, deadline);
                Trigger::Deferred(deadline)
            }
            _ => {
                self.last_run = Some(now);
                Trigger::RunNow
            }
        }
    }

    /// Returns true if a deferred run is due at `now`, in which case the caller must run it.
    /// The deadline is consumed and the interval restarts from `now`.
    pub fn poll(&mut self, now: Duration) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.last_run = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Drop any pending deferred run
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }
}

/// A throttle bound to the work it guards. The callback takes no arguments; it is expected to
/// read whatever state it needs at the moment it runs, which is what makes the trailing run
/// use the most recent parameters.
pub struct ThrottledCall<F: FnMut()> {
    throttle: Throttle,
    callback: F,
    run_count: usize,
}

impl<F: FnMut()> ThrottledCall<F> {
    pub fn new(interval: Duration, callback: F) -> Self {
        Self {
            throttle: Throttle::new(interval),
            callback,
            run_count: 0,
        }
    }

    /// Request a run. Returns true if the callback ran immediately.
    pub fn trigger(&mut self, now: Duration) -> bool {
        match self.throttle.trigger(now) {
            Trigger::RunNow => {
                self.run();
                true
            }
            Trigger::Deferred(_) => false,
        }
    }

    /// Run the deferred call if it is due. Returns true if the callback ran.
    pub fn poll(&mut self, now: Duration) -> bool {
        if self.throttle.poll(now) {
            self.run();
            true
        } else {
            false
        }
    }

    pub fn cancel(&mut self) {
        self.throttle.cancel();
    }

    pub fn is_pending(&self) -> bool {
        self.throttle.is_pending()
    }

    pub fn run_count(&self) -> usize {
        self.run_count
    }

    fn run(&mut self) {
        self.run_count += 1;
        (self.callback)();
    }
}
