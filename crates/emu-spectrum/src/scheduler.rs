//! Cycle-driven timing: idle ticks, the 50 Hz interrupt and the wall-clock
//! throttle.
//!
//! Every executed instruction adds its cycles to an accumulator. Each time
//! the accumulator exceeds `cycles_per_tick` the threshold is subtracted and
//! an idle tick runs. Unless turbo is on, the idle tick sleeps until the
//! tick's wall-clock deadline. Every second idle tick raises the maskable
//! interrupt.

use std::thread;
use std::time::{Duration, Instant};

use emu_core::{MasterClock, Ticks};

/// Idle ticks per interrupt.
const TICKS_PER_INTERRUPT: u64 = 2;

pub struct Scheduler {
    clock: MasterClock,
    cycles_per_tick: Ticks,
    accumulated: Ticks,
    idle_ticks: u64,
    turbo: bool,
    /// Wall-clock time the last idle tick was due.
    deadline: Option<Instant>,
}

impl Scheduler {
    #[must_use]
    pub fn new(clock: MasterClock, cycles_per_tick: u64, turbo: bool) -> Self {
        Self {
            clock,
            cycles_per_tick: Ticks::new(cycles_per_tick.max(1)),
            accumulated: Ticks::ZERO,
            idle_ticks: 0,
            turbo,
            deadline: None,
        }
    }

    /// Account for executed cycles. Returns true if an interrupt is due.
    pub fn advance(&mut self, cycles: u32) -> bool {
        self.accumulated += Ticks::from(cycles);
        let mut interrupt = false;
        while self.accumulated > self.cycles_per_tick {
            self.accumulated -= self.cycles_per_tick;
            interrupt |= self.idle_tick();
        }
        interrupt
    }

    fn idle_tick(&mut self) -> bool {
        self.idle_ticks += 1;
        if !self.turbo {
            self.throttle();
        }
        self.idle_ticks % TICKS_PER_INTERRUPT == 0
    }

    fn throttle(&mut self) {
        let period = self.clock.duration_of(self.cycles_per_tick);
        let now = Instant::now();
        let deadline = self.deadline.map_or(now, |last| last + period);
        if deadline > now {
            thread::sleep(deadline - now);
            self.deadline = Some(deadline);
        } else {
            // Running behind: resynchronise rather than sprint to catch up.
            self.deadline = Some(now);
        }
    }

    /// Forget the accumulator and wall-clock deadline, as on reset.
    pub fn reset(&mut self) {
        self.accumulated = Ticks::ZERO;
        self.idle_ticks = 0;
        self.deadline = None;
    }

    pub fn set_turbo(&mut self, turbo: bool) {
        self.turbo = turbo;
        self.deadline = None;
    }

    #[must_use]
    pub fn turbo(&self) -> bool {
        self.turbo
    }

    /// Cycles accumulated towards the next idle tick.
    #[must_use]
    pub fn accumulated(&self) -> Ticks {
        self.accumulated
    }

    #[must_use]
    pub fn idle_ticks(&self) -> u64 {
        self.idle_ticks
    }

    #[must_use]
    pub fn cycles_per_tick(&self) -> Ticks {
        self.cycles_per_tick
    }

    /// Wall-clock length of one idle tick.
    #[must_use]
    pub fn tick_period(&self) -> Duration {
        self.clock.duration_of(self.cycles_per_tick)
    }
}
