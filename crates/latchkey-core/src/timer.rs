//! One-shot interval timer over a periodic tick source.
//!
//! A [`TickSource`] calls back once per tick from outside the foreground
//! (a hardware interrupt, or a spawned task on a host). [`IntervalTimer`]
//! turns that into "signal once after N ticks".
//!
//! # Invariants
//!
//! - The tick counter is owned by the callback closure. Nothing else reads or
//!   writes it.
//! - The only state shared between callback and foreground is one
//!   [`CompletionFlag`]: written by the callback, read and cleared by the
//!   foreground.
//! - At most one ticket is armed per timer; re-arming without disarming is an
//!   error.
//! - A ticket completes at most once.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use thiserror::Error;
use tokio::task::JoinHandle;

/// Hardware timer channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerChannel {
    /// Channel 0.
    Timer0,
    /// Channel 1.
    Timer1,
    /// Channel 2, the one both nodes use for door and alarm timing.
    Timer2,
}

/// Callback invoked once per tick.
pub type TickCallback = Box<dyn FnMut() + Send + 'static>;

/// A periodic tick source with per-channel start and stop.
pub trait TickSource {
    /// Start delivering ticks on `channel` to `callback`, replacing any
    /// previous callback on that channel.
    fn start(&mut self, channel: TimerChannel, callback: TickCallback);

    /// Stop ticks on `channel`. Stopping an idle channel is a no-op.
    fn stop(&mut self, channel: TimerChannel);
}

/// Single-writer, single-reader completion flag.
#[derive(Debug, Clone, Default)]
pub struct CompletionFlag(Arc<AtomicBool>);

impl CompletionFlag {
    /// Create a lowered flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Called from the tick context only.
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether the flag is raised.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Lower the flag.
    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// "Armed on channel T, counting toward K ticks."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTicket {
    /// Channel the ticket runs on.
    pub channel: TimerChannel,
    /// Tick count at which the ticket completes.
    pub target: u32,
}

/// Interval timer errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    /// A ticket is already armed; disarm first.
    #[error("timer already armed on {channel:?} for {target} ticks")]
    AlreadyArmed {
        /// Channel of the armed ticket.
        channel: TimerChannel,
        /// Target of the armed ticket.
        target: u32,
    },

    /// A zero-tick target would never be observed.
    #[error("timer target must be at least one tick")]
    ZeroTarget,
}

/// One-shot interval timer bound to a channel of a tick source.
pub struct IntervalTimer<T: TickSource> {
    source: T,
    channel: TimerChannel,
    ticket: Option<TimerTicket>,
    flag: CompletionFlag,
}

impl<T: TickSource> IntervalTimer<T> {
    /// Create a disarmed timer on `channel`.
    pub fn new(source: T, channel: TimerChannel) -> Self {
        Self { source, channel, ticket: None, flag: CompletionFlag::new() }
    }

    /// Arm a one-shot completion after `target` ticks.
    ///
    /// # Errors
    ///
    /// - `TimerError::ZeroTarget` if `target` is zero
    /// - `TimerError::AlreadyArmed` if a ticket is already armed
    pub fn arm(&mut self, target: u32) -> Result<TimerTicket, TimerError> {
        if target == 0 {
            return Err(TimerError::ZeroTarget);
        }
        if let Some(ticket) = self.ticket {
            return Err(TimerError::AlreadyArmed { channel: ticket.channel, target: ticket.target });
        }

        self.flag.clear();
        let flag = self.flag.clone();
        let mut count: u32 = 0;
        self.source.start(
            self.channel,
            Box::new(move || {
                if count < target {
                    count += 1;
                    if count == target {
                        flag.raise();
                    }
                }
            }),
        );

        let ticket = TimerTicket { channel: self.channel, target };
        self.ticket = Some(ticket);
        tracing::trace!(channel = ?self.channel, target, "timer armed");
        Ok(ticket)
    }

    /// Stop the tick source, drop the count and lower the flag.
    ///
    /// Disarming an idle timer is a no-op.
    pub fn disarm(&mut self) {
        if self.ticket.take().is_some() {
            self.source.stop(self.channel);
            tracing::trace!(channel = ?self.channel, "timer disarmed");
        }
        self.flag.clear();
    }

    /// Whether the armed ticket has reached its target.
    pub fn is_complete(&self) -> bool {
        self.ticket.is_some() && self.flag.is_set()
    }

    /// Currently armed ticket.
    pub fn ticket(&self) -> Option<TimerTicket> {
        self.ticket
    }

    /// Handle to the completion flag, for await helpers.
    pub fn flag(&self) -> CompletionFlag {
        self.flag.clone()
    }

    /// Borrow the underlying tick source.
    pub fn source(&self) -> &T {
        &self.source
    }
}

/// Host tick source: one tokio interval task per running channel.
///
/// Must be used inside a tokio runtime.
#[derive(Debug)]
pub struct TokioTickSource {
    period: Duration,
    tasks: HashMap<TimerChannel, JoinHandle<()>>,
}

impl TokioTickSource {
    /// Create a source ticking every `period`.
    pub fn new(period: Duration) -> Self {
        Self { period, tasks: HashMap::new() }
    }

    /// Tick period.
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl TickSource for TokioTickSource {
    fn start(&mut self, channel: TimerChannel, mut callback: TickCallback) {
        self.stop(channel);
        let period = self.period;
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Burst);
            // First tick of a tokio interval fires immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                callback();
            }
        });
        self.tasks.insert(channel, task);
    }

    fn stop(&mut self, channel: TimerChannel) {
        if let Some(task) = self.tasks.remove(&channel) {
            task.abort();
        }
    }
}

impl Drop for TokioTickSource {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}
