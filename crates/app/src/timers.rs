//! Timer controllers
//!
//! Each timer kind has at most one live task. Arming a kind again replaces
//! the previous task and bumps its sequence number, so a tick that was
//! already in flight from the old task is recognised as stale and dropped.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::trace;

use crate::runtime::RuntimeEvent;
use crate::session::TimerKind;

pub struct Timers {
    armed: HashMap<TimerKind, (u64, JoinHandle<()>)>,
    next_seq: u64,
    events: mpsc::Sender<RuntimeEvent>,
}

impl Timers {
    pub fn new(events: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            armed: HashMap::new(),
            next_seq: 0,
            events,
        }
    }

    /// Start (or restart) a timer from zero
    pub fn arm(&mut self, kind: TimerKind) {
        self.disarm(kind);
        self.next_seq += 1;
        let seq = self.next_seq;
        let events = self.events.clone();
        let period = kind.period();

        let task = if kind.repeats() {
            tokio::spawn(async move {
                let mut ticks = interval_at(Instant::now() + period, period);
                loop {
                    ticks.tick().await;
                    if events.send(RuntimeEvent::Timer { kind, seq }).await.is_err() {
                        break;
                    }
                }
            })
        } else {
            tokio::spawn(async move {
                tokio::time::sleep(period).await;
                let _ = events.send(RuntimeEvent::Timer { kind, seq }).await;
            })
        };

        trace!(?kind, seq, "Timer armed");
        self.armed.insert(kind, (seq, task));
    }

    pub fn disarm(&mut self, kind: TimerKind) {
        if let Some((seq, task)) = self.armed.remove(&kind) {
            task.abort();
            trace!(?kind, seq, "Timer disarmed");
        }
    }

    pub fn disarm_all(&mut self) {
        for (_, (_, task)) in self.armed.drain() {
            task.abort();
        }
    }

    #[cfg(test)]
    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.armed.contains_key(&kind)
    }

    /// Accept a tick. Returns false for ticks from a replaced or disarmed
    /// timer. One-shot timers are forgotten once they fire.
    pub fn fired(&mut self, kind: TimerKind, seq: u64) -> bool {
        match self.armed.get(&kind) {
            Some((current, _)) if *current == seq => {
                if !kind.repeats() {
                    self.armed.remove(&kind);
                }
                true
            }
            _ => false,
        }
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        self.disarm_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn next_tick(rx: &mut mpsc::Receiver<RuntimeEvent>) -> (TimerKind, u64) {
        match rx.recv().await {
            Some(RuntimeEvent::Timer { kind, seq }) => (kind, seq),
            _ => panic!("expected a timer event"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_fires_once() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut timers = Timers::new(tx);
        let start = Instant::now();

        timers.arm(TimerKind::TypingDecay);
        let (kind, seq) = next_tick(&mut rx).await;
        assert_eq!(kind, TimerKind::TypingDecay);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert!(timers.fired(kind, seq));
        assert!(!timers.is_armed(TimerKind::TypingDecay));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_restarts_from_zero() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut timers = Timers::new(tx);
        let start = Instant::now();

        timers.arm(TimerKind::TypingDecay);
        tokio::time::sleep(Duration::from_secs(2)).await;
        timers.arm(TimerKind::TypingDecay);

        let (kind, seq) = next_tick(&mut rx).await;
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert!(timers.fired(kind, seq));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeating_ticks_every_second() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut timers = Timers::new(tx);
        let start = Instant::now();

        timers.arm(TimerKind::QueueClock);
        for n in 1..=3u64 {
            let (kind, seq) = next_tick(&mut rx).await;
            assert_eq!(start.elapsed(), Duration::from_secs(n));
            assert!(timers.fired(kind, seq));
        }
        assert!(timers.is_armed(TimerKind::QueueClock));

        timers.disarm(TimerKind::QueueClock);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_stale_sequence_rejected() {
        let (tx, _rx) = mpsc::channel(8);
        let mut timers = Timers::new(tx);
        assert!(!timers.fired(TimerKind::Cooldown, 1));
    }
}
