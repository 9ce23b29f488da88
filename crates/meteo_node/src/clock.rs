//! Relógio do agendador: tempo monotônico, tempo Unix e espera.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Fonte de tempo usada pelo agendador.
pub trait Clock {
    /// Tempo monotônico desde uma origem arbitrária.
    fn now(&self) -> Duration;

    /// Tempo Unix em nanossegundos (timestamp das linhas).
    fn unix_nanos(&self) -> u64;

    /// Bloqueia a thread pelo tempo dado.
    fn sleep(&self, duration: Duration);
}

/// Relógio real do sistema.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
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
        self.origin.elapsed()
    }

    fn unix_nanos(&self) -> u64 {
        // Relógio antes de 1970 (RTC sem NTP) vira 0
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Relógio manual para testes: só avança em `sleep`/`advance`.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct ManualClock {
    inner: std::rc::Rc<ManualState>,
}

#[cfg(test)]
#[derive(Debug, Default)]
struct ManualState {
    now: std::cell::Cell<Duration>,
    epoch_nanos: std::cell::Cell<u64>,
    sleeps: std::cell::RefCell<Vec<Duration>>,
}

#[cfg(test)]
impl ManualClock {
    pub(crate) fn starting_at(epoch_nanos: u64) -> Self {
        let clock = Self::default();
        clock.inner.epoch_nanos.set(epoch_nanos);
        clock
    }

    /// Simula trabalho que consome tempo (ex: envio lento).
    pub(crate) fn advance(&self, d: Duration) {
        self.inner.now.set(self.inner.now.get() + d);
    }

    pub(crate) fn sleeps(&self) -> Vec<Duration> {
        self.inner.sleeps.borrow().clone()
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.inner.now.get()
    }

    fn unix_nanos(&self) -> u64 {
        self.inner.epoch_nanos.get() + self.inner.now.get().as_nanos() as u64
    }

    fn sleep(&self, duration: Duration) {
        self.inner.sleeps.borrow_mut().push(duration);
        self.advance(duration);
    }
}
