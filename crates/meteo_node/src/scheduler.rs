//! Agendador – o laço de controle do nó.
//!
//! Ciclo: Idle → Sampling → Encoding → Sending → Idle. O intervalo é medido
//! de início a início de ciclo; envio lento só encurta a espera (mínimo 0).
//! Falha de entrega tem até `max_attempts` tentativas imediatas no mesmo
//! ciclo, depois o lote é descartado. Nada é enfileirado entre ciclos.

use crate::clock::Clock;
use crate::indicator::StatusIndicator;
use crate::registry::SensorRegistry;
use crate::transport::TelemetryTransport;
use meteo_core::protocol::encode_batch;
use meteo_core::status::{CycleOutcome, CycleReport};
use std::time::Duration;
use tracing::{debug, warn};

pub struct Scheduler<C: Clock> {
    interval: Duration,
    max_attempts: u32,
    clock: C,
    indicator: Box<dyn StatusIndicator>,
    cycle: u64,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(
        interval: Duration,
        max_attempts: u32,
        clock: C,
        indicator: Box<dyn StatusIndicator>,
    ) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
            clock,
            indicator,
            cycle: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Um ciclo completo, sem a espera final.
    pub fn run_cycle(
        &mut self,
        registry: &mut SensorRegistry,
        transport: &mut dyn TelemetryTransport,
    ) -> CycleReport {
        self.cycle += 1;

        // ── Sampling ──
        let timestamp_nanos = self.clock.unix_nanos();
        let batch = registry.collect_all(timestamp_nanos);

        // ── Encoding ──
        let payload = encode_batch(&batch);

        let mut report = CycleReport {
            cycle: self.cycle,
            timestamp_nanos,
            fields: batch.len(),
            bytes: payload.len(),
            failed_sensors: registry.last_failures().to_vec(),
            attempts: 0,
            outcome: CycleOutcome::NothingToSend,
        };

        // ── Sending ──
        if !payload.is_empty() {
            debug!("→ {}", String::from_utf8_lossy(&payload).trim_end());
            report.outcome = loop {
                report.attempts += 1;
                match transport.send(&payload) {
                    Ok(()) => break CycleOutcome::Delivered,
                    Err(e) => {
                        warn!(
                            "Envio {}/{} falhou: {e}",
                            report.attempts, self.max_attempts
                        );
                        if report.attempts >= self.max_attempts {
                            break CycleOutcome::Failed {
                                reason: e.to_string(),
                            };
                        }
                    }
                }
            };
        }

        self.indicator.report(&report);
        report
    }

    /// Executa um ciclo e dorme pelo restante do intervalo.
    pub fn step(
        &mut self,
        registry: &mut SensorRegistry,
        transport: &mut dyn TelemetryTransport,
    ) -> CycleReport {
        let started = self.clock.now();
        let report = self.run_cycle(registry, transport);

        let elapsed = self.clock.now().saturating_sub(started);
        if elapsed > self.interval {
            debug!(
                "Ciclo #{} levou {:?} (> intervalo de {:?})",
                report.cycle, elapsed, self.interval
            );
        }
        self.clock.sleep(self.interval.saturating_sub(elapsed));

        report
    }

    /// Laço principal; só termina com o desligamento do dispositivo.
    pub fn run_forever(
        &mut self,
        registry: &mut SensorRegistry,
        transport: &mut dyn TelemetryTransport,
    ) -> ! {
        loop {
            self.step(registry, transport);
        }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::registry::tests::StubSource;
    use crate::transport::TransportError;
    use std::cell::RefCell;
    use std::rc::Rc;

    const INTERVAL: Duration = Duration::from_secs(10);

    /// Transporte que falha `failures` vezes e depois aceita.
    struct StubTransport {
        failures: u32,
        clock: ManualClock,
        send_time: Duration,
        calls: Vec<Duration>,
        payloads: Vec<Vec<u8>>,
    }

    impl StubTransport {
        fn failing(failures: u32, clock: &ManualClock) -> Self {
            Self {
                failures,
                clock: clock.clone(),
                send_time: Duration::ZERO,
                calls: Vec::new(),
                payloads: Vec::new(),
            }
        }
    }

    impl TelemetryTransport for StubTransport {
        fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
            self.calls.push(self.clock.now());
            self.clock.advance(self.send_time);
            if self.failures > 0 {
                self.failures -= 1;
                return Err(TransportError::Unreachable("sem rota".into()));
            }
            self.payloads.push(payload.to_vec());
            Ok(())
        }
    }

    /// Guarda os relatórios recebidos.
    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<CycleReport>>>);

    impl StatusIndicator for Recorder {
        fn report(&mut self, report: &CycleReport) {
            self.0.borrow_mut().push(report.clone());
        }
    }

    fn home_registry() -> SensorRegistry {
        SensorRegistry::new(
            "home",
            vec![StubSource::ok(
                "dht22",
                &[("temperature", 21.5), ("humidity", 45.0)],
            )],
        )
    }

    fn scheduler(clock: &ManualClock, max_attempts: u32) -> (Scheduler<ManualClock>, Recorder) {
        let recorder = Recorder::default();
        let scheduler = Scheduler::new(
            INTERVAL,
            max_attempts,
            clock.clone(),
            Box::new(recorder.clone()),
        );
        (scheduler, recorder)
    }

    #[test]
    fn delivers_reference_line_first_try() {
        let clock = ManualClock::starting_at(1_700_000_000_000_000_000);
        let (mut sched, recorder) = scheduler(&clock, 3);
        let mut registry = home_registry();
        let mut transport = StubTransport::failing(0, &clock);

        let report = sched.run_cycle(&mut registry, &mut transport);
        assert_eq!(report.outcome, CycleOutcome::Delivered);
        assert_eq!(report.attempts, 1);
        assert_eq!(report.fields, 2);
        assert_eq!(report.bytes, 58);
        assert_eq!(
            transport.payloads,
            vec![b"home temperature=21.50,humidity=45.00 1700000000000000000\n".to_vec()]
        );
        assert_eq!(recorder.0.borrow().len(), 1);
    }

    #[test]
    fn k_failures_below_budget_succeed_after_k_plus_one_attempts() {
        let clock = ManualClock::default();
        let (mut sched, _) = scheduler(&clock, 4);
        let mut registry = home_registry();
        let mut transport = StubTransport::failing(2, &clock);

        let report = sched.run_cycle(&mut registry, &mut transport);
        assert!(report.delivered());
        assert_eq!(report.attempts, 3);
        assert_eq!(transport.calls.len(), 3);
        assert_eq!(transport.payloads.len(), 1);
    }

    #[test]
    fn always_failing_exhausts_budget_and_keeps_schedule() {
        let clock = ManualClock::default();
        let (mut sched, recorder) = scheduler(&clock, 3);
        let mut registry = home_registry();
        let mut transport = StubTransport::failing(u32::MAX, &clock);

        let first = sched.step(&mut registry, &mut transport);
        assert!(matches!(first.outcome, CycleOutcome::Failed { .. }));
        assert_eq!(first.attempts, 3);
        assert_eq!(transport.calls.len(), 3);

        let second = sched.step(&mut registry, &mut transport);
        assert_eq!(second.cycle, 2);
        assert_eq!(second.attempts, 3);

        // Segundo ciclo começa após o intervalo normal, não imediatamente
        assert_eq!(transport.calls[3], INTERVAL);
        assert_eq!(clock.sleeps(), vec![INTERVAL, INTERVAL]);
        assert_eq!(recorder.0.borrow().len(), 2);
    }

    #[test]
    fn failed_batch_is_not_carried_over() {
        let clock = ManualClock::starting_at(100);
        let (mut sched, _) = scheduler(&clock, 2);
        let mut registry = home_registry();
        let mut transport = StubTransport::failing(2, &clock);

        assert!(!sched.step(&mut registry, &mut transport).delivered());
        assert!(sched.step(&mut registry, &mut transport).delivered());

        // Só a linha do segundo ciclo chega, com o timestamp do segundo ciclo
        assert_eq!(transport.payloads.len(), 1);
        let line = String::from_utf8(transport.payloads[0].clone()).unwrap();
        let expected_ts = 100 + INTERVAL.as_nanos() as u64;
        assert!(line.ends_with(&format!(" {expected_ts}\n")), "{line}");
    }

    #[test]
    fn empty_batch_sends_nothing() {
        let clock = ManualClock::default();
        let (mut sched, _) = scheduler(&clock, 3);
        let mut registry = SensorRegistry::new("home", vec![StubSource::failing("dht22")]);
        let mut transport = StubTransport::failing(0, &clock);

        let report = sched.run_cycle(&mut registry, &mut transport);
        assert_eq!(report.outcome, CycleOutcome::NothingToSend);
        assert_eq!(report.attempts, 0);
        assert_eq!(report.bytes, 0);
        assert_eq!(report.failed_sensors, vec!["dht22".to_string()]);
        assert!(transport.calls.is_empty());
    }

    #[test]
    fn partial_batch_is_still_delivered() {
        let clock = ManualClock::default();
        let (mut sched, _) = scheduler(&clock, 3);
        let mut registry = SensorRegistry::new(
            "home",
            vec![
                StubSource::failing("dht22"),
                StubSource::ok("bmp180", &[("pressure", 932.5)]),
            ],
        );
        let mut transport = StubTransport::failing(0, &clock);

        let report = sched.run_cycle(&mut registry, &mut transport);
        assert!(report.delivered());
        assert_eq!(report.fields, 1);
        assert_eq!(report.failed_sensors, vec!["dht22".to_string()]);
    }

    #[test]
    fn slow_send_shortens_idle_gap_without_going_negative() {
        let clock = ManualClock::default();
        let (mut sched, _) = scheduler(&clock, 3);
        let mut registry = home_registry();
        let mut transport = StubTransport::failing(0, &clock);

        transport.send_time = Duration::from_secs(4);
        sched.step(&mut registry, &mut transport);
        transport.send_time = Duration::from_secs(15);
        sched.step(&mut registry, &mut transport);

        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(6), Duration::ZERO]
        );
        // Terceiro ciclo começaria imediatamente
        assert_eq!(clock.now(), Duration::from_secs(25));
    }

    #[test]
    fn zero_budget_is_clamped_to_one_attempt() {
        let clock = ManualClock::default();
        let (mut sched, _) = scheduler(&clock, 0);
        let mut registry = home_registry();
        let mut transport = StubTransport::failing(u32::MAX, &clock);

        let report = sched.run_cycle(&mut registry, &mut transport);
        assert_eq!(report.attempts, 1);
        assert_eq!(sched.interval(), INTERVAL);
    }
}
