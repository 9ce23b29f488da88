//! Indicadores de status – para onde vão os relatórios de ciclo.

use meteo_core::status::{AlertLevel, CycleOutcome, CycleReport, level_for_cycle};
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Recebe o relatório de cada ciclo.
pub trait StatusIndicator {
    fn report(&mut self, report: &CycleReport);
}

/// Registra cada ciclo no log.
#[derive(Debug, Default)]
pub struct LogIndicator;

impl StatusIndicator for LogIndicator {
    fn report(&mut self, report: &CycleReport) {
        let failed = if report.failed_sensors.is_empty() {
            String::new()
        } else {
            format!(" | sensores com falha: {}", report.failed_sensors.join(", "))
        };

        match (&report.outcome, level_for_cycle(report)) {
            (CycleOutcome::Failed { reason }, _) => error!(
                "✗ Ciclo #{} descartado após {} tentativas: {}{}",
                report.cycle, report.attempts, reason, failed
            ),
            (CycleOutcome::NothingToSend, _) => {
                warn!("○ Ciclo #{}: nada para enviar{}", report.cycle, failed)
            }
            (CycleOutcome::Delivered, AlertLevel::Warning) => warn!(
                "◐ Ciclo #{}: {} campos / {} bytes entregues (tentativa {}){}",
                report.cycle, report.fields, report.bytes, report.attempts, failed
            ),
            (CycleOutcome::Delivered, _) => info!(
                "● Ciclo #{}: {} campos / {} bytes entregues (tentativa {})",
                report.cycle, report.fields, report.bytes, report.attempts
            ),
        }
    }
}

/// LED sysfs (`/sys/class/leds/<nome>/brightness`): aceso enquanto o
/// último ciclo for crítico. Também registra no log.
#[derive(Debug)]
pub struct LedIndicator {
    brightness: PathBuf,
    lit: Option<bool>,
    log: LogIndicator,
}

impl LedIndicator {
    pub fn new(brightness: impl Into<PathBuf>) -> Self {
        Self {
            brightness: brightness.into(),
            lit: None,
            log: LogIndicator,
        }
    }

    fn set(&mut self, on: bool) {
        if self.lit == Some(on) {
            return;
        }
        match std::fs::write(&self.brightness, if on { "1" } else { "0" }) {
            Ok(()) => self.lit = Some(on),
            Err(e) => warn!("LED {}: {e}", self.brightness.display()),
        }
    }
}

impl StatusIndicator for LedIndicator {
    fn report(&mut self, report: &CycleReport) {
        self.log.report(report);
        self.set(level_for_cycle(report) == AlertLevel::Critical);
    }
}
