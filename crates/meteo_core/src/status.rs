//! Status de ciclo – resultado de cada ciclo e nível de alerta.

/// Nível de alerta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlertLevel {
    Normal,
    Warning,
    Critical,
}

/// Desfecho da entrega de um ciclo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Linha aceita pelo transporte
    Delivered,
    /// Lote vazio, nenhum envio tentado
    NothingToSend,
    /// Orçamento de tentativas esgotado; lote descartado
    Failed { reason: String },
}

/// Relatório de um ciclo completo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Número sequencial do ciclo (começa em 1)
    pub cycle: u64,
    pub timestamp_nanos: u64,
    /// Campos no lote
    pub fields: usize,
    /// Sensores que falharam neste ciclo
    pub failed_sensors: Vec<String>,
    /// Tamanho da linha codificada (bytes)
    pub bytes: usize,
    /// Tentativas de envio realizadas
    pub attempts: u32,
    pub outcome: CycleOutcome,
}

impl CycleReport {
    pub fn delivered(&self) -> bool {
        self.outcome == CycleOutcome::Delivered
    }
}

/// Classifica um ciclo.
///
/// Entrega completa é normal; lote parcial ou vazio é aviso; entrega que
/// esgotou as tentativas é crítica.
pub fn level_for_cycle(report: &CycleReport) -> AlertLevel {
    match report.outcome {
        CycleOutcome::Failed { .. } => AlertLevel::Critical,
        CycleOutcome::NothingToSend => AlertLevel::Warning,
        CycleOutcome::Delivered if !report.failed_sensors.is_empty() => AlertLevel::Warning,
        CycleOutcome::Delivered => AlertLevel::Normal,
    }
}
