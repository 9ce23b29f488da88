//! # Meteo Core
//!
//! Crate compartilhada que define as estruturas de dados, o protocolo de
//! linha (InfluxDB line protocol), a configuração TOML e o status de ciclo
//! do nó de sensores ambientais.
//!
//! ## Módulos
//! - [`types`] – Leituras e lote de medição
//! - [`protocol`] – Encode/decode do line protocol
//! - [`config`] – Configuração unificada via TOML
//! - [`status`] – Relatório de ciclo e níveis de alerta

pub mod types;
pub mod protocol;
pub mod config;
pub mod status;

// Re-exports convenientes
pub use types::{MeasurementBatch, SensorReading};
pub use protocol::{decode_line, encode_batch, VALUE_PRECISION};
pub use config::{AppConfig, TransportConfig, TransportMode};
pub use status::{AlertLevel, CycleOutcome, CycleReport};
