//! Protocolo de linha (line protocol) do InfluxDB.
//!
//! Formato de uma linha:
//!
//! ```text
//! <measurement> <campo>=<valor>[,<campo>=<valor>...] <timestamp_ns>\n
//! ```
//!
//! - Valores sempre em ponto flutuante com [`VALUE_PRECISION`] casas decimais
//! - Nomes vêm de um vocabulário fechado (nó + sensores), sem escaping
//! - Lote vazio codifica para zero bytes

use crate::types::{MeasurementBatch, SensorReading};
use std::fmt::Write;

/// Casas decimais usadas em todos os valores.
pub const VALUE_PRECISION: usize = 2;

/// Erros ao decodificar uma linha.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Linha vazia")]
    Empty,

    #[error("Linha não é UTF-8 válido")]
    NotUtf8,

    #[error("Seção ausente: {0}")]
    MissingSection(&'static str),

    #[error("Campo malformado: {0:?}")]
    InvalidField(String),

    #[error("Valor inválido no campo {field}: {raw:?}")]
    InvalidValue { field: String, raw: String },

    #[error("Timestamp inválido: {0:?}")]
    InvalidTimestamp(String),
}

/// Codifica um [`MeasurementBatch`] em uma linha terminada por `\n`.
///
/// Campos não finitos (NaN, ±inf) são omitidos; se nenhum campo sobrar o
/// resultado é vazio.
pub fn encode_batch(batch: &MeasurementBatch) -> Vec<u8> {
    let mut fields = batch.fields.iter().filter(|r| r.value.is_finite());

    let Some(first) = fields.next() else {
        return Vec::new();
    };

    let mut line = String::with_capacity(batch.measurement.len() + 24 * batch.fields.len() + 24);
    line.push_str(&batch.measurement);
    line.push(' ');
    push_field(&mut line, first);
    for reading in fields {
        line.push(',');
        push_field(&mut line, reading);
    }
    // Escrever em String não falha
    let _ = writeln!(line, " {}", batch.timestamp_nanos);

    line.into_bytes()
}

fn push_field(line: &mut String, reading: &SensorReading) {
    let _ = write!(
        line,
        "{}={:.prec$}",
        reading.field,
        reading.value,
        prec = VALUE_PRECISION
    );
}

/// Decodifica uma linha produzida por [`encode_batch`].
///
/// Bytes vazios (ou só espaço) decodificam para um lote vazio.
pub fn decode_line(data: &[u8]) -> Result<MeasurementBatch, ProtocolError> {
    let text = std::str::from_utf8(data).map_err(|_| ProtocolError::NotUtf8)?;
    let line = text.trim_end_matches(['\n', '\r']);

    if line.trim().is_empty() {
        return Ok(MeasurementBatch::default());
    }

    let mut sections = line.split(' ');
    let measurement = sections
        .next()
        .filter(|s| !s.is_empty())
        .ok_or(ProtocolError::Empty)?;
    let field_set = sections
        .next()
        .filter(|s| !s.is_empty())
        .ok_or(ProtocolError::MissingSection("fields"))?;
    let timestamp = sections
        .next()
        .ok_or(ProtocolError::MissingSection("timestamp"))?;
    if sections.next().is_some() {
        return Err(ProtocolError::InvalidField(line.to_string()));
    }

    let timestamp_nanos = timestamp
        .parse::<u64>()
        .map_err(|_| ProtocolError::InvalidTimestamp(timestamp.to_string()))?;

    let mut batch = MeasurementBatch::new(measurement, timestamp_nanos);
    for pair in field_set.split(',') {
        let (field, raw) = pair
            .split_once('=')
            .filter(|(k, _)| !k.is_empty())
            .ok_or_else(|| ProtocolError::InvalidField(pair.to_string()))?;
        let value = raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ProtocolError::InvalidValue {
                field: field.to_string(),
                raw: raw.to_string(),
            })?;
        batch.fields.push(SensorReading::new(field, value));
    }

    Ok(batch)
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
