//! Tipos de dados da telemetria do nó.
//!
//! Uma [`SensorReading`] é uma grandeza medida; um [`MeasurementBatch`] é o
//! conjunto de leituras de um ciclo, destinado a uma única linha do protocolo.

// ──────────────────────────────────────────────
// Leitura
// ──────────────────────────────────────────────

/// Uma grandeza medida por um sensor (sem unidade no fio).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorReading {
    /// Nome do campo (ex: "temperature")
    pub field: String,
    /// Valor medido
    pub value: f64,
}

impl SensorReading {
    pub fn new(field: impl Into<String>, value: f64) -> Self {
        Self {
            field: field.into(),
            value,
        }
    }
}

// ──────────────────────────────────────────────
// Lote
// ──────────────────────────────────────────────

/// Leituras de um ciclo de amostragem.
///
/// Um lote vazio é válido: codifica para zero bytes e nada é enviado.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementBatch {
    /// Nome da measurement (= nome do nó)
    pub measurement: String,
    /// Timestamp Unix em nanossegundos
    pub timestamp_nanos: u64,
    /// Campos na ordem de declaração das fontes
    pub fields: Vec<SensorReading>,
}

impl MeasurementBatch {
    pub fn new(measurement: impl Into<String>, timestamp_nanos: u64) -> Self {
        Self {
            measurement: measurement.into(),
            timestamp_nanos,
            fields: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Acrescenta as leituras de uma fonte, preservando a ordem.
    pub fn extend(&mut self, readings: impl IntoIterator<Item = SensorReading>) {
        self.fields.extend(readings);
    }

    /// Busca o valor de um campo pelo nome.
    pub fn value_of(&self, field: &str) -> Option<f64> {
        self.fields
            .iter()
            .find(|r| r.field == field)
            .map(|r| r.value)
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
