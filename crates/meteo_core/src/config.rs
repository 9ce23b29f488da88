//! Configuração unificada via TOML.
//!
//! Um único `config.toml` descreve o nó, a rede, o InfluxDB e os sensores.
//! O endpoint aceita as duas formas históricas:
//!
//! ```toml
//! [influxdb]
//! host = "192.168.1.4:8086"   # host e porta combinados
//! ```
//!
//! ```toml
//! [influxdb]
//! host = [192, 168, 1, 4]     # octetos + porta separada
//! port = 8086
//! use_http = false            # ou: mode = "udp"
//! ```

use serde::{Deserialize, Serialize};
use std::net::Ipv6Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Porta padrão do InfluxDB.
pub const DEFAULT_INFLUX_PORT: u16 = 8086;

/// Erros ao resolver a configuração de transporte.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Host do InfluxDB vazio")]
    EmptyHost,

    #[error("Host do InfluxDB inválido: {0:?} (use host, host:porta ou [ipv6]:porta)")]
    InvalidHost(String),

    #[error("Porta inválida em {0:?}")]
    InvalidPort(String),

    #[error("mode = {mode:?} contradiz use_http = {use_http}")]
    ConflictingMode { mode: TransportMode, use_http: bool },

    #[error("auth = true exige user")]
    MissingCredentials,
}

// ──────────────────────────────────────────────
// Nó
// ──────────────────────────────────────────────

/// Identidade e ritmo do nó.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Nome da measurement enviada (ex: "home")
    pub name: String,
    /// Intervalo entre inícios de ciclo (ms)
    pub interval_ms: u64,
    /// Tentativas de envio por ciclo (orçamento de retry)
    pub max_attempts: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "home".into(),
            interval_ms: 10_000,
            max_attempts: 3,
        }
    }
}

impl NodeConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Rede WiFi esperada. A associação é feita fora do nó.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WifiConfig {
    pub ssid: String,
    pub key: String,
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            ssid: "YourSSID".into(),
            key: "YourKey".into(),
        }
    }
}

// ──────────────────────────────────────────────
// InfluxDB
// ──────────────────────────────────────────────

/// Modo de entrega.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// POST /write sobre TCP
    Http,
    /// Datagrama best-effort
    Udp,
}

/// Host em uma das duas formas aceitas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostSpec {
    /// "host" ou "host:porta"
    Address(String),
    /// [a, b, c, d]
    Octets([u8; 4]),
}

/// Seção `[influxdb]` como escrita pelo operador.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluxConfig {
    pub host: HostSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<TransportMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_http: Option<bool>,
    pub auth: bool,
    pub user: String,
    pub pass: String,
    /// Timeout de cada envio (ms)
    pub timeout_ms: u64,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            host: HostSpec::Address(format!("192.168.1.4:{DEFAULT_INFLUX_PORT}")),
            port: None,
            database: "meteofreya".into(),
            mode: None,
            use_http: None,
            auth: false,
            user: String::new(),
            pass: String::new(),
            timeout_ms: 5_000,
        }
    }
}

/// Credenciais HTTP basic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub pass: String,
}

/// Configuração de transporte resolvida e imutável.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub mode: TransportMode,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub credentials: Option<Credentials>,
    pub timeout: Duration,
}

impl TransportConfig {
    /// "host:porta", com colchetes para IPv6 (forma usada em URLs e logs).
    pub fn endpoint(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

fn parse_port(port: &str, addr: &str) -> Result<u16, ConfigError> {
    port.parse::<u16>()
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| ConfigError::InvalidPort(addr.to_string()))
}

impl InfluxConfig {
    /// Resolve host/porta nas duas formas aceitas.
    pub fn endpoint(&self) -> Result<(String, u16), ConfigError> {
        let fallback_port = self.port.unwrap_or(DEFAULT_INFLUX_PORT);
        match &self.host {
            HostSpec::Octets([a, b, c, d]) => Ok((format!("{a}.{b}.{c}.{d}"), fallback_port)),
            HostSpec::Address(addr) => {
                let addr = addr.trim();
                if addr.is_empty() {
                    return Err(ConfigError::EmptyHost);
                }
                // Só host[:porta]; esquema e caminho não pertencem aqui
                if addr.contains('/') {
                    return Err(ConfigError::InvalidHost(addr.to_string()));
                }
                // IPv6 entre colchetes: "[::1]" ou "[::1]:8086"
                if let Some(rest) = addr.strip_prefix('[') {
                    let ip = rest
                        .split_once(']')
                        .and_then(|(ip, tail)| Some((ip.parse::<Ipv6Addr>().ok()?, tail)));
                    return match ip {
                        Some((ip, "")) => Ok((ip.to_string(), fallback_port)),
                        Some((ip, tail)) => match tail.strip_prefix(':') {
                            Some(port) => Ok((ip.to_string(), parse_port(port, addr)?)),
                            None => Err(ConfigError::InvalidHost(addr.to_string())),
                        },
                        None => Err(ConfigError::InvalidHost(addr.to_string())),
                    };
                }
                // IPv6 sem colchetes não carrega porta
                if let Ok(ip) = addr.parse::<Ipv6Addr>() {
                    return Ok((ip.to_string(), fallback_port));
                }
                match addr.split_once(':') {
                    Some(("", _)) => Err(ConfigError::EmptyHost),
                    Some((_, port)) if port.contains(':') => {
                        Err(ConfigError::InvalidHost(addr.to_string()))
                    }
                    Some((host, port)) => Ok((host.to_string(), parse_port(port, addr)?)),
                    None => Ok((addr.to_string(), fallback_port)),
                }
            }
        }
    }

    /// Resolve `mode` / `use_http`. Ausentes = HTTP.
    pub fn transport_mode(&self) -> Result<TransportMode, ConfigError> {
        let from_flag = self.use_http.map(|http| {
            if http {
                TransportMode::Http
            } else {
                TransportMode::Udp
            }
        });
        match (self.mode, from_flag) {
            (Some(mode), Some(flag)) if mode != flag => Err(ConfigError::ConflictingMode {
                mode,
                use_http: self.use_http.unwrap_or_default(),
            }),
            (Some(mode), _) => Ok(mode),
            (None, Some(flag)) => Ok(flag),
            (None, None) => Ok(TransportMode::Http),
        }
    }

    fn credentials(&self) -> Result<Option<Credentials>, ConfigError> {
        if !self.auth {
            return Ok(None);
        }
        if self.user.is_empty() {
            return Err(ConfigError::MissingCredentials);
        }
        Ok(Some(Credentials {
            user: self.user.clone(),
            pass: self.pass.clone(),
        }))
    }

    pub fn resolve(&self) -> Result<TransportConfig, ConfigError> {
        let (host, port) = self.endpoint()?;
        Ok(TransportConfig {
            mode: self.transport_mode()?,
            host,
            port,
            database: self.database.clone(),
            credentials: self.credentials()?,
            timeout: Duration::from_millis(self.timeout_ms.max(1)),
        })
    }
}

// ──────────────────────────────────────────────
// Sensores
// ──────────────────────────────────────────────

/// DHT11/DHT22 (temperatura + umidade).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DhtConfig {
    pub enabled: bool,
    /// 11 ou 22
    pub model: u8,
    /// GPIO de dados (informativo; o binding é do device tree)
    pub pin: u8,
    /// Diretório IIO explícito (vazio = descoberta por nome)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<PathBuf>,
}

impl Default for DhtConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: 22,
            pin: 13,
            device: None,
        }
    }
}

/// BMP180 (pressão).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Bmp180Config {
    pub enabled: bool,
    /// Altitude de referência (m) para pressão ao nível do mar
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<PathBuf>,
}

impl Default for Bmp180Config {
    fn default() -> Self {
        Self {
            enabled: true,
            altitude: Some(700.0),
            device: None,
        }
    }
}

/// BH1750 (iluminância).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Bh1750Config {
    pub enabled: bool,
    /// Endereço I2C (0x23 ou 0x5C)
    pub address: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<PathBuf>,
}

impl Default for Bh1750Config {
    fn default() -> Self {
        Self {
            enabled: false,
            address: 0x23,
            device: None,
        }
    }
}

/// Sensores habilitados e raiz do sysfs IIO.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorsConfig {
    pub iio_root: PathBuf,
    pub dht: DhtConfig,
    pub bmp180: Bmp180Config,
    pub bh1750: Bh1750Config,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            iio_root: PathBuf::from("/sys/bus/iio/devices"),
            dht: DhtConfig::default(),
            bmp180: Bmp180Config::default(),
            bh1750: Bh1750Config::default(),
        }
    }
}

/// Indicador de status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Arquivo `brightness` de um LED sysfs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub led: Option<PathBuf>,
}

// ──────────────────────────────────────────────
// Raiz
// ──────────────────────────────────────────────

/// Configuração raiz do nó.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub node: NodeConfig,
    pub wifi: WifiConfig,
    pub influxdb: InfluxConfig,
    pub sensors: SensorsConfig,
    pub status: StatusConfig,
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        std::fs::write(path, content).map_err(|e| e.to_string())?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Configuração de transporte resolvida.
    pub fn transport(&self) -> Result<TransportConfig, ConfigError> {
        self.influxdb.resolve()
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let name = &self.node.name;
        if name.is_empty() {
            errors.push("Nome do nó não pode ser vazio".into());
        } else if name.contains([' ', ',', '=', '\n', '\r', '\t']) {
            errors.push(format!("Nome do nó inválido para line protocol: {name:?}"));
        }
        if self.node.interval_ms == 0 || self.node.interval_ms > 3_600_000 {
            errors.push(format!(
                "Intervalo inválido: {} ms (1–3600000)",
                self.node.interval_ms
            ));
        }
        if !(1..=10).contains(&self.node.max_attempts) {
            errors.push(format!(
                "max_attempts inválido: {} (1–10)",
                self.node.max_attempts
            ));
        }
        if let Err(e) = self.transport() {
            errors.push(e.to_string());
        }
        if self.sensors.dht.enabled && !matches!(self.sensors.dht.model, 11 | 22) {
            errors.push(format!(
                "Modelo DHT inválido: {} (11 ou 22)",
                self.sensors.dht.model
            ));
        }

        errors
    }
}
