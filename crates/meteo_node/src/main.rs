//! # Meteo Node
//!
//! Amostra sensores ambientais (DHT, BMP180, BH1750) via Linux IIO e envia
//! cada ciclo como uma linha do line protocol para o InfluxDB, por HTTP ou
//! UDP.
//!
//! ## Uso
//! ```bash
//! meteo_node                      # config.toml ao lado do executável
//! meteo_node /etc/meteo.toml      # config explícita
//! RUST_LOG=debug meteo_node       # mostra as linhas enviadas
//! ```

mod clock;
mod iio;
mod indicator;
mod registry;
mod scheduler;
mod source;
mod transport;
#[cfg(feature = "bh1750")]
mod bh1750_sensor;
#[cfg(feature = "bmp180")]
mod bmp180_sensor;
#[cfg(feature = "dht")]
mod dht_sensor;

use clock::SystemClock;
use indicator::{LedIndicator, LogIndicator, StatusIndicator};
use meteo_core::config::{AppConfig, TransportMode};
use registry::SensorRegistry;
use scheduler::Scheduler;
use std::path::PathBuf;
use transport::Transport;
use tracing::{error, info, warn};

fn main() {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Carregar config ──
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("Config inválida: {e}");
        }
        std::process::exit(2);
    }

    let transport_cfg = match config.transport() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Config do InfluxDB inválida: {e}");
            std::process::exit(2);
        }
    };

    // ── Rede ──
    info!(
        "WiFi esperado: \"{}\" (associação gerenciada pelo sistema)",
        config.wifi.ssid
    );

    let mut transport = match Transport::from_config(&transport_cfg) {
        Ok(t) => t,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    // ── Sensores ──
    let mut registry = SensorRegistry::from_config(&config);
    info!("{} fonte(s) de sensor: {:?}", registry.len(), registry.source_names());

    // ── Status ──
    let indicator: Box<dyn StatusIndicator> = match &config.status.led {
        Some(path) => {
            info!("LED de status: {}", path.display());
            Box::new(LedIndicator::new(path))
        }
        None => Box::new(LogIndicator),
    };

    let mut scheduler = Scheduler::new(
        config.node.interval(),
        config.node.max_attempts,
        SystemClock::new(),
        indicator,
    );

    // ── Banner ──
    let mode = match transport.mode() {
        TransportMode::Http => format!("HTTP (db \"{}\")", transport_cfg.database),
        TransportMode::Udp => "UDP".to_string(),
    };
    println!();
    println!("══════════════════════════════════════════════");
    println!("   🌡  METEO NODE – ATIVO");
    println!("══════════════════════════════════════════════");
    println!("  Nó:         {}", config.node.name);
    println!("  Destino:    {}", transport_cfg.endpoint());
    println!("  Modo:       {mode}");
    println!("  Intervalo:  {:.1}s", scheduler.interval().as_secs_f64());
    println!("  Tentativas: {}", config.node.max_attempts);
    println!("══════════════════════════════════════════════");
    println!();

    // ── Loop principal ──
    scheduler.run_forever(&mut registry, &mut transport)
}
