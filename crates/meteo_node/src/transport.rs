//! Entrega das linhas ao InfluxDB.
//!
//! Duas variantes com o mesmo contrato [`TelemetryTransport::send`]:
//! - [`HttpTransport`] – `POST /write?db=<database>`, status 2xx = sucesso
//! - [`UdpTransport`] – um datagrama por linha, sem confirmação remota
//!
//! Cada `send` é uma única tentativa; retry é responsabilidade do agendador.

use meteo_core::config::{Credentials, TransportConfig, TransportMode};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;
use tracing::debug;

/// Erros de entrega.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Destino inalcançável: {0}")]
    Unreachable(String),

    #[error("Destino rejeitou a escrita (HTTP {status})")]
    Rejected { status: u16 },

    #[error("Falha ao preparar transporte: {0}")]
    Setup(String),
}

/// Capacidade comum de entrega.
pub trait TelemetryTransport {
    /// Uma tentativa de entrega. Payload vazio é no-op bem-sucedido.
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;
}

// ──────────────────────────────────────────────
// HTTP
// ──────────────────────────────────────────────

/// Escrita via endpoint HTTP `/write` do InfluxDB.
pub struct HttpTransport {
    client: Client,
    url: String,
    database: String,
    credentials: Option<Credentials>,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            // InfluxDB fica na LAN; proxies do ambiente não se aplicam
            .no_proxy()
            .build()
            .map_err(|e| TransportError::Setup(e.to_string()))?;

        Ok(Self {
            client,
            url: format!("http://{}/write", config.endpoint()),
            database: config.database.clone(),
            credentials: config.credentials.clone(),
        })
    }
}

impl TelemetryTransport for HttpTransport {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if payload.is_empty() {
            return Ok(());
        }

        let mut request = self
            .client
            .post(&self.url)
            .query(&[("db", self.database.as_str())])
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(payload.to_vec());
        if let Some(creds) = &self.credentials {
            request = request.basic_auth(&creds.user, Some(&creds.pass));
        }

        let response = request
            .send()
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;
        let status = response.status();
        debug!("HTTP {} ← {}", status.as_u16(), self.url);

        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}

// ──────────────────────────────────────────────
// UDP
// ──────────────────────────────────────────────

/// Escrita via listener UDP do InfluxDB.
///
/// O destino é resolvido no primeiro envio e mantido em cache; uma falha de
/// envio descarta o cache e força nova resolução no próximo. Só a consulta
/// DNS fica fora do timeout de escrita (limitada pelo `resolv.conf`).
pub struct UdpTransport {
    host: String,
    port: u16,
    timeout: Duration,
    target: Option<(UdpSocket, SocketAddr)>,
}

impl UdpTransport {
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            timeout: config.timeout.max(Duration::from_millis(1)),
            target: None,
        }
    }

    fn connect(&self) -> Result<(UdpSocket, SocketAddr), TransportError> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| TransportError::Unreachable(e.to_string()))?
            .next()
            .ok_or_else(|| {
                TransportError::Unreachable(format!("{} não resolveu", self.host))
            })?;

        let sock = UdpSocket::bind(local_addr_for(&addr))
            .map_err(|e| TransportError::Setup(e.to_string()))?;
        sock.set_write_timeout(Some(self.timeout))
            .map_err(|e| TransportError::Setup(e.to_string()))?;
        debug!("UDP → {addr}");
        Ok((sock, addr))
    }
}

/// Endereço local efêmero da mesma família do destino.
fn local_addr_for(target: &SocketAddr) -> SocketAddr {
    match target {
        SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
    }
}

impl TelemetryTransport for UdpTransport {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if payload.is_empty() {
            return Ok(());
        }

        let (sock, addr) = match self.target.take() {
            Some(target) => target,
            None => self.connect()?,
        };

        let sent = sock
            .send_to(payload, addr)
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;

        if sent == payload.len() {
            self.target = Some((sock, addr));
            Ok(())
        } else {
            Err(TransportError::Unreachable(format!(
                "datagrama truncado ({sent}/{} bytes)",
                payload.len()
            )))
        }
    }
}

// ──────────────────────────────────────────────
// Seleção
// ──────────────────────────────────────────────

/// Transporte escolhido pela configuração.
pub enum Transport {
    Http(HttpTransport),
    Udp(UdpTransport),
}

impl Transport {
    pub fn from_config(config: &TransportConfig) -> Result<Self, TransportError> {
        Ok(match config.mode {
            TransportMode::Http => Transport::Http(HttpTransport::new(config)?),
            TransportMode::Udp => Transport::Udp(UdpTransport::new(config)),
        })
    }

    pub fn mode(&self) -> TransportMode {
        match self {
            Transport::Http(_) => TransportMode::Http,
            Transport::Udp(_) => TransportMode::Udp,
        }
    }
}

impl TelemetryTransport for Transport {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        match self {
            Transport::Http(http) => http.send(payload),
            Transport::Udp(udp) => udp.send(payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread::JoinHandle;

    const LINE: &[u8] = b"home temperature=21.50,humidity=45.00 1700000000000000000\n";

    fn config(mode: TransportMode, port: u16, credentials: Option<Credentials>) -> TransportConfig {
        TransportConfig {
            mode,
            host: "127.0.0.1".into(),
            port,
            database: "meteofreya".into(),
            credentials,
            timeout: Duration::from_secs(3),
        }
    }

    /// Porta local sem ninguém escutando.
    fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_string();
                let body_len = head
                    .lines()
                    .filter_map(|l| l.split_once(':'))
                    .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + body_len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Servidor HTTP de uma requisição; devolve a requisição crua.
    fn serve_once(status_line: &'static str) -> (u16, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            );
            stream.write_all(response.as_bytes()).unwrap();
            request
        });
        (port, handle)
    }

    fn header<'a>(request: &'a str, name: &str) -> Option<&'a str> {
        request
            .lines()
            .filter_map(|l| l.split_once(':'))
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(name))
            .map(|(_, v)| v.trim())
    }

    #[test]
    fn http_posts_line_with_basic_auth() {
        let (port, server) = serve_once("204 No Content");
        let creds = Credentials {
            user: "meteofreya".into(),
            pass: "freya1234".into(),
        };
        let mut http = HttpTransport::new(&config(TransportMode::Http, port, Some(creds))).unwrap();

        assert_eq!(http.send(LINE), Ok(()));

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /write?db=meteofreya HTTP/1.1"), "{request}");
        assert_eq!(
            header(&request, "authorization"),
            Some("Basic bWV0ZW9mcmV5YTpmcmV5YTEyMzQ=")
        );
        assert!(request.ends_with(std::str::from_utf8(LINE).unwrap()));
    }

    #[test]
    fn http_without_credentials_sends_no_auth_header() {
        let (port, server) = serve_once("204 No Content");
        let mut http = HttpTransport::new(&config(TransportMode::Http, port, None)).unwrap();
        assert_eq!(http.send(LINE), Ok(()));
        let request = server.join().unwrap();
        assert_eq!(header(&request, "authorization"), None);
    }

    #[test]
    fn http_non_success_is_rejected() {
        let (port, server) = serve_once("401 Unauthorized");
        let mut http = HttpTransport::new(&config(TransportMode::Http, port, None)).unwrap();
        assert_eq!(http.send(LINE), Err(TransportError::Rejected { status: 401 }));
        server.join().unwrap();
    }

    #[test]
    fn http_connection_refused_is_unreachable() {
        let mut http = HttpTransport::new(&config(TransportMode::Http, closed_port(), None)).unwrap();
        assert!(matches!(http.send(LINE), Err(TransportError::Unreachable(_))));
    }

    #[test]
    fn empty_payload_skips_network() {
        // HTTP: nada escuta na porta, qualquer I/O real falharia
        let mut http =
            Transport::from_config(&config(TransportMode::Http, closed_port(), None)).unwrap();
        assert_eq!(http.send(&[]), Ok(()));

        // UDP: o receptor não pode ver datagrama algum
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        let port = receiver.local_addr().unwrap().port();
        let mut udp = Transport::from_config(&config(TransportMode::Udp, port, None)).unwrap();
        assert_eq!(udp.send(&[]), Ok(()));

        let mut buf = [0u8; 64];
        let err = receiver.recv_from(&mut buf).unwrap_err();
        assert!(
            matches!(
                err.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ),
            "{err}"
        );
    }

    #[test]
    fn udp_sends_single_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(3)))
            .unwrap();
        let port = receiver.local_addr().unwrap().port();

        let mut udp = Transport::from_config(&config(TransportMode::Udp, port, None)).unwrap();
        assert_eq!(udp.mode(), TransportMode::Udp);
        assert_eq!(udp.send(LINE), Ok(()));

        let mut buf = [0u8; 512];
        let (n, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], LINE);
    }

    #[test]
    fn udp_reuses_resolved_target() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(3)))
            .unwrap();
        let port = receiver.local_addr().unwrap().port();

        let mut udp = UdpTransport::new(&config(TransportMode::Udp, port, None));
        assert!(udp.target.is_none());
        assert_eq!(udp.send(LINE), Ok(()));
        let first = udp.target.as_ref().map(|(sock, _)| sock.local_addr().unwrap());
        assert_eq!(udp.send(LINE), Ok(()));
        let second = udp.target.as_ref().map(|(sock, _)| sock.local_addr().unwrap());
        assert_eq!(first, second);

        let mut buf = [0u8; 512];
        for _ in 0..2 {
            let (n, _) = receiver.recv_from(&mut buf).unwrap();
            assert_eq!(&buf[..n], LINE);
        }
    }

    #[test]
    fn udp_unresolvable_host_is_unreachable() {
        let mut cfg = config(TransportMode::Udp, 8089, None);
        cfg.host = "host.invalid".into();
        let mut udp = UdpTransport::new(&cfg);
        assert!(matches!(udp.send(LINE), Err(TransportError::Unreachable(_))));
        assert!(udp.target.is_none());
    }

    #[test]
    fn local_socket_matches_target_family() {
        let v4: SocketAddr = "192.168.1.4:8089".parse().unwrap();
        let v6: SocketAddr = "[fe80::2]:8089".parse().unwrap();
        assert_eq!(local_addr_for(&v4), "0.0.0.0:0".parse::<SocketAddr>().unwrap());
        assert_eq!(local_addr_for(&v6), "[::]:0".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn ipv6_host_is_bracketed_in_url() {
        let mut cfg = config(TransportMode::Http, 8086, None);
        cfg.host = "::1".into();
        let http = HttpTransport::new(&cfg).unwrap();
        assert_eq!(http.url, "http://[::1]:8086/write");
    }

    #[test]
    fn udp_reaches_ipv6_loopback() {
        // Hosts sem IPv6 não têm o que verificar aqui
        let Ok(receiver) = UdpSocket::bind("[::1]:0") else {
            return;
        };
        receiver
            .set_read_timeout(Some(Duration::from_secs(3)))
            .unwrap();
        let port = receiver.local_addr().unwrap().port();

        let mut cfg = config(TransportMode::Udp, port, None);
        cfg.host = "::1".into();
        let mut udp = UdpTransport::new(&cfg);
        assert_eq!(udp.send(LINE), Ok(()));

        let mut buf = [0u8; 512];
        let (n, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], LINE);
    }

    #[test]
    fn from_config_selects_variant() {
        let http = Transport::from_config(&config(TransportMode::Http, 8086, None)).unwrap();
        assert_eq!(http.mode(), TransportMode::Http);
        assert!(matches!(http, Transport::Http(_)));
    }
}
