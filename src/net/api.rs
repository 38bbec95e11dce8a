//! Telemetry API client over `embassy-net` TCP sockets.
//!
//! One request per connection: resolve, connect, send, read until the server
//! closes. Plain HTTP only.

use core::net::Ipv4Addr;

use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::TcpSocket;
use embassy_net::{IpAddress, Stack};
use embassy_time::Duration;
use embedded_io_async::Write as _;
use heapless::String;

use crate::config::{API_INGEST_PATH, API_REGISTER_PATH, HTTP_TIMEOUT_MS};
use crate::error::{Error, NetError};
use crate::lifecycle::{Registration, Telemetry, TelemetryClient};
use crate::net::http::{
    assigned_id, endpoint, parse_response, parse_url, registration_body, telemetry_body,
    write_post, HttpUrl, BODY_CAPACITY,
};
use crate::storage::record::truncated;
use crate::storage::DeviceConfig;

const SOCKET_BUFFER: usize = 1024;
const REQUEST_CAPACITY: usize = 256 + BODY_CAPACITY + 256;
const RESPONSE_CAPACITY: usize = 512;

pub struct HttpApi {
    stack: Stack<'static>,
    rx: [u8; SOCKET_BUFFER],
    tx: [u8; SOCKET_BUFFER],
}

impl HttpApi {
    pub fn new(stack: Stack<'static>) -> Self {
        Self {
            stack,
            rx: [0; SOCKET_BUFFER],
            tx: [0; SOCKET_BUFFER],
        }
    }

    async fn resolve(&self, host: &str) -> Result<IpAddress, Error> {
        if let Ok(ip) = host.parse::<Ipv4Addr>() {
            return Ok(IpAddress::Ipv4(ip));
        }
        let addrs = self
            .stack
            .dns_query(host, DnsQueryType::A)
            .await
            .map_err(|e| {
                warn!("dns lookup of {} failed: {:?}", host, e);
                NetError::Dns
            })?;
        addrs.first().copied().ok_or(Error::Net(NetError::Dns))
    }

    /// POST `body` to `url`; returns the number of response bytes in `response`.
    async fn post(
        &mut self,
        url: &HttpUrl<'_>,
        body: &str,
        response: &mut [u8],
    ) -> Result<usize, Error> {
        let mut request: String<REQUEST_CAPACITY> = String::new();
        write_post(&mut request, url, body).map_err(|_| Error::BufferOverflow)?;

        let address = self.resolve(url.host).await?;
        let stack = self.stack;
        let mut socket = TcpSocket::new(stack, &mut self.rx, &mut self.tx);
        socket.set_timeout(Some(Duration::from_millis(HTTP_TIMEOUT_MS)));

        debug!("POST {}:{}{}", url.host, url.port, url.path);
        if let Err(e) = socket.connect((address, url.port)).await {
            warn!("connect to {} failed: {:?}", url.host, e);
            return Err(NetError::Connect.into());
        }

        let result = exchange(&mut socket, request.as_bytes(), response).await;
        socket.close();
        result
    }
}

async fn exchange(
    socket: &mut TcpSocket<'_>,
    request: &[u8],
    response: &mut [u8],
) -> Result<usize, Error> {
    socket.write_all(request).await.map_err(|e| {
        warn!("request write failed: {:?}", e);
        NetError::Io
    })?;
    socket.flush().await.map_err(|_| NetError::Io)?;

    // Connection: close, so the body ends when the peer does.
    let mut total = 0;
    while total < response.len() {
        match socket.read(&mut response[total..]).await {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) => {
                warn!("response read failed: {:?}", e);
                return Err(NetError::Io.into());
            }
        }
    }
    Ok(total)
}

impl TelemetryClient for HttpApi {
    async fn register_device_if_needed(
        &mut self,
        config: &mut DeviceConfig,
    ) -> Result<Registration, Error> {
        if config.is_registered() {
            return Ok(Registration::AlreadyRegistered);
        }

        let url = endpoint(&config.server_url, API_REGISTER_PATH)?;
        let body = registration_body(config)?;
        let mut raw = [0u8; RESPONSE_CAPACITY];
        let len = self.post(&parse_url(&url)?, &body, &mut raw).await?;

        let response = parse_response(&raw[..len])?;
        let id = assigned_id(&response)?;
        info!("server assigned id {}", id);
        config.device_id = truncated(id);
        Ok(Registration::Registered)
    }

    async fn send_telemetry(
        &mut self,
        config: &DeviceConfig,
        reading: &Telemetry,
    ) -> Result<(), Error> {
        if !config.is_registered() {
            return Err(Error::TelemetrySendFailure);
        }

        let url = endpoint(&config.server_url, API_INGEST_PATH)?;
        let body = telemetry_body(
            &config.device_id,
            reading.temperature_c,
            reading.humidity_pct,
            reading.battery_pct,
        )?;
        let mut raw = [0u8; RESPONSE_CAPACITY];
        let len = self.post(&parse_url(&url)?, &body, &mut raw).await?;

        let response = parse_response(&raw[..len])?;
        if response.is_success() {
            Ok(())
        } else {
            warn!("ingest rejected with status {}", response.status);
            Err(NetError::Status(response.status).into())
        }
    }
}
