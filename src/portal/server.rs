//! Setup access point and its single-connection HTTP server.
//!
//! Each `poll` listens on port 80 for a short window so the lifecycle tick
//! keeps running; a browser that hits a gap simply retries.

use core::fmt::Write as _;

use embassy_net::tcp::TcpSocket;
use embassy_net::Stack;
use embassy_time::{Duration, Instant, Timer, WithTimeout};
use embedded_io_async::Write as _;

use crate::config::{PORTAL_ACCEPT_WINDOW_MS, PORTAL_HTTP_PORT, PORTAL_REDIRECT_URL};
use crate::error::Error;
use crate::lifecycle::ProvisioningPortal;
use crate::net::wifi::{RadioCommand, RadioControl, RadioState};
use crate::portal::form::{
    parse_form, request_complete, route, Route, SetupForm, CONFIG_PAGE, SAVED_PAGE,
};

const SOCKET_BUFFER: usize = 1024;
const REQUEST_CAPACITY: usize = 2048;
const AP_START_TIMEOUT_MS: u64 = 5_000;
const CLIENT_TIMEOUT_MS: u64 = 5_000;

pub struct SetupPortal {
    control: &'static RadioControl,
    ap: Stack<'static>,
    rx: [u8; SOCKET_BUFFER],
    tx: [u8; SOCKET_BUFFER],
}

impl SetupPortal {
    pub fn new(control: &'static RadioControl, ap: Stack<'static>) -> Self {
        Self {
            control,
            ap,
            rx: [0; SOCKET_BUFFER],
            tx: [0; SOCKET_BUFFER],
        }
    }
}

impl ProvisioningPortal for SetupPortal {
    async fn start(&mut self) -> Result<(), Error> {
        self.control.request(RadioCommand::HostAccessPoint, RadioState::Idle);

        let deadline = Instant::now() + Duration::from_millis(AP_START_TIMEOUT_MS);
        loop {
            match self.control.state() {
                RadioState::Hosting => return Ok(()),
                RadioState::HostFailed => return Err(Error::WifiConnectFailed),
                _ if Instant::now() >= deadline => return Err(Error::Timeout),
                _ => Timer::after_millis(50).await,
            }
        }
    }

    async fn poll(&mut self) -> Option<SetupForm> {
        if self.control.state() != RadioState::Hosting {
            return None;
        }

        let mut socket = TcpSocket::new(self.ap, &mut self.rx, &mut self.tx);
        let accepted = socket
            .accept(PORTAL_HTTP_PORT)
            .with_timeout(Duration::from_millis(PORTAL_ACCEPT_WINDOW_MS))
            .await;
        match accepted {
            Err(_) => return None,
            Ok(Err(e)) => {
                warn!("portal accept failed: {:?}", e);
                return None;
            }
            Ok(Ok(())) => {}
        }
        socket.set_timeout(Some(Duration::from_millis(CLIENT_TIMEOUT_MS)));

        let submitted = match serve(&mut socket).await {
            Ok(form) => form,
            Err(e) => {
                warn!("portal request failed: {:?}", e);
                None
            }
        };
        socket.close();
        let _ = socket.flush().await;
        submitted
    }

    async fn stop(&mut self) {
        self.control.request(RadioCommand::Stop, RadioState::Idle);
        info!("portal stopped");
    }
}

/// Answer one request; returns the form when a valid save was received.
async fn serve(
    socket: &mut TcpSocket<'_>,
) -> Result<Option<SetupForm>, embassy_net::tcp::Error> {
    let mut buf = [0u8; REQUEST_CAPACITY];
    let mut total = 0;
    while total < buf.len() && !request_complete(&buf[..total]) {
        let n = socket.read(&mut buf[total..]).await?;
        if n == 0 {
            break;
        }
        total += n;
    }
    if total == 0 {
        return Ok(None);
    }

    match route(&buf[..total]) {
        Route::Root => {
            respond(socket, "200 OK", "", CONFIG_PAGE).await?;
            Ok(None)
        }
        Route::Save(body) => match parse_form(body) {
            Ok(form) => {
                info!("portal received settings for \"{}\"", form.ssid.as_str());
                respond(socket, "200 OK", "", SAVED_PAGE).await?;
                Ok(Some(form))
            }
            Err(e) => {
                warn!("setup form rejected: {:?}", e);
                respond(socket, "400 Bad Request", "", "Missing or invalid fields").await?;
                Ok(None)
            }
        },
        Route::Redirect => {
            let mut location: heapless::String<64> = heapless::String::new();
            let _ = location.push_str("Location: ");
            let _ = location.push_str(PORTAL_REDIRECT_URL);
            let _ = location.push_str("\r\n");
            respond(socket, "302 Found", &location, "").await?;
            Ok(None)
        }
    }
}

async fn respond(
    socket: &mut TcpSocket<'_>,
    status: &str,
    extra_headers: &str,
    body: &str,
) -> Result<(), embassy_net::tcp::Error> {
    let mut head: heapless::String<256> = heapless::String::new();
    let _ = write!(
        head,
        "HTTP/1.1 {}\r\n{}Content-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        extra_headers,
        body.len()
    );
    socket.write_all(head.as_bytes()).await?;
    socket.write_all(body.as_bytes()).await?;
    socket.flush().await
}
