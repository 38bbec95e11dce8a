//! Setup page routing and form parsing.

use heapless::String;

use crate::config::DEFAULT_DEVICE_TYPE;
use crate::error::{Error, FormError};
use crate::storage::record::{
    truncated, DeviceConfig, DEVICE_NAME_LEN, DEVICE_TYPE_LEN, LOCATION_LEN, PASSWORD_LEN,
    SERVER_URL_LEN, SSID_LEN,
};

/// The setup form served on `/`.
pub const CONFIG_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>IoT Node Setup</title>
<style>
body { font-family: sans-serif; background: #f2f2f2; margin: 0; padding: 20px; }
form { max-width: 480px; margin: auto; background: #fff; padding: 20px; border-radius: 8px; }
label { display: block; margin-top: 14px; font-weight: bold; }
input, select { width: 100%; box-sizing: border-box; padding: 10px; margin-top: 4px; }
button { width: 100%; margin-top: 20px; padding: 12px; background: #007aff; color: #fff; border: 0; border-radius: 4px; }
</style>
</head>
<body>
<form action="/save" method="POST">
<h1>IoT Node Setup</h1>
<label for="ssid">WiFi Network (SSID)</label>
<input type="text" id="ssid" name="ssid" maxlength="32" required>
<label for="pass">WiFi Password</label>
<input type="password" id="pass" name="pass" maxlength="64">
<label for="server">Server URL</label>
<input type="text" id="server" name="server" placeholder="http://192.168.1.100:4000" required>
<label for="name">Device Name</label>
<input type="text" id="name" name="name" maxlength="32" placeholder="e.g. Living Room Sensor" required>
<label for="type">Device Type</label>
<select id="type" name="type"><option value="Temp/Humidity">Temp/Humidity</option></select>
<label for="location">Location Hint</label>
<input type="text" id="location" name="location" maxlength="64" placeholder="e.g. On the bookshelf">
<label for="interval">Sleep Interval (seconds)</label>
<input type="number" id="interval" name="interval" value="300" min="1" required>
<button type="submit">Save Configuration</button>
</form>
</body>
</html>
"#;

/// Reply after a successful save.
pub const SAVED_PAGE: &str = "<h1>Configuration Saved!</h1>\
<p>The device will now restart and try to connect to your WiFi.</p>";

/// What a request asks the portal to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route<'a> {
    /// `GET /` - serve the form.
    Root,
    /// `POST /save` with its (possibly empty) body.
    Save(&'a [u8]),
    /// Anything else - redirect to the portal address.
    Redirect,
}

/// Route a buffered request. Call once [`request_complete`] holds.
pub fn route(request: &[u8]) -> Route<'_> {
    let line_end = find(request, b"\r\n").unwrap_or(request.len());
    let mut parts = request[..line_end].split(|&b| b == b' ');
    let method = parts.next().unwrap_or(&[]);
    let target = parts.next().unwrap_or(&[]);
    // Ignore any query string.
    let path = target.split(|&b| b == b'?').next().unwrap_or(&[]);

    match (method, path) {
        (b"GET", b"/") => Route::Root,
        (b"POST", b"/save") => {
            let body = match find(request, b"\r\n\r\n") {
                Some(idx) => &request[idx + 4..],
                None => &[],
            };
            Route::Save(body)
        }
        _ => Route::Redirect,
    }
}

/// Whether `buf` holds the full header block and the `Content-Length` body.
pub fn request_complete(buf: &[u8]) -> bool {
    let Some(header_end) = find(buf, b"\r\n\r\n") else {
        return false;
    };
    let headers = &buf[..header_end];
    let body_len = buf.len() - (header_end + 4);
    body_len >= content_length(headers).unwrap_or(0)
}

fn content_length(headers: &[u8]) -> Option<usize> {
    headers.split(|&b| b == b'\n').find_map(|line| {
        let line = core::str::from_utf8(line).ok()?.trim();
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Values submitted on the setup form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SetupForm {
    pub ssid: String<SSID_LEN>,
    pub password: String<PASSWORD_LEN>,
    pub server_url: String<SERVER_URL_LEN>,
    pub name: String<DEVICE_NAME_LEN>,
    pub device_type: String<DEVICE_TYPE_LEN>,
    pub location: String<LOCATION_LEN>,
    pub interval_secs: i32,
}

impl SetupForm {
    /// Overwrite the user-editable fields of `config` and mark it configured.
    /// A previously assigned device id is kept.
    pub fn apply_to(&self, config: &mut DeviceConfig) {
        config.wifi_ssid = self.ssid.clone();
        config.wifi_password = self.password.clone();
        config.server_url = self.server_url.clone();
        config.device_name = self.name.clone();
        config.device_type = self.device_type.clone();
        config.location_hint = self.location.clone();
        config.sleep_interval_secs = self.interval_secs;
        config.configured = true;
    }
}

/// Parse an `application/x-www-form-urlencoded` body.
///
/// `ssid`, `server` and `name` must be present and non-empty. A missing or
/// non-numeric `interval` becomes 0, which the sleep fallback turns into the
/// default interval.
pub fn parse_form(body: &[u8]) -> Result<SetupForm, Error> {
    let mut form = SetupForm::default();
    let mut device_type_seen = false;

    for pair in body.split(|&b| b == b'&') {
        if pair.is_empty() {
            continue;
        }
        let mut kv = pair.splitn(2, |&b| b == b'=');
        let key = kv.next().unwrap_or(&[]);
        let value = kv.next().unwrap_or(&[]);

        match key {
            b"ssid" => form.ssid = decode(value)?,
            b"pass" => form.password = decode(value)?,
            b"server" => form.server_url = decode(value)?,
            b"name" => form.name = decode(value)?,
            b"type" => {
                form.device_type = decode(value)?;
                device_type_seen = true;
            }
            b"location" => form.location = decode(value)?,
            b"interval" => {
                let digits: String<16> = decode(value)?;
                form.interval_secs = digits.trim().parse().unwrap_or(0);
            }
            _ => {}
        }
    }

    if form.ssid.is_empty() || form.server_url.is_empty() || form.name.is_empty() {
        return Err(FormError::MissingField.into());
    }
    if !device_type_seen || form.device_type.is_empty() {
        form.device_type = truncated(DEFAULT_DEVICE_TYPE);
    }
    Ok(form)
}

/// Percent-decode one value into a fixed-capacity string, truncating at a
/// char boundary when it does not fit.
fn decode<const N: usize>(raw: &[u8]) -> Result<String<N>, Error> {
    let mut bytes: heapless::Vec<u8, 384> = heapless::Vec::new();
    let mut i = 0;
    while i < raw.len() {
        let byte = match raw[i] {
            b'+' => b' ',
            b'%' => {
                let hi = raw.get(i + 1).and_then(|&c| hex(c));
                let lo = raw.get(i + 2).and_then(|&c| hex(c));
                match (hi, lo) {
                    (Some(hi), Some(lo)) => {
                        i += 2;
                        (hi << 4) | lo
                    }
                    _ => return Err(FormError::BadEncoding.into()),
                }
            }
            b => b,
        };
        if bytes.push(byte).is_err() {
            break;
        }
        i += 1;
    }

    let text = match core::str::from_utf8(&bytes) {
        Ok(text) => text,
        // Overlong input may have been cut mid-character; keep the valid prefix.
        Err(e) if e.error_len().is_none() => {
            core::str::from_utf8(&bytes[..e.valid_up_to()]).map_err(|_| FormError::BadEncoding)?
        }
        Err(_) => return Err(FormError::BadEncoding.into()),
    };
    Ok(truncated(text))
}

fn hex(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
