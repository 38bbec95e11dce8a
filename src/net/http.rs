//! Minimal HTTP/1.1 + JSON helpers for the telemetry API.
//!
//! Only plain `http://` URLs are supported. Requests are always
//! `Connection: close`, so a response is everything read until the peer
//! closes.

use core::fmt::{self, Write};
use heapless::String;

use crate::error::{Error, NetError};
use crate::storage::DeviceConfig;

/// Capacity for a joined endpoint URL.
pub const URL_CAPACITY: usize = 288;

/// Capacity for a request body.
pub const BODY_CAPACITY: usize = 384;

/// Parts of an `http://host[:port][/path]` URL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HttpUrl<'a> {
    pub host: &'a str,
    pub port: u16,
    pub path: &'a str,
}

pub fn parse_url(url: &str) -> Result<HttpUrl<'_>, Error> {
    let rest = url.strip_prefix("http://").ok_or(Error::InvalidUrl)?;
    let (authority, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, "/"),
    };
    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => (host, port.parse::<u16>().map_err(|_| Error::InvalidUrl)?),
        None => (authority, 80),
    };
    if host.is_empty() {
        return Err(Error::InvalidUrl);
    }
    Ok(HttpUrl { host, port, path })
}

/// `base` + `path`, without doubling the slash between them.
pub fn endpoint(base: &str, path: &str) -> Result<String<URL_CAPACITY>, Error> {
    let mut url = String::new();
    url.push_str(base.trim_end_matches('/'))
        .and_then(|_| url.push_str(path))
        .map_err(|_| Error::BufferOverflow)?;
    Ok(url)
}

/// Write a JSON POST request for `url` carrying `body`.
pub fn write_post<W: Write>(out: &mut W, url: &HttpUrl<'_>, body: &str) -> fmt::Result {
    write!(out, "POST {} HTTP/1.1\r\n", url.path)?;
    if url.port == 80 {
        write!(out, "Host: {}\r\n", url.host)?;
    } else {
        write!(out, "Host: {}:{}\r\n", url.host, url.port)?;
    }
    write!(
        out,
        "Content-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}

/// A parsed response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Response<'a> {
    pub status: u16,
    pub body: &'a [u8],
}

impl Response<'_> {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Split a raw response into status code and body.
pub fn parse_response(raw: &[u8]) -> Result<Response<'_>, Error> {
    let malformed = Error::Net(NetError::MalformedResponse);
    let line_end = find(raw, b"\r\n").ok_or(malformed)?;
    let status_line = core::str::from_utf8(&raw[..line_end]).map_err(|_| malformed)?;

    let mut parts = status_line.split(' ');
    let version = parts.next().unwrap_or("");
    if !version.starts_with("HTTP/1.") {
        return Err(malformed);
    }
    let status = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or(malformed)?;

    let body = match find(raw, b"\r\n\r\n") {
        Some(idx) => &raw[idx + 4..],
        None => &[],
    };
    Ok(Response { status, body })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// `{"name":…,"type":…,"locationHint":…}`
pub fn registration_body(config: &DeviceConfig) -> Result<String<BODY_CAPACITY>, Error> {
    let mut body = String::new();
    write_registration(&mut body, config).map_err(|_| Error::BufferOverflow)?;
    Ok(body)
}

fn write_registration<W: Write>(out: &mut W, config: &DeviceConfig) -> fmt::Result {
    out.write_char('{')?;
    json_field(out, "name", &config.device_name)?;
    out.write_char(',')?;
    json_field(out, "type", &config.device_type)?;
    out.write_char(',')?;
    json_field(out, "locationHint", &config.location_hint)?;
    out.write_char('}')
}

/// `{"deviceId":…,"metrics":{"temperature_c":…,"humidity_pct":…,"battery_pct":…}}`
pub fn telemetry_body(
    device_id: &str,
    temperature_c: f32,
    humidity_pct: f32,
    battery_pct: f32,
) -> Result<String<BODY_CAPACITY>, Error> {
    let mut body = String::new();
    write_telemetry(&mut body, device_id, [temperature_c, humidity_pct, battery_pct])
        .map_err(|_| Error::BufferOverflow)?;
    Ok(body)
}

fn write_telemetry<W: Write>(out: &mut W, device_id: &str, metrics: [f32; 3]) -> fmt::Result {
    const KEYS: [&str; 3] = ["temperature_c", "humidity_pct", "battery_pct"];

    out.write_char('{')?;
    json_field(out, "deviceId", device_id)?;
    out.write_str(",\"metrics\":{")?;
    for (i, (key, value)) in KEYS.iter().zip(metrics).enumerate() {
        if i > 0 {
            out.write_char(',')?;
        }
        json_string(out, key)?;
        out.write_char(':')?;
        json_number(out, value)?;
    }
    out.write_str("}}")
}

fn json_field<W: Write>(out: &mut W, key: &str, value: &str) -> fmt::Result {
    json_string(out, key)?;
    out.write_char(':')?;
    json_string(out, value)
}

fn json_string<W: Write>(out: &mut W, s: &str) -> fmt::Result {
    out.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => out.write_str("\\\"")?,
            '\\' => out.write_str("\\\\")?,
            '\n' => out.write_str("\\n")?,
            '\r' => out.write_str("\\r")?,
            '\t' => out.write_str("\\t")?,
            c if (c as u32) < 0x20 => write!(out, "\\u{:04x}", c as u32)?,
            c => out.write_char(c)?,
        }
    }
    out.write_char('"')
}

/// Non-finite readings (failed sensor) are sent as `null`.
fn json_number<W: Write>(out: &mut W, value: f32) -> fmt::Result {
    if value.is_finite() {
        write!(out, "{:.2}", value)
    } else {
        out.write_str("null")
    }
}

/// Value of a top-level string field, e.g. the `id` in a registration reply.
///
/// Keys inside nested objects or arrays are skipped. Escapes in the value
/// are not decoded; ids are plain tokens.
pub fn json_string_field<'a>(json: &'a str, key: &str) -> Option<&'a str> {
    let bytes = json.as_bytes();
    let mut depth = 0usize;
    let mut top_is_object = false;
    let mut expect_key = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let end = string_end(bytes, i + 1)?;
                let is_key = depth == 1 && expect_key;
                expect_key = false;
                if is_key && &json[i + 1..end] == key {
                    let rest = json[end + 1..].trim_start().strip_prefix(':')?.trim_start();
                    let value_start = json.len() - rest.len();
                    if bytes.get(value_start) != Some(&b'"') {
                        return None;
                    }
                    let value_end = string_end(bytes, value_start + 1)?;
                    return Some(&json[value_start + 1..value_end]);
                }
                i = end;
            }
            open @ (b'{' | b'[') => {
                depth += 1;
                if depth == 1 {
                    top_is_object = open == b'{';
                    expect_key = top_is_object;
                }
            }
            b'}' | b']' => depth = depth.saturating_sub(1),
            b',' => expect_key = depth == 1 && top_is_object,
            _ => {}
        }
        i += 1;
    }
    None
}

/// Index of the quote closing a string whose contents start at `from`.
fn string_end(bytes: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Device id from a registration reply. The server answers 200 or 201 with
/// a JSON object carrying a non-empty `id`.
pub fn assigned_id<'a>(response: &Response<'a>) -> Result<&'a str, Error> {
    if response.status != 200 && response.status != 201 {
        return Err(NetError::Status(response.status).into());
    }
    let json = core::str::from_utf8(response.body)
        .map_err(|_| Error::Net(NetError::MalformedResponse))?;
    match json_string_field(json, "id") {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(Error::RegistrationFailure),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::record::truncated;

    #[test]
    fn parse_url_variants() {
        assert_eq!(
            parse_url("http://192.168.1.100:4000/api").unwrap(),
            HttpUrl {
                host: "192.168.1.100",
                port: 4000,
                path: "/api"
            }
        );
        assert_eq!(
            parse_url("http://example.com").unwrap(),
            HttpUrl {
                host: "example.com",
                port: 80,
                path: "/"
            }
        );
        assert_eq!(parse_url("https://example.com"), Err(Error::InvalidUrl));
        assert_eq!(parse_url("http://:80/"), Err(Error::InvalidUrl));
        assert_eq!(parse_url("http://host:99999/"), Err(Error::InvalidUrl));
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        assert_eq!(
            endpoint("http://srv:4000/", "/api/devices").unwrap().as_str(),
            "http://srv:4000/api/devices"
        );
        assert_eq!(
            endpoint("http://srv", "/api/ingest").unwrap().as_str(),
            "http://srv/api/ingest"
        );
    }

    #[test]
    fn post_request_layout() {
        let url = parse_url("http://srv:4000/api/ingest").unwrap();
        let mut out: String<256> = String::new();
        write_post(&mut out, &url, "{}").unwrap();
        assert_eq!(
            out.as_str(),
            "POST /api/ingest HTTP/1.1\r\nHost: srv:4000\r\nContent-Type: application/json\r\n\
             Content-Length: 2\r\nConnection: close\r\n\r\n{}"
        );
    }

    #[test]
    fn response_status_and_body() {
        let raw = b"HTTP/1.1 201 Created\r\nContent-Type: application/json\r\n\r\n{\"id\":\"abc\"}";
        let resp = parse_response(raw).unwrap();
        assert_eq!(resp.status, 201);
        assert!(resp.is_success());
        assert_eq!(resp.body, b"{\"id\":\"abc\"}");

        let resp = parse_response(b"HTTP/1.0 500 Oops\r\n\r\n").unwrap();
        assert_eq!(resp.status, 500);
        assert!(!resp.is_success());

        assert_eq!(
            parse_response(b"garbage"),
            Err(Error::Net(NetError::MalformedResponse))
        );
    }

    #[test]
    fn registration_body_escapes_strings() {
        let config = DeviceConfig {
            device_name: truncated("Lab \"A\""),
            device_type: truncated("Temp/Humidity"),
            location_hint: truncated("Shelf\\2"),
            ..DeviceConfig::default()
        };
        assert_eq!(
            registration_body(&config).unwrap().as_str(),
            r#"{"name":"Lab \"A\"","type":"Temp/Humidity","locationHint":"Shelf\\2"}"#
        );
    }

    #[test]
    fn telemetry_body_formats_metrics() {
        let body = telemetry_body("dev-1", 21.5, 40.25, f32::NAN).unwrap();
        assert_eq!(
            body.as_str(),
            r#"{"deviceId":"dev-1","metrics":{"temperature_c":21.50,"humidity_pct":40.25,"battery_pct":null}}"#
        );
    }

    #[test]
    fn id_field_extraction() {
        assert_eq!(json_string_field(r#"{"id":"a1b2"}"#, "id"), Some("a1b2"));
        assert_eq!(
            json_string_field(r#"{ "deviceId" : "x", "id" : "42" }"#, "id"),
            Some("42")
        );
        assert_eq!(json_string_field(r#"{"name":"id","id":"7"}"#, "id"), Some("7"));
        assert_eq!(json_string_field(r#"{"id":7}"#, "id"), None);
        assert_eq!(json_string_field(r#"{"status":"ok"}"#, "id"), None);
    }

    #[test]
    fn id_field_ignores_nested_keys_and_escaped_quotes() {
        assert_eq!(
            json_string_field(r#"{"owner":{"id":"inner"},"id":"outer"}"#, "id"),
            Some("outer")
        );
        assert_eq!(json_string_field(r#"{"owner":{"id":"inner"}}"#, "id"), None);
        assert_eq!(json_string_field(r#"{"tags":["id","x"]}"#, "id"), None);
        assert_eq!(
            json_string_field(r#"{"note":"say \"id\":\"x\"","id":"real"}"#, "id"),
            Some("real")
        );
    }

    #[test]
    fn registration_reply_yields_id() {
        let created = Response { status: 201, body: br#"{"id":"dev-9","name":"bench"}"# };
        assert_eq!(assigned_id(&created), Ok("dev-9"));

        let ok = Response { status: 200, body: br#"{"id":"dev-9"}"# };
        assert_eq!(assigned_id(&ok), Ok("dev-9"));

        // Other 2xx codes are not a registration.
        let accepted = Response { status: 202, body: br#"{"id":"dev-9"}"# };
        assert_eq!(assigned_id(&accepted), Err(Error::Net(NetError::Status(202))));

        let no_id = Response { status: 201, body: br#"{"id":""}"# };
        assert_eq!(assigned_id(&no_id), Err(Error::RegistrationFailure));
    }
}
