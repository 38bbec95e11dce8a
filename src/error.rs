//! Unified error type for sensenode.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for on-target logging when the `defmt`
//! feature is enabled.

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // Lifecycle
    /// No stored configuration; the device must be provisioned.
    ConfigurationMissing,

    /// WiFi did not come up within the connect timeout.
    NetworkConnectTimeout,

    /// The access point rejected the credentials or the link dropped.
    WifiConnectFailed,

    /// The server did not assign a device id.
    RegistrationFailure,

    /// The server did not accept the telemetry record.
    TelemetrySendFailure,

    // Network
    /// Transport-level failure talking to the server.
    Net(NetError),

    /// The configured server URL cannot be used.
    InvalidUrl,

    // Provisioning
    /// The setup form was rejected.
    InvalidForm(FormError),

    // Storage
    /// Flash read/write/erase failed.
    Storage,

    // Peripherals
    /// The humidity/temperature sensor did not answer or was busy.
    Sensor,

    // Generic
    /// Button detector and click disambiguator timings disagree.
    TimingMismatch,

    /// Buffer too small for the requested operation.
    BufferOverflow,

    /// Operation timed out.
    Timeout,
}

/// Transport errors from the HTTP client (keeps the enum `Copy`-friendly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetError {
    /// Host name could not be resolved.
    Dns,
    /// TCP connection could not be established.
    Connect,
    /// Socket read/write failed mid-request.
    Io,
    /// The response was not parseable HTTP.
    MalformedResponse,
    /// The server answered with an unexpected status code.
    Status(u16),
}

/// Reasons the setup form can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FormError {
    /// A required field was absent or empty.
    MissingField,
    /// A field was not valid percent-encoding / UTF-8.
    BadEncoding,
}

// Convenience conversions

impl From<NetError> for Error {
    fn from(e: NetError) -> Self {
        Error::Net(e)
    }
}

impl From<FormError> for Error {
    fn from(e: FormError) -> Self {
        Error::InvalidForm(e)
    }
}
