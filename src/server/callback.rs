// External imports
use std::io::Write;
use std::os::unix::net::UnixStream;

// Internal imports
use super::protocol::ForecastResponse;
use crate::error::ForecastError;

/// # Deliver a Training Response
///
/// Dials the caller-supplied socket path, writes the response as one JSON
/// object, and closes the connection; the close marks the end of the
/// message. Any failure to connect or write becomes a `Delivery` error so
/// the transport can tell an undeliverable result from a failed training
/// run.
pub fn deliver(address: &str, response: &ForecastResponse) -> Result<(), ForecastError> {
    let payload = serde_json::to_vec(response)
        .map_err(|e| ForecastError::Delivery(format!("failed to encode response: {}", e)))?;

    let mut stream = UnixStream::connect(address).map_err(|e| {
        ForecastError::Delivery(format!("failed to connect to '{}': {}", address, e))
    })?;
    stream.write_all(&payload).map_err(|e| {
        ForecastError::Delivery(format!("failed to write to '{}': {}", address, e))
    })?;
    stream.flush().map_err(|e| {
        ForecastError::Delivery(format!("failed to flush '{}': {}", address, e))
    })?;

    Ok(())
}
