//! Field coercion and resource reading shared by both adapters.

use engine_core::{Error, Result, SourceTag};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// Default read timeout for a source file.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Reads a source file in full, bounded by `timeout`.
pub async fn read_resource(tag: SourceTag, path: &Path, timeout: Duration) -> Result<Vec<u8>> {
    match tokio::time::timeout(timeout, tokio::fs::read(path)).await {
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(e)) => Err(Error::source_unavailable(
            tag,
            format!("failed to read {}: {}", path.display(), e),
        )),
        Err(_) => Err(Error::source_unavailable(
            tag,
            format!(
                "reading {} timed out after {}ms",
                path.display(),
                timeout.as_millis()
            ),
        )),
    }
}

/// Parses a textual price such as `"20000"` or `" 19999.5 "`.
pub fn parse_price(raw: &str) -> std::result::Result<f64, String> {
    let trimmed = raw.trim();
    let price: f64 = trimmed
        .parse()
        .map_err(|_| format!("price {:?} is not a number", raw))?;
    if !price.is_finite() {
        return Err(format!("price {:?} is not finite", raw));
    }
    Ok(price)
}

/// Coerces a JSON price that may be a number or a numeric string.
pub fn coerce_price(raw: &Value) -> std::result::Result<f64, String> {
    match raw {
        Value::Number(n) => n
            .as_f64()
            .filter(|p| p.is_finite())
            .ok_or_else(|| format!("price {} is out of range", n)),
        Value::String(s) => parse_price(s),
        Value::Null => Err("price is missing".to_string()),
        other => Err(format!("price {} is not a number", other)),
    }
}

/// Maps an absent or null text field to an empty string.
pub fn text_or_empty(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}
