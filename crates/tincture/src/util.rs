use std::time::Duration;

use crate::error::{AgentError, Result};

/// Parse a helper timeout: `500ms`, `30s`, `2m`, or a bare number of
/// seconds. Whitespace between the number and the unit is allowed.
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let value = raw.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);
    let amount: u64 = digits
        .parse()
        .map_err(|_| AgentError::invalid(format!("duration {raw:?} must start with a whole number")))?;

    match unit.trim_start() {
        "ms" => Ok(Duration::from_millis(amount)),
        "" | "s" => Ok(Duration::from_secs(amount)),
        "m" => amount
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| AgentError::invalid(format!("duration {raw:?} is too large"))),
        other => Err(AgentError::invalid(format!(
            "duration {raw:?} has unknown unit {other:?} (expected ms, s, or m)"
        ))),
    }
}
