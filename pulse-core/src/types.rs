use crate::error::{PulseError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Identifier of a microchain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(String);

impl ChainId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an application deployed on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(String);

impl ApplicationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// EVM-style account address (`0x` followed by 20 hex-encoded bytes).
///
/// Stored in lowercase so that routing by address never depends on the
/// checksum casing a wallet happens to return.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| PulseError::InvalidAddress(format!("missing 0x prefix: {}", value)))?;

        let bytes = hex::decode(hex_part)
            .map_err(|e| PulseError::InvalidAddress(format!("{}: {}", value, e)))?;
        if bytes.len() != 20 {
            return Err(PulseError::InvalidAddress(format!(
                "expected 20 bytes, got {}",
                bytes.len()
            )));
        }

        Ok(Self::from_bytes(&bytes))
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Address::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hex-encoded signature returned by a signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(pub String);

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

const ATTO_DIGITS: usize = 18;
const ATTOS_PER_TOKEN: u128 = 1_000_000_000_000_000_000;

/// Native token amount with 18 fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_attos(attos: u128) -> Self {
        Self(attos)
    }

    pub fn from_tokens(tokens: u128) -> Self {
        Self(tokens.saturating_mul(ATTOS_PER_TOKEN))
    }

    pub fn to_attos(self) -> u128 {
        self.0
    }

    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }
}

impl FromStr for Amount {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || PulseError::internal(format!("Invalid amount: {:?}", s));

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if frac.len() > ATTO_DIGITS {
            return Err(invalid());
        }

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let frac_attos: u128 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac, width = ATTO_DIGITS);
            padded.parse().map_err(|_| invalid())?
        };

        whole
            .checked_mul(ATTOS_PER_TOKEN)
            .and_then(|w| w.checked_add(frac_attos))
            .map(Amount)
            .ok_or_else(invalid)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / ATTOS_PER_TOKEN;
        let frac = self.0 % ATTOS_PER_TOKEN;
        if frac == 0 {
            return write!(f, "{}", whole);
        }
        let frac = format!("{:0>width$}", frac, width = ATTO_DIGITS);
        write!(f, "{}.{}", whole, frac.trim_end_matches('0'))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Chain-supplied timestamp in microseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

/// Wall-clock milliseconds to chain microseconds.
pub const MICROS_PER_MILLI: u64 = 1_000;

impl Timestamp {
    pub fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    pub fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(MICROS_PER_MILLI))
    }

    pub fn micros(self) -> u64 {
        self.0
    }

    pub fn saturating_add(self, duration: std::time::Duration) -> Self {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(micros))
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later.
    pub fn duration_since(self, earlier: Timestamp) -> std::time::Duration {
        std::time::Duration::from_micros(self.0.saturating_sub(earlier.0))
    }

    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_micros(i64::try_from(self.0).ok()?)
    }

    /// Parses the decimal-string form the ledger uses in query responses.
    pub fn parse(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Number(n) => n
                .as_u64()
                .map(Self)
                .ok_or_else(|| PulseError::internal(format!("Invalid timestamp: {}", n))),
            serde_json::Value::String(s) => s
                .trim()
                .parse()
                .map(Self)
                .map_err(|e| PulseError::internal(format!("Invalid timestamp {:?}: {}", s, e))),
            other => Err(PulseError::internal(format!("Invalid timestamp: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_is_case_insensitive() {
        let upper = Address::parse("0xAbCdEf0123456789aBcDeF0123456789ABCDEF01").unwrap();
        let lower = Address::parse("0xabcdef0123456789abcdef0123456789abcdef01").unwrap();
        assert_eq!(upper, lower);
        assert!(Address::parse("abcdef").is_err());
        assert!(Address::parse("0x1234").is_err());
    }

    #[test]
    fn test_amount_decimal_format() {
        let amount: Amount = "12.5".parse().unwrap();
        assert_eq!(amount.to_attos(), 12_500_000_000_000_000_000);
        assert_eq!(amount.to_string(), "12.5");

        let amount: Amount = "0.000000000000000001".parse().unwrap();
        assert_eq!(amount.to_attos(), 1);
        assert_eq!(Amount::from_tokens(3).to_string(), "3");

        assert!("".parse::<Amount>().is_err());
        assert!("1.0000000000000000001".parse::<Amount>().is_err());
        assert!("abc".parse::<Amount>().is_err());
    }

    #[test]
    fn test_timestamp_parsing() {
        let ts = Timestamp::parse(&serde_json::json!("1700000000000000")).unwrap();
        assert_eq!(ts.micros(), 1_700_000_000_000_000);
        let ts = Timestamp::parse(&serde_json::json!(42)).unwrap();
        assert_eq!(ts.micros(), 42);
        assert_eq!(Timestamp::from_millis(5).micros(), 5_000);
        assert!(Timestamp::parse(&serde_json::json!(null)).is_err());
    }
}
