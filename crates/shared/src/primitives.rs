use std::{fmt, str::FromStr};

use anyhow;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(transparent)]
pub struct WrappedUuidV4(uuid::Uuid);

impl Default for WrappedUuidV4 {
    fn default() -> Self {
        Self::new()
    }
}

impl WrappedUuidV4 {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl FromStr for WrappedUuidV4 {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(uuid::Uuid::parse_str(s)?))
    }
}

impl fmt::Display for WrappedUuidV4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for WrappedUuidV4 {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(Self(uuid::Uuid::parse_str(&value)?))
    }
}

impl libsql::FromValue for WrappedUuidV4 {
    fn from_sql(val: libsql::Value) -> libsql::Result<Self>
    where
        Self: Sized,
    {
        match val {
            libsql::Value::Text(s) => {
                WrappedUuidV4::try_from(s).map_err(|_e| libsql::Error::InvalidColumnType)
            }
            _ => Err(libsql::Error::InvalidColumnType),
        }
    }
}

impl From<WrappedUuidV4> for libsql::Value {
    fn from(val: WrappedUuidV4) -> Self {
        libsql::Value::Text(val.to_string())
    }
}

/// UUIDv7 identifier. The leading bits encode the creation time, so the
/// derived `Ord` follows creation order and serves as a timestamp tie-break.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    JsonSchema,
)]
#[serde(transparent)]
pub struct WrappedUuidV7(uuid::Uuid);

impl Default for WrappedUuidV7 {
    fn default() -> Self {
        Self::new()
    }
}

impl WrappedUuidV7 {
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }
}

impl FromStr for WrappedUuidV7 {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(uuid::Uuid::parse_str(s)?))
    }
}

impl fmt::Display for WrappedUuidV7 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for WrappedUuidV7 {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(Self(uuid::Uuid::parse_str(&value)?))
    }
}

impl libsql::FromValue for WrappedUuidV7 {
    fn from_sql(val: libsql::Value) -> libsql::Result<Self>
    where
        Self: Sized,
    {
        match val {
            libsql::Value::Text(s) => {
                WrappedUuidV7::try_from(s).map_err(|_e| libsql::Error::InvalidColumnType)
            }
            _ => Err(libsql::Error::InvalidColumnType),
        }
    }
}

impl From<WrappedUuidV7> for libsql::Value {
    fn from(val: WrappedUuidV7) -> Self {
        libsql::Value::Text(val.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(transparent)]
pub struct WrappedChronoDateTime(chrono::DateTime<chrono::Utc>);

impl WrappedChronoDateTime {
    pub fn get_inner(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.0
    }

    pub fn new(value: chrono::DateTime<chrono::Utc>) -> Self {
        Self(value)
    }

    pub fn now() -> Self {
        Self(chrono::Utc::now())
    }
}

impl TryFrom<&str> for WrappedChronoDateTime {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // Try SQLite datetime format first, then fall back to RFC3339
        let parsed = chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .or_else(|_| chrono::DateTime::parse_from_rfc3339(value).map(|dt| dt.into()))
            .map_err(|_e| anyhow::anyhow!("invalid datetime value"))?;

        Ok(WrappedChronoDateTime::new(parsed))
    }
}

impl TryFrom<String> for WrappedChronoDateTime {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        WrappedChronoDateTime::try_from(value.as_str())
    }
}

impl fmt::Display for WrappedChronoDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<chrono::DateTime<chrono::Utc>> for WrappedChronoDateTime {
    fn from(value: chrono::DateTime<chrono::Utc>) -> Self {
        Self(value)
    }
}

impl From<WrappedChronoDateTime> for chrono::DateTime<chrono::Utc> {
    fn from(value: WrappedChronoDateTime) -> Self {
        value.0
    }
}

impl libsql::FromValue for WrappedChronoDateTime {
    fn from_sql(val: libsql::Value) -> libsql::Result<Self>
    where
        Self: Sized,
    {
        match val {
            libsql::Value::Text(s) => WrappedChronoDateTime::try_from(s.as_str())
                .map_err(|_e| libsql::Error::InvalidColumnType),
            _ => Err(libsql::Error::InvalidColumnType),
        }
    }
}

impl From<WrappedChronoDateTime> for libsql::Value {
    fn from(value: WrappedChronoDateTime) -> Self {
        // Use SQLite's expected datetime format instead of RFC3339
        libsql::Value::Text(value.0.format("%Y-%m-%d %H:%M:%S%.f").to_string())
    }
}
