//! Typed decoding of the crawler's composite storage keys.
//!
//! ```text
//! instance:<host>
//! community:<host>:<name>
//! fediverse:<host>
//! error:<kind>:<host>
//! uptime:<timestamp>
//! ```

use std::fmt;

use thiserror::Error;

use crate::ids::ServerIdentity;
use crate::model::FailureKind;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageKey {
    Instance(ServerIdentity),
    Community { host: ServerIdentity, name: String },
    Fediverse(ServerIdentity),
    Failure { kind: FailureKind, host: ServerIdentity },
    Uptime(i64),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("storage key {0:?} has no namespace")]
    MissingNamespace(String),
    #[error("storage key {key:?} has unknown namespace {namespace:?}")]
    UnknownNamespace { key: String, namespace: String },
    #[error("storage key {key:?} has unknown failure kind {kind:?}")]
    UnknownFailureKind { key: String, kind: String },
    #[error("storage key {0:?} has an empty host")]
    EmptyHost(String),
    #[error("storage key {0:?} has no community name")]
    MissingCommunityName(String),
    #[error("storage key {0:?} has an invalid timestamp")]
    InvalidTimestamp(String),
    #[error("storage key {key:?} is not in the {expected} namespace")]
    WrongNamespace { key: String, expected: &'static str },
}

fn host(key: &str, raw: &str) -> Result<ServerIdentity, KeyError> {
    if raw.trim().is_empty() {
        return Err(KeyError::EmptyHost(key.to_string()));
    }
    Ok(ServerIdentity::from_host(raw))
}

impl StorageKey {
    pub fn parse(key: &str) -> Result<Self, KeyError> {
        let (namespace, rest) = key
            .split_once(':')
            .ok_or_else(|| KeyError::MissingNamespace(key.to_string()))?;

        match namespace {
            "instance" => Ok(StorageKey::Instance(host(key, rest)?)),
            "fediverse" => Ok(StorageKey::Fediverse(host(key, rest)?)),
            "community" => {
                // names never contain ':', hosts may (explicit port)
                let (h, name) = rest
                    .rsplit_once(':')
                    .filter(|(_, name)| !name.is_empty())
                    .ok_or_else(|| KeyError::MissingCommunityName(key.to_string()))?;
                Ok(StorageKey::Community { host: host(key, h)?, name: name.to_string() })
            }
            "error" => {
                let (kind, h) = rest
                    .split_once(':')
                    .ok_or_else(|| KeyError::EmptyHost(key.to_string()))?;
                let kind = FailureKind::parse(kind).ok_or_else(|| KeyError::UnknownFailureKind {
                    key: key.to_string(),
                    kind: kind.to_string(),
                })?;
                Ok(StorageKey::Failure { kind, host: host(key, h)? })
            }
            "uptime" => rest
                .parse::<i64>()
                .map(StorageKey::Uptime)
                .map_err(|_| KeyError::InvalidTimestamp(key.to_string())),
            other => Err(KeyError::UnknownNamespace {
                key: key.to_string(),
                namespace: other.to_string(),
            }),
        }
    }

    pub fn identity(&self) -> Option<&ServerIdentity> {
        match self {
            StorageKey::Instance(h) | StorageKey::Fediverse(h) => Some(h),
            StorageKey::Community { host, .. } | StorageKey::Failure { host, .. } => Some(host),
            StorageKey::Uptime(_) => None,
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKey::Instance(h) => write!(f, "instance:{}", h),
            StorageKey::Community { host, name } => write!(f, "community:{}:{}", host, name),
            StorageKey::Fediverse(h) => write!(f, "fediverse:{}", h),
            StorageKey::Failure { kind, host } => write!(f, "error:{}:{}", kind, host),
            StorageKey::Uptime(ts) => write!(f, "uptime:{}", ts),
        }
    }
}

/// Identity from a `fediverse:<host>` key.
pub fn fediverse_identity(key: &str) -> Result<ServerIdentity, KeyError> {
    match StorageKey::parse(key)? {
        StorageKey::Fediverse(h) => Ok(h),
        _ => Err(KeyError::WrongNamespace { key: key.to_string(), expected: "fediverse" }),
    }
}

/// Identity from an `error:<kind>:<host>` key whose kind must match `expected`.
pub fn failure_identity(expected: FailureKind, key: &str) -> Result<ServerIdentity, KeyError> {
    match StorageKey::parse(key)? {
        StorageKey::Failure { kind, host } if kind == expected => Ok(host),
        _ => Err(KeyError::WrongNamespace {
            key: key.to_string(),
            expected: match expected {
                FailureKind::Instance => "error:instance",
                FailureKind::Community => "error:community",
            },
        }),
    }
}

/// A decoded collection plus the keys that could not be decoded.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Decoded<T> {
    pub value: T,
    pub rejected: Vec<KeyError>,
}
