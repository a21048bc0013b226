use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn from_str(s: impl Into<String>) -> Self {
                Self(s.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(ServerIdentity);
id_newtype!(RunId);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerIdentity {
    /// Canonical identity for a bare host as it appears in federation lists
    /// and storage keys (`lemmy.ml`, `example.org:8443`).
    pub fn from_host(host: &str) -> Self {
        Self(host.trim().to_ascii_lowercase())
    }

    /// Authority component of an actor URL: the host plus any explicit,
    /// non-default port. Returns `None` when the URL does not parse or has no host.
    pub fn from_actor_url(actor_url: &str) -> Option<Self> {
        let url = Url::parse(actor_url.trim()).ok()?;
        let host = url.host_str().filter(|h| !h.is_empty())?;
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        Some(Self::from_host(&authority))
    }
}
