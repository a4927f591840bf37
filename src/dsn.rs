//! Sentry DSN parsing
//!
//! A DSN carries everything needed to reach the ingestion endpoint:
//! `{scheme}://{public_key}[:{secret_key}]@{host}[:{port}]/[{path}/]{project_id}`

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::RavenError;

/// Parsed DSN: ingestion endpoint plus signing keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dsn {
    original: String,
    sentry_uri: String,
    public_key: String,
    secret_key: Option<String>,
    project_id: String,
}

impl Dsn {
    pub fn parse(dsn: &str) -> Result<Self, RavenError> {
        let url = Url::parse(dsn.trim()).map_err(|e| RavenError::InvalidDsn(e.to_string()))?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(RavenError::InvalidDsn(format!(
                    "unsupported scheme '{}'",
                    other
                )))
            }
        }

        let public_key = url.username();
        if public_key.is_empty() {
            return Err(RavenError::InvalidDsn("missing public key".to_string()));
        }

        let host = url
            .host_str()
            .ok_or_else(|| RavenError::InvalidDsn("missing host".to_string()))?;

        let mut segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();
        let project_id = segments
            .pop()
            .ok_or_else(|| RavenError::InvalidDsn("missing project id".to_string()))?;

        let port = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
        let prefix: String = segments.iter().map(|seg| format!("/{}", seg)).collect();

        let sentry_uri = format!(
            "{}://{}{}{}/api/{}/store/",
            url.scheme(),
            host,
            port,
            prefix,
            project_id
        );

        Ok(Self {
            original: dsn.trim().to_string(),
            sentry_uri,
            public_key: public_key.to_string(),
            secret_key: url.password().map(|s| s.to_string()),
            project_id: project_id.to_string(),
        })
    }

    /// Store endpoint events are POSTed to
    pub fn sentry_uri(&self) -> &str {
        &self.sentry_uri
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Secret key; modern DSNs omit it
    pub fn secret_key(&self) -> Option<&str> {
        self.secret_key.as_deref()
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }
}

impl FromStr for Dsn {
    type Err = RavenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dsn::parse(s)
    }
}

impl fmt::Display for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}
