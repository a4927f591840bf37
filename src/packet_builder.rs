//! Transport-identifying header values derived from the DSN

use crate::dsn::Dsn;
use crate::utils::unix_timestamp;

/// Protocol version announced in the auth header
pub const SENTRY_VERSION: u8 = 5;

/// Name of the authentication header
pub const AUTH_HEADER_NAME: &str = "X-Sentry-Auth";

/// Client name and version, sent as `User-Agent` and `sentry_client`
pub const USER_AGENT: &str = concat!("raven-actix/", env!("CARGO_PKG_VERSION"));

/// Build the `X-Sentry-Auth` header value for a DSN
///
/// Embeds the current time, so it must be built per delivery attempt.
pub fn authentication_header(dsn: &Dsn) -> String {
    authentication_header_at(dsn, unix_timestamp())
}

fn authentication_header_at(dsn: &Dsn, timestamp: i64) -> String {
    let mut header = format!(
        "Sentry sentry_version={}, sentry_client={}, sentry_timestamp={}, sentry_key={}",
        SENTRY_VERSION,
        USER_AGENT,
        timestamp,
        dsn.public_key()
    );

    if let Some(secret) = dsn.secret_key() {
        header.push_str(", sentry_secret=");
        header.push_str(secret);
    }

    header
}
