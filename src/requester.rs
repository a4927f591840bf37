//! One delivery attempt to the Sentry store endpoint
//!
//! A [`Requester`] is built synchronously from a packet and a client: the
//! packet is prepared, the request context is captured, and the transport
//! headers are computed once. [`Requester::request`] then encodes the body and
//! performs exactly one POST. There are no retries.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_ENCODING, CONTENT_TYPE, USER_AGENT,
};

use crate::client::PacketClient;
use crate::error::{RavenError, Result};
use crate::packet::JsonPacket;
use crate::packet_builder;
use crate::request_data::RequestData;

pub struct Requester {
    data: RequestData,
    http_client: reqwest::Client,
    sentry_uri: String,
    auth_header: String,
    compression: bool,
    debug: bool,
}

impl Requester {
    /// Prepare a delivery attempt
    ///
    /// Fails with a configuration error when the client has no usable DSN.
    pub fn new<C>(packet: JsonPacket, client: &C) -> Result<Self>
    where
        C: PacketClient + ?Sized,
    {
        let dsn = client.dsn()?;
        let auth_header = packet_builder::authentication_header(dsn);

        let packet = client.prepare_packet(packet);
        let context = client.context_factory().create();
        let data = RequestData::new(packet, context, client.scrubber().cloned());

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static("x-sentry-auth"),
            HeaderValue::from_str(&auth_header)
                .map_err(|e| RavenError::InvalidDsn(format!("invalid auth header: {}", e)))?,
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(packet_builder::USER_AGENT));

        let http_client = reqwest::Client::builder()
            .timeout(client.timeout())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            data,
            http_client,
            sentry_uri: dsn.sentry_uri().to_string(),
            auth_header,
            compression: client.compression(),
            debug: client.debug(),
        })
    }

    pub fn data(&self) -> &RequestData {
        &self.data
    }

    /// `X-Sentry-Auth` value sent with this attempt
    pub fn auth_header(&self) -> &str {
        &self.auth_header
    }

    pub fn user_agent(&self) -> &'static str {
        packet_builder::USER_AGENT
    }

    pub fn sentry_uri(&self) -> &str {
        &self.sentry_uri
    }

    pub fn compression(&self) -> bool {
        self.compression
    }

    /// Encode the scrubbed payload, gzipped when compression is on
    pub fn encode_body(&self) -> Result<Vec<u8>> {
        let scrubbed = self.data.scrubbed()?;

        if !self.compression {
            return Ok(scrubbed.into_bytes());
        }

        let buffer = Vec::with_capacity(scrubbed.len() / 2);
        let mut encoder = GzEncoder::new(buffer, Compression::default());
        encoder.write_all(scrubbed.as_bytes())?;
        Ok(encoder.finish()?)
    }

    /// Send the event and return the response body verbatim
    ///
    /// Non-success status codes, connection failures and timeouts are errors.
    pub async fn request(self) -> Result<String> {
        let body = self.encode_body()?;

        if self.debug {
            tracing::debug!(
                payload = %self.data.scrubbed()?,
                endpoint = %self.sentry_uri,
                "[Raven] sending event payload"
            );
        }

        let mut request = self
            .http_client
            .post(&self.sentry_uri)
            .header(CONTENT_TYPE, "application/json");
        if self.compression {
            request = request.header(CONTENT_ENCODING, "gzip");
        }

        tracing::debug!(
            event_id = %self.data.packet().event_id,
            bytes = body.len(),
            compressed = self.compression,
            "[Raven] posting event"
        );

        let response = request.body(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(RavenError::SendFailed { status, body: text });
        }

        Ok(text)
    }
}
