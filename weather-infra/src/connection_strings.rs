//! Connection strings and URLs derived from deferred values

use crate::output::Output;

pub const REDIS_TLS_SCHEME: &str = "rediss";

/// `rediss://:<key>@<host>:<port>`, resolved once all three inputs resolve
///
/// Carries the access key, so the result is always secret.
pub fn redis_url(access_key: &Output<String>, host: &Output<String>, ssl_port: &Output<u16>) -> Output<String> {
    access_key
        .zip3(host, ssl_port)
        .map(|(key, host, port)| format!("{}://:{}@{}:{}", REDIS_TLS_SCHEME, key, host, port))
        .into_secret()
}

/// `http://<hostname>:<port>` of the public service endpoint
pub fn service_url(hostname: &Output<String>, container_port: u16) -> Output<String> {
    hostname.map(move |host| format!("http://{}:{}", host, container_port))
}
