//! Authenticated catalog session: login, secret probing, request signing.
//!
//! Signed endpoints require `request_ts`/`request_sig` query parameters where
//! the signature is an md5 digest over a fixed concatenation of the operation
//! name, its parameters, the timestamp, and a shared secret. The concatenation
//! order is part of the wire contract; the remote service rejects any
//! deviation with a plain HTTP error.

use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};
use serde_json::Value;

use crate::error::Error;

pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:83.0) Gecko/20100101 Firefox/83.0";

/// Login credentials supplied by configuration.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// An authenticated session holding the user token and the validated secret.
#[derive(Debug, Clone)]
pub struct Session {
    app_id: String,
    user_auth_token: String,
    secret: String,
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

/// Computes the signature for a stream-url request.
///
/// Byte-for-byte wire contract:
/// `trackgetFileUrl` + `format_id{tier}` + `intentstream` + `track_id{id}` +
/// timestamp + secret, md5-hexed.
pub fn sign_stream_request(track_id: &str, format_id: u32, timestamp: u64, secret: &str) -> String {
    let payload =
        format!("trackgetFileUrlformat_id{format_id}intentstreamtrack_id{track_id}{timestamp}{secret}");
    format!("{:x}", md5::compute(payload))
}

fn sign_library_probe(timestamp: u64, secret: &str) -> String {
    let payload = format!("userLibrarygetAlbumsList{timestamp}{secret}");
    format!("{:x}", md5::compute(payload))
}

impl Session {
    /// Logs in and fixes the first working secret from the candidate pool.
    ///
    /// Probing is a one-time cost per session: each candidate is tried with a
    /// single signed library call, and an HTTP 400-class answer discards it.
    pub fn authenticate(
        agent: &ureq::Agent,
        base_url: &str,
        credentials: &Credentials,
        app_id: &str,
        secret_pool: &[String],
    ) -> Result<Self, Error> {
        let response = agent
            .get(&format!("{base_url}user/login"))
            .set("User-Agent", USER_AGENT)
            .set("X-App-Id", app_id)
            .query("email", &credentials.email)
            .query("password", &credentials.password)
            .query("app_id", app_id);
        let payload: Value = match response.call() {
            Ok(response) => response
                .into_json()
                .map_err(|error| Error::Response(error.to_string()))?,
            Err(ureq::Error::Status(401, _)) => return Err(Error::Authentication),
            Err(ureq::Error::Status(400, _)) => return Err(Error::InvalidAppId),
            Err(error) => return Err(Error::Http(Box::new(error))),
        };

        let credential_parameters = payload
            .get("user")
            .and_then(|user| user.get("credential"))
            .and_then(|credential| credential.get("parameters"));
        match credential_parameters {
            Some(parameters) if !parameters.is_null() => {}
            _ => return Err(Error::Ineligible),
        }
        if let Some(label) = credential_parameters
            .and_then(|parameters| parameters.get("short_label"))
            .and_then(Value::as_str)
        {
            info!("Logged in (membership: {label})");
        }

        let user_auth_token = payload
            .get("user_auth_token")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Response("login response missing user_auth_token".to_string()))?
            .to_string();

        let mut session = Session {
            app_id: app_id.to_string(),
            user_auth_token,
            secret: String::new(),
        };
        for candidate in secret_pool {
            if session.validate_secret(agent, base_url, candidate)? {
                debug!("App secret candidate accepted");
                session.secret = candidate.clone();
                return Ok(session);
            }
            debug!("App secret candidate rejected, trying next");
        }
        Err(Error::InvalidAppSecret)
    }

    /// Probes one secret candidate with a real signed library call.
    fn validate_secret(
        &self,
        agent: &ureq::Agent,
        base_url: &str,
        candidate: &str,
    ) -> Result<bool, Error> {
        let timestamp = unix_timestamp();
        let signature = sign_library_probe(timestamp, candidate);
        let response = agent
            .get(&format!("{base_url}userLibrary/getAlbumsList"))
            .set("User-Agent", USER_AGENT)
            .set("X-App-Id", &self.app_id)
            .set("X-User-Auth-Token", &self.user_auth_token)
            .query("app_id", &self.app_id)
            .query("user_auth_token", &self.user_auth_token)
            .query("request_ts", &timestamp.to_string())
            .query("request_sig", &signature)
            .call();
        match response {
            Ok(_) => Ok(true),
            Err(ureq::Error::Status(code, _)) if (400..500).contains(&code) => Ok(false),
            Err(error) => Err(Error::Http(Box::new(error))),
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn user_auth_token(&self) -> &str {
        &self.user_auth_token
    }

    /// Assembles the signed query parameters for a stream-url request.
    pub fn signed_stream_params(&self, track_id: &str, format_id: u32) -> Vec<(String, String)> {
        let timestamp = unix_timestamp();
        let signature = sign_stream_request(track_id, format_id, timestamp, &self.secret);
        vec![
            ("request_ts".to_string(), timestamp.to_string()),
            ("request_sig".to_string(), signature),
            ("track_id".to_string(), track_id.to_string()),
            ("format_id".to_string(), format_id.to_string()),
            ("intent".to_string(), "stream".to_string()),
        ]
    }

    #[cfg(test)]
    pub fn for_tests(app_id: &str, token: &str, secret: &str) -> Self {
        Session {
            app_id: app_id.to_string(),
            user_auth_token: token.to_string(),
            secret: secret.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{sign_stream_request, Session};

    #[test]
    fn test_stream_signature_concatenation_order() {
        let expected = format!(
            "{:x}",
            md5::compute("trackgetFileUrlformat_id27intentstreamtrack_id52311161803200100secretvalue")
        );
        assert_eq!(
            sign_stream_request("52311", 27, 1_618_032_001, "00secretvalue"),
            expected
        );
    }

    #[test]
    fn test_stream_signature_varies_with_every_component() {
        let base = sign_stream_request("1", 6, 100, "s");
        assert_ne!(base, sign_stream_request("2", 6, 100, "s"));
        assert_ne!(base, sign_stream_request("1", 7, 100, "s"));
        assert_ne!(base, sign_stream_request("1", 6, 101, "s"));
        assert_ne!(base, sign_stream_request("1", 6, 100, "t"));
    }

    #[test]
    fn test_signed_stream_params_shape() {
        let session = Session::for_tests("123456789", "token", "secret");
        let params = session.signed_stream_params("52311", 6);
        let keys: Vec<&str> = params.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(
            keys,
            ["request_ts", "request_sig", "track_id", "format_id", "intent"]
        );
        assert_eq!(params[4].1, "stream");
        assert_eq!(params[2].1, "52311");
    }
}
