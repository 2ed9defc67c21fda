//! SCRAM-SHA-256 / SCRAM-SHA-256-PLUS client (RFC 5802, RFC 7677).

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use rand::{Rng, thread_rng};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use pgnative_core::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

pub const MECHANISM_PLUS: &str = "SCRAM-SHA-256-PLUS";
pub const MECHANISM_PLAIN: &str = "SCRAM-SHA-256";

/// How strongly the caller wants channel binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelBindingPolicy {
    /// Fail rather than authenticate without channel binding.
    Required,
    /// Use channel binding when available, fall back silently (with a
    /// logged warning) otherwise.
    Preferred,
}

/// Drives one SCRAM-SHA-256[-PLUS] exchange for a single authentication
/// attempt. Mechanism selection happens once, in `new`, from the server's
/// advertised mechanism list and the channel-binding fingerprint (if any)
/// supplied by the transport.
pub struct ScramClient {
    password: String,
    client_nonce: String,
    gs2_header: &'static str,
    mechanism: &'static str,
    cbind_data: Option<[u8; 32]>,

    server_nonce: Option<String>,
    salted_password: Option<[u8; 32]>,
    auth_message: Option<String>,
}

impl ScramClient {
    /// Select a mechanism and build a client ready to start the exchange.
    ///
    /// `server_mechanisms` is the list from `AuthenticationSASL`.
    /// `channel_binding_fingerprint` is `Some(sha256(leaf cert DER))` when
    /// the transport is TLS and the handshake completed.
    pub fn new(
        password: &str,
        server_mechanisms: &[String],
        policy: ChannelBindingPolicy,
        channel_binding_fingerprint: Option<[u8; 32]>,
    ) -> Result<Self> {
        let password = stringprep::saslprep(password)
            .map_err(|_| Error::Authentication("password contains a prohibited SASLprep character".into()))?
            .into_owned();

        let server_has_plus = server_mechanisms.iter().any(|m| m == MECHANISM_PLUS);
        let server_has_plain = server_mechanisms.iter().any(|m| m == MECHANISM_PLAIN);

        let (mechanism, gs2_header, cbind_data) =
            match (server_has_plus, channel_binding_fingerprint, policy) {
                (true, Some(fingerprint), _) => {
                    (MECHANISM_PLUS, "p=tls-server-end-point,,", Some(fingerprint))
                }
                (_, _, ChannelBindingPolicy::Required) => {
                    return Err(Error::ChannelBindingRequired);
                }
                (_, _, ChannelBindingPolicy::Preferred) => {
                    if !server_has_plain {
                        return Err(Error::Authentication(
                            "server does not advertise SCRAM-SHA-256".into(),
                        ));
                    }
                    log::warn!(
                        "channel binding preferred but SCRAM-SHA-256-PLUS is unavailable; \
                         falling back to SCRAM-SHA-256 without channel binding"
                    );
                    (MECHANISM_PLAIN, "n,,", None)
                }
            };

        // 18 random bytes, base64-encoded, per the client-nonce construction.
        let mut nonce_bytes = [0u8; 18];
        thread_rng().fill(&mut nonce_bytes);
        let client_nonce = BASE64.encode(nonce_bytes);

        Ok(ScramClient {
            password,
            client_nonce,
            gs2_header,
            mechanism,
            cbind_data,
            server_nonce: None,
            salted_password: None,
            auth_message: None,
        })
    }

    /// The mechanism name to put in `SASLInitialResponse`.
    pub fn mechanism(&self) -> &'static str {
        self.mechanism
    }

    /// `client-first-message`: empty username per the Postgres convention
    /// (the server reads the real user from the startup packet).
    pub fn client_first(&self) -> Vec<u8> {
        format!("{}n=,r={}", self.gs2_header, self.client_nonce).into_bytes()
    }

    fn client_first_bare(&self) -> String {
        format!("n=,r={}", self.client_nonce)
    }

    fn cbind_input(&self) -> Vec<u8> {
        let mut v = self.gs2_header.as_bytes().to_vec();
        if let Some(fingerprint) = self.cbind_data {
            v.extend_from_slice(&fingerprint);
        }
        v
    }

    /// Process `server-first-message`, returning the `client-final-message`.
    pub fn process_server_first(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let msg = std::str::from_utf8(data)
            .map_err(|e| Error::protocol(format!("invalid UTF-8 in SASL continue: {e}")))?;

        let mut combined_nonce = None;
        let mut salt = None;
        let mut iterations = None;

        for part in msg.split(',') {
            if let Some(value) = part.strip_prefix("r=") {
                combined_nonce = Some(value.to_string());
            } else if let Some(value) = part.strip_prefix("s=") {
                salt = Some(
                    BASE64
                        .decode(value)
                        .map_err(|e| Error::protocol(format!("invalid base64 salt: {e}")))?,
                );
            } else if let Some(value) = part.strip_prefix("i=") {
                iterations = Some(
                    value
                        .parse::<u32>()
                        .map_err(|e| Error::protocol(format!("invalid iteration count: {e}")))?,
                );
            }
        }

        let combined_nonce =
            combined_nonce.ok_or_else(|| Error::protocol("server-first-message missing r="))?;
        let salt = salt.ok_or_else(|| Error::protocol("server-first-message missing s="))?;
        let iterations =
            iterations.ok_or_else(|| Error::protocol("server-first-message missing i="))?;

        if !combined_nonce.starts_with(&self.client_nonce) {
            return Err(Error::Authentication(
                "server nonce does not extend the client nonce".into(),
            ));
        }
        if iterations < 4096 {
            return Err(Error::Authentication(format!(
                "server requested {iterations} SCRAM iterations, below the minimum of 4096"
            )));
        }

        let mut salted_password = [0u8; 32];
        pbkdf2::pbkdf2::<HmacSha256>(self.password.as_bytes(), &salt, iterations, &mut salted_password)
            .map_err(|e| Error::protocol(format!("PBKDF2 derivation failed: {e}")))?;

        let client_final_without_proof = format!(
            "c={},r={}",
            BASE64.encode(self.cbind_input()),
            combined_nonce
        );
        let auth_message = format!(
            "{},{},{}",
            self.client_first_bare(),
            msg,
            client_final_without_proof
        );

        let client_key = hmac_sha256(&salted_password, b"Client Key")?;
        let stored_key = sha256(&client_key);
        let client_signature = hmac_sha256(&stored_key, auth_message.as_bytes())?;

        let client_proof: Vec<u8> = client_key
            .iter()
            .zip(client_signature.iter())
            .map(|(a, b)| a ^ b)
            .collect();

        self.server_nonce = Some(combined_nonce);
        self.salted_password = Some(salted_password);
        self.auth_message = Some(auth_message);

        let client_final = format!(
            "{},p={}",
            client_final_without_proof,
            BASE64.encode(&client_proof)
        );
        Ok(client_final.into_bytes())
    }

    /// Verify `server-final-message`'s `v=` against the expected server
    /// signature. Comparison is constant-time.
    pub fn verify_server_final(&self, data: &[u8]) -> Result<()> {
        let msg = std::str::from_utf8(data)
            .map_err(|e| Error::protocol(format!("invalid UTF-8 in SASL final: {e}")))?;

        let server_signature_b64 = msg
            .strip_prefix("v=")
            .ok_or_else(|| Error::protocol("server-final-message missing v="))?;
        let server_signature = BASE64
            .decode(server_signature_b64)
            .map_err(|e| Error::protocol(format!("invalid base64 server signature: {e}")))?;

        let salted_password = self
            .salted_password
            .ok_or_else(|| Error::protocol("verify_server_final called before server-first"))?;
        let auth_message = self
            .auth_message
            .as_ref()
            .ok_or_else(|| Error::protocol("verify_server_final called before server-first"))?;

        let server_key = hmac_sha256(&salted_password, b"Server Key")?;
        let expected_signature = hmac_sha256(&server_key, auth_message.as_bytes())?;

        if server_signature.ct_eq(&expected_signature).unwrap_u8() != 1 {
            return Err(Error::Authentication("server signature mismatch".into()));
        }
        Ok(())
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32]> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| Error::protocol(format!("HMAC initialization failed: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mechanisms(plus: bool, plain: bool) -> Vec<String> {
        let mut v = Vec::new();
        if plus {
            v.push(MECHANISM_PLUS.to_string());
        }
        if plain {
            v.push(MECHANISM_PLAIN.to_string());
        }
        v
    }

    #[test]
    fn selects_plus_when_fingerprint_available() {
        let client = ScramClient::new(
            "secret",
            &mechanisms(true, true),
            ChannelBindingPolicy::Preferred,
            Some([9u8; 32]),
        )
        .unwrap();
        assert_eq!(client.mechanism(), MECHANISM_PLUS);
        assert!(client.client_first().starts_with(b"p=tls-server-end-point,,"));
    }

    #[test]
    fn required_without_plus_fails_before_any_password() {
        let err = ScramClient::new(
            "secret",
            &mechanisms(false, true),
            ChannelBindingPolicy::Required,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ChannelBindingRequired));
    }

    #[test]
    fn preferred_without_plus_falls_back_to_plain() {
        let client = ScramClient::new(
            "secret",
            &mechanisms(false, true),
            ChannelBindingPolicy::Preferred,
            None,
        )
        .unwrap();
        assert_eq!(client.mechanism(), MECHANISM_PLAIN);
        assert!(client.client_first().starts_with(b"n,,"));
    }

    #[test]
    fn client_first_has_empty_username() {
        let client = ScramClient::new(
            "secret",
            &mechanisms(false, true),
            ChannelBindingPolicy::Preferred,
            None,
        )
        .unwrap();
        let first = String::from_utf8(client.client_first()).unwrap();
        assert!(first.contains("n=,r="));
    }

    #[test]
    fn rejects_low_iteration_count() {
        let mut client = ScramClient::new(
            "secret",
            &mechanisms(false, true),
            ChannelBindingPolicy::Preferred,
            None,
        )
        .unwrap();
        let server_first = format!("r={}abc,s={},i=1000", client.client_nonce, BASE64.encode(b"salt"));
        let err = client.process_server_first(server_first.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[test]
    fn rejects_bad_nonce_prefix() {
        let mut client = ScramClient::new(
            "secret",
            &mechanisms(false, true),
            ChannelBindingPolicy::Preferred,
            None,
        )
        .unwrap();
        let server_first = format!("r=totally-different,s={},i=4096", BASE64.encode(b"salt"));
        let err = client.process_server_first(server_first.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[test]
    fn full_exchange_verifies_server_signature() {
        // Simulate a server using the same derivation so the test is
        // self-contained (no live Postgres needed).
        let password = "pencil";
        let salt = b"salty!!".to_vec();
        let iterations = 4096u32;

        let mut client =
            ScramClient::new(password, &mechanisms(false, true), ChannelBindingPolicy::Preferred, None)
                .unwrap();
        let client_nonce = client.client_nonce.clone();
        let server_nonce = format!("{client_nonce}-server");
        let server_first = format!(
            "r={},s={},i={}",
            server_nonce,
            BASE64.encode(&salt),
            iterations
        );

        let client_final = client.process_server_first(server_first.as_bytes()).unwrap();
        let client_final = String::from_utf8(client_final).unwrap();

        let mut salted_password = [0u8; 32];
        pbkdf2::pbkdf2::<HmacSha256>(password.as_bytes(), &salt, iterations, &mut salted_password).unwrap();
        let client_first_bare = format!("n=,r={client_nonce}");
        let client_final_without_proof = client_final.rsplit_once(",p=").unwrap().0;
        let auth_message =
            format!("{client_first_bare},{server_first},{client_final_without_proof}");
        let server_key = hmac_sha256(&salted_password, b"Server Key").unwrap();
        let server_signature = hmac_sha256(&server_key, auth_message.as_bytes()).unwrap();
        let server_final = format!("v={}", BASE64.encode(server_signature));

        client.verify_server_final(server_final.as_bytes()).unwrap();
    }
}
