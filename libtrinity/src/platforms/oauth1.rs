//! OAuth 1.0a request signing (HMAC-SHA1)

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::distributions::Alphanumeric;
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use sha1::Sha1;

use crate::error::PlatformError;

type HmacSha1 = Hmac<Sha1>;

/// RFC 3986 unreserved characters stay literal
const OAUTH_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub struct OAuth1Credentials {
    pub consumer_key: SecretString,
    pub consumer_secret: SecretString,
    pub token: SecretString,
    pub token_secret: SecretString,
}

fn encode(s: &str) -> String {
    utf8_percent_encode(s, OAUTH_ENCODE).to_string()
}

impl OAuth1Credentials {
    /// `Authorization` header value for a request
    ///
    /// `params` are the query or form-encoded body parameters; JSON bodies are
    /// not part of the signature.
    pub fn authorization(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<String, PlatformError> {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        self.authorization_with(method, url, params, &nonce, &timestamp)
    }

    fn authorization_with(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
        nonce: &str,
        timestamp: &str,
    ) -> Result<String, PlatformError> {
        let oauth_params = [
            ("oauth_consumer_key", self.consumer_key.expose_secret()),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", timestamp),
            ("oauth_token", self.token.expose_secret()),
            ("oauth_version", "1.0"),
        ];

        let signature = self.signature(method, url, params, &oauth_params)?;

        let mut header: Vec<String> = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
            .collect();
        header.push(format!("oauth_signature=\"{}\"", encode(&signature)));
        header.sort();

        Ok(format!("OAuth {}", header.join(", ")))
    }

    fn signature(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
        oauth_params: &[(&str, &str)],
    ) -> Result<String, PlatformError> {
        let mut encoded: Vec<(String, String)> = params
            .iter()
            .chain(oauth_params.iter())
            .map(|(k, v)| (encode(k), encode(v)))
            .collect();
        encoded.sort();

        let parameter_string = encoded
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let base_string = format!(
            "{}&{}&{}",
            method.to_uppercase(),
            encode(url),
            encode(&parameter_string)
        );
        let signing_key = format!(
            "{}&{}",
            encode(self.consumer_secret.expose_secret()),
            encode(self.token_secret.expose_secret())
        );

        let mut mac = HmacSha1::new_from_slice(signing_key.as_bytes())
            .map_err(|e| PlatformError::MissingCredentials(format!("unusable signing key: {}", e)))?;
        mac.update(base_string.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_credentials() -> OAuth1Credentials {
        OAuth1Credentials {
            consumer_key: SecretString::from("xvz1evFS4wEEPTGEFPHBog".to_string()),
            consumer_secret: SecretString::from(
                "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw".to_string(),
            ),
            token: SecretString::from(
                "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb".to_string(),
            ),
            token_secret: SecretString::from(
                "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE".to_string(),
            ),
        }
    }

    #[test]
    fn test_encode_unreserved() {
        assert_eq!(encode("Ladies + Gentlemen"), "Ladies%20%2B%20Gentlemen");
        assert_eq!(encode("a-b.c_d~e"), "a-b.c_d~e");
        assert_eq!(encode("!"), "%21");
    }

    #[test]
    fn test_reference_signature() {
        // Published worked example for the statuses/update endpoint
        let header = reference_credentials().authorization_with(
            "POST",
            "https://api.twitter.com/1.1/statuses/update.json",
            &[
                ("include_entities", "true"),
                ("status", "Hello Ladies + Gentlemen, a signed OAuth request!"),
            ],
            "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg",
            "1318622958",
        )
        .unwrap();

        assert!(header.starts_with("OAuth "));
        assert!(header.contains(r#"oauth_signature="hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D""#));
        assert!(header.contains(r#"oauth_consumer_key="xvz1evFS4wEEPTGEFPHBog""#));
        assert!(header.contains(r#"oauth_timestamp="1318622958""#));
    }

    #[test]
    fn test_nonce_differs_between_calls() {
        let creds = reference_credentials();
        let first = creds.authorization("POST", "https://api.twitter.com/2/tweets", &[]).unwrap();
        let second = creds
            .authorization("POST", "https://api.twitter.com/2/tweets", &[])
            .unwrap();
        assert_ne!(first, second);
        assert!(first.contains(r#"oauth_signature_method="HMAC-SHA1""#));
        assert!(first.contains(r#"oauth_version="1.0""#));
    }
}
