use {
    crate::domain::error::PipelineError,
    hmac::{Hmac, Mac},
    sha2::Sha256,
};

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted age of a signed webhook.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Clock skew tolerated for timestamps from the future.
const MAX_FUTURE_SKEW_SECS: i64 = 60;

/// Parsed `Stripe-Signature` header: `t=<unix ts>,v1=<hex>[,v1=<hex>...]`.
#[derive(Debug)]
pub struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, PipelineError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => {
                    timestamp = Some(value.parse::<i64>().map_err(|_| {
                        PipelineError::WebhookSignature(format!("invalid timestamp: {value}"))
                    })?)
                }
                // Other schemes (v0 test signatures) are ignored.
                "v1" => {
                    if let Ok(bytes) = hex::decode(value) {
                        signatures.push(bytes);
                    }
                }
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| PipelineError::WebhookSignature("missing timestamp".into()))?;
        if signatures.is_empty() {
            return Err(PipelineError::WebhookSignature(
                "no v1 signature in header".into(),
            ));
        }

        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

/// Check `header` against HMAC-SHA256(secret, "<t>.<body>") over the raw
/// body bytes.
pub fn verify(
    header: &str,
    body: &[u8],
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), PipelineError> {
    let parsed = SignatureHeader::parse(header)?;

    let age = now - parsed.timestamp;
    if age > tolerance_secs {
        return Err(PipelineError::WebhookSignature(format!(
            "timestamp outside tolerance ({age}s old)"
        )));
    }
    if age < -MAX_FUTURE_SKEW_SECS {
        return Err(PipelineError::WebhookSignature(
            "timestamp is in the future".into(),
        ));
    }

    let prefix = format!("{}.", parsed.timestamp);
    for candidate in &parsed.signatures {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| PipelineError::WebhookSignature(e.to_string()))?;
        mac.update(prefix.as_bytes());
        mac.update(body);
        // verify_slice compares in constant time
        if mac.verify_slice(candidate).is_ok() {
            return Ok(());
        }
    }

    Err(PipelineError::WebhookSignature(
        "no signature matches the payload".into(),
    ))
}

/// Build a header value the way Stripe signs deliveries.
pub fn signature_header(body: impl AsRef<[u8]>, secret: &str, timestamp: i64) -> String {
    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key size");
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(body.as_ref());
    let signature = hex::encode(mac.finalize().into_bytes());
    format!("t={timestamp},v1={signature}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_700_000_000;

    #[test]
    fn accepts_valid_signature() {
        let body = r#"{"id":"evt_1"}"#;
        let header = signature_header(body, SECRET, NOW);
        assert!(verify(&header, body.as_bytes(), SECRET, DEFAULT_TOLERANCE_SECS, NOW).is_ok());
    }

    #[test]
    fn rejects_tampered_body() {
        let header = signature_header(r#"{"amount":1}"#, SECRET, NOW);
        let err = verify(&header, br#"{"amount":2}"#, SECRET, DEFAULT_TOLERANCE_SECS, NOW);
        assert!(matches!(err, Err(PipelineError::WebhookSignature(_))));
    }

    #[test]
    fn rejects_wrong_secret() {
        let body = "{}";
        let header = signature_header(body, "whsec_other", NOW);
        assert!(verify(&header, body.as_bytes(), SECRET, DEFAULT_TOLERANCE_SECS, NOW).is_err());
    }

    #[test]
    fn rejects_stale_and_future_timestamps() {
        let body = "{}";
        let old = signature_header(body, SECRET, NOW - DEFAULT_TOLERANCE_SECS - 1);
        assert!(verify(&old, body.as_bytes(), SECRET, DEFAULT_TOLERANCE_SECS, NOW).is_err());

        let future = signature_header(body, SECRET, NOW + 120);
        assert!(verify(&future, body.as_bytes(), SECRET, DEFAULT_TOLERANCE_SECS, NOW).is_err());
    }

    #[test]
    fn any_v1_signature_may_match() {
        let body = "{}";
        let good = signature_header(body, SECRET, NOW);
        let good_sig = good.split_once(",v1=").unwrap().1;
        let header = format!("t={NOW},v1={},v1={good_sig}", "00".repeat(32));
        assert!(verify(&header, body.as_bytes(), SECRET, DEFAULT_TOLERANCE_SECS, NOW).is_ok());
    }

    #[test]
    fn verifies_bytes_that_are_not_utf8() {
        let body: &[u8] = &[0xff, 0xfe, 0x00, b'{'];
        let header = signature_header(body, SECRET, NOW);
        assert!(verify(&header, body, SECRET, DEFAULT_TOLERANCE_SECS, NOW).is_ok());
        assert!(verify(&header, &body[..3], SECRET, DEFAULT_TOLERANCE_SECS, NOW).is_err());
    }

    #[test]
    fn rejects_malformed_headers() {
        for header in ["", "garbage", "t=abc,v1=00", "v1=00", "t=1700000000"] {
            assert!(
                SignatureHeader::parse(header).is_err(),
                "header should be rejected: {header:?}"
            );
        }
    }
}
