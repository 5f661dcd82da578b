//! Bearer tokens.
//!
//! A token reads `sf_v1_<uuid>.<secret>`: the uuid locates the stored row, and only a SHA-256
//! verifier of the secret is ever persisted.

use std::{fmt, str::FromStr};

use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;
use zeroize::{Zeroize, Zeroizing};

const PREFIX: &str = "sf";
const SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiTokenVersion {
    V1,
}

impl ApiTokenVersion {
    /// Column value stored alongside the verifier.
    #[must_use]
    pub const fn as_i16(self) -> i16 {
        match self {
            Self::V1 => 1,
        }
    }

    const fn tag(self) -> &'static str {
        match self {
            Self::V1 => "v1",
        }
    }

    fn from_tag(tag: &str) -> Result<Self, ApiTokenError> {
        match tag {
            "v1" => Ok(Self::V1),
            _ => Err(ApiTokenError::UnsupportedVersion),
        }
    }
}

impl TryFrom<i16> for ApiTokenVersion {
    type Error = ApiTokenError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::V1),
            _ => Err(ApiTokenError::UnsupportedVersion),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiTokenError {
    #[error("api token format is invalid")]
    InvalidFormat,

    #[error("api token uses an unsupported version")]
    UnsupportedVersion,

    #[error("api token secret encoding is invalid")]
    InvalidSecretEncoding,
}

/// A bearer token held in memory. The secret is wiped on drop and never printed by `Debug`.
#[derive(Clone)]
pub struct ApiToken {
    uuid: Uuid,
    version: ApiTokenVersion,
    secret: Zeroizing<[u8; SECRET_LEN]>,
}

impl ApiToken {
    /// Mint a fresh token with a random secret.
    #[must_use]
    pub fn generate() -> Self {
        let mut secret = Zeroizing::new([0_u8; SECRET_LEN]);

        OsRng.fill_bytes(secret.as_mut_slice());

        Self {
            uuid: Uuid::now_v7(),
            version: ApiTokenVersion::V1,
            secret,
        }
    }

    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    #[must_use]
    pub const fn version(&self) -> ApiTokenVersion {
        self.version
    }

    /// Hex SHA-256 over `{uuid}:{version}:{secret}`, the only form that reaches storage.
    #[must_use]
    pub fn verifier(&self) -> String {
        let mut hasher = Sha256::new();

        hasher.update(self.uuid.simple().to_string());
        hasher.update(format!(":{}:", self.version.as_i16()));

        let mut secret_hex = hex_lower(self.secret.as_slice());

        hasher.update(&secret_hex);
        secret_hex.zeroize();

        format!("{:x}", hasher.finalize())
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiToken")
            .field("uuid", &self.uuid)
            .field("version", &self.version)
            .field("secret", &"**redacted**")
            .finish()
    }
}

impl fmt::Display for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{PREFIX}_{}_{}.{}",
            self.version.tag(),
            self.uuid.simple(),
            hex_lower(self.secret.as_slice())
        )
    }
}

impl FromStr for ApiToken {
    type Err = ApiTokenError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let (head, secret_hex) = token.split_once('.').ok_or(ApiTokenError::InvalidFormat)?;

        let Some((PREFIX, rest)) = head.split_once('_') else {
            return Err(ApiTokenError::InvalidFormat);
        };

        let (tag, uuid) = rest.split_once('_').ok_or(ApiTokenError::InvalidFormat)?;

        let version = ApiTokenVersion::from_tag(tag)?;
        let uuid = Uuid::try_parse(uuid).map_err(|_source| ApiTokenError::InvalidFormat)?;

        Ok(Self {
            uuid,
            version,
            secret: unhex_secret(secret_hex).ok_or(ApiTokenError::InvalidSecretEncoding)?,
        })
    }
}

fn hex_lower(bytes: &[u8]) -> String {
    bytes
        .iter()
        .flat_map(|byte| [byte >> 4, byte & 0x0f])
        .filter_map(|nibble| char::from_digit(u32::from(nibble), 16))
        .collect()
}

fn unhex_secret(encoded: &str) -> Option<Zeroizing<[u8; SECRET_LEN]>> {
    if encoded.len() != SECRET_LEN * 2 || !encoded.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    let mut secret = Zeroizing::new([0_u8; SECRET_LEN]);

    for (index, byte) in secret.iter_mut().enumerate() {
        let pair = encoded.get(index * 2..index * 2 + 2)?;

        *byte = u8::from_str_radix(pair, 16).ok()?;
    }

    Some(secret)
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn fixed(fill: u8) -> ApiToken {
        ApiToken {
            uuid: Uuid::nil(),
            version: ApiTokenVersion::V1,
            secret: Zeroizing::new([fill; SECRET_LEN]),
        }
    }

    #[test]
    fn rendered_token_parses_back() -> TestResult {
        let token = ApiToken::generate();
        let rendered = token.to_string();

        assert!(rendered.starts_with("sf_v1_"), "token was {rendered}");

        let parsed: ApiToken = rendered.parse()?;

        assert_eq!(parsed.uuid(), token.uuid(), "uuid survives a round trip");
        assert_eq!(parsed.verifier(), token.verifier(), "secret survives a round trip");

        Ok(())
    }

    #[test]
    fn foreign_prefix_is_rejected() {
        let result = "lt_v1_00000000000000000000000000000000.aa".parse::<ApiToken>();

        assert!(
            matches!(result, Err(ApiTokenError::InvalidFormat)),
            "expected InvalidFormat, got {result:?}"
        );
    }

    #[test]
    fn unknown_version_is_rejected() {
        let token = fixed(0xAB).to_string().replacen("_v1_", "_v9_", 1);

        assert!(
            matches!(
                token.parse::<ApiToken>(),
                Err(ApiTokenError::UnsupportedVersion)
            ),
            "v9 should not parse"
        );
    }

    #[test]
    fn short_or_non_hex_secret_is_rejected() {
        let short = "sf_v1_00000000000000000000000000000000.abcd".parse::<ApiToken>();
        let garbage = format!("sf_v1_{}.{}", Uuid::nil().simple(), "zz".repeat(SECRET_LEN))
            .parse::<ApiToken>();

        assert!(
            matches!(short, Err(ApiTokenError::InvalidSecretEncoding)),
            "short secret should not parse"
        );
        assert!(
            matches!(garbage, Err(ApiTokenError::InvalidSecretEncoding)),
            "non-hex secret should not parse"
        );
    }

    #[test]
    fn verifier_is_stable_and_secret_dependent() {
        assert_eq!(
            fixed(0xCD).verifier(),
            fixed(0xCD).verifier(),
            "verifier must be deterministic"
        );
        assert_eq!(fixed(0xCD).verifier().len(), 64, "sha-256 hex is 64 characters");
        assert_ne!(
            fixed(0x01).verifier(),
            fixed(0x02).verifier(),
            "different secrets must hash differently"
        );
    }

    #[test]
    fn debug_output_hides_the_secret() {
        let rendered = format!("{:?}", fixed(0xAB));

        assert!(!rendered.contains("abab"), "secret leaked: {rendered}");
        assert!(rendered.contains("redacted"), "debug was {rendered}");
    }
}
