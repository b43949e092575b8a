//! ポータルが発行するセッショントークン（JWT 形式）のクレーム取り出し
//!
//! 検証鍵が設定されていない場合、ペイロードは署名を検証せずに読み取る。
//! その結果は「ヒント」としてのみ扱い、認可判断には使わないこと。

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::errors::AppError;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    #[serde(default, deserialize_with = "id_claim", skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, deserialize_with = "id_claim", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// 取り出したクレームと、署名検証済みかどうか
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedToken {
    pub claims: TokenClaims,
    pub verified: bool,
}

/// 署名検証に使う鍵と検証条件
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// RS256 の公開鍵（PEM）で検証する
    pub fn rsa_pem(pem: &str) -> Result<Self, AppError> {
        let key = DecodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| AppError::Configuration(format!("invalid token public key: {}", e)))?;
        Ok(Self::with_key(key, Algorithm::RS256))
    }

    /// HS256 の共有鍵で検証する
    pub fn hmac_secret(secret: &[u8]) -> Self {
        Self::with_key(DecodingKey::from_secret(secret), Algorithm::HS256)
    }

    fn with_key(key: DecodingKey, algorithm: Algorithm) -> Self {
        let mut validation = Validation::new(algorithm);
        // ポータルのトークンは exp 以外の登録クレームを持たない
        validation.required_spec_claims.clear();
        Self { key, validation }
    }
}

/// トークンの中央セグメントからクレームを取り出す
pub fn decode_token_claims(
    token: &str,
    verifier: Option<&TokenVerifier>,
) -> Result<DecodedToken, AppError> {
    if let Some(verifier) = verifier {
        let data = jsonwebtoken::decode::<TokenClaims>(token, &verifier.key, &verifier.validation)
            .map_err(|e| AppError::InvalidJwt(e.to_string()))?;
        return Ok(DecodedToken {
            claims: data.claims,
            verified: true,
        });
    }

    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(AppError::InvalidJwt(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }

    let payload = decode_segment(segments[1])?;
    let claims: TokenClaims = serde_json::from_slice(&payload)
        .map_err(|e| AppError::InvalidJwt(format!("payload is not a JSON object: {}", e)))?;

    warn!("Session token claims read without signature verification");
    Ok(DecodedToken {
        claims,
        verified: false,
    })
}

/// base64url（パディング省略可）、だめなら標準アルファベットで復号
fn decode_segment(segment: &str) -> Result<Vec<u8>, AppError> {
    let mut padded = segment.trim_end_matches('=').to_string();
    padded.push_str(&"=".repeat((4 - padded.len() % 4) % 4));

    URL_SAFE
        .decode(&padded)
        .or_else(|_| STANDARD.decode(&padded))
        .map_err(|e| AppError::InvalidJwt(format!("payload is not base64: {}", e)))
}

fn id_claim<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(id)) if !id.is_empty() => Some(id),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;

    fn unsigned_token(payload: &Value) -> String {
        format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(payload.to_string()),
            "forged-signature"
        )
    }

    #[test]
    fn reads_numeric_and_string_ids() {
        let token = unsigned_token(&json!({ "tenantId": 42, "userId": "u-7", "role": "admin" }));
        let decoded = decode_token_claims(&token, None).unwrap();

        assert!(!decoded.verified);
        assert_eq!(decoded.claims.tenant_id.as_deref(), Some("42"));
        assert_eq!(decoded.claims.user_id.as_deref(), Some("u-7"));
        assert_eq!(decoded.claims.extra["role"], json!("admin"));
    }

    #[test]
    fn unverified_decode_trusts_a_forged_signature() {
        // 既知の弱点: 検証鍵が無ければ改ざんされたトークンも読めてしまう
        let token = unsigned_token(&json!({ "tenantId": "someone-else" }));
        let decoded = decode_token_claims(&token, None).unwrap();
        assert_eq!(decoded.claims.tenant_id.as_deref(), Some("someone-else"));
        assert!(!decoded.verified);
    }

    #[test]
    fn padding_in_payload_is_tolerated() {
        let payload = URL_SAFE.encode(json!({ "userId": 1 }).to_string());
        let token = format!("h.{}.s", payload);
        let decoded = decode_token_claims(&token, None).unwrap();
        assert_eq!(decoded.claims.user_id.as_deref(), Some("1"));
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert!(matches!(
            decode_token_claims("only.two", None),
            Err(AppError::InvalidJwt(_))
        ));
        assert!(matches!(
            decode_token_claims("a.!!!.c", None),
            Err(AppError::InvalidJwt(_))
        ));
        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode("plain text"));
        assert!(matches!(
            decode_token_claims(&not_json, None),
            Err(AppError::InvalidJwt(_))
        ));
    }

    #[test]
    fn verifier_accepts_signed_and_rejects_forged_tokens() {
        let claims = TokenClaims {
            tenant_id: Some("42".into()),
            user_id: Some("u-1".into()),
            ..Default::default()
        };
        let signed = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"portal-secret"),
        )
        .unwrap();

        let verifier = TokenVerifier::hmac_secret(b"portal-secret");
        let decoded = decode_token_claims(&signed, Some(&verifier)).unwrap();
        assert!(decoded.verified);
        assert_eq!(decoded.claims.tenant_id.as_deref(), Some("42"));

        let forged = unsigned_token(&json!({ "tenantId": "42" }));
        assert!(matches!(
            decode_token_claims(&forged, Some(&verifier)),
            Err(AppError::InvalidJwt(_))
        ));

        let other = TokenVerifier::hmac_secret(b"another-secret");
        assert!(decode_token_claims(&signed, Some(&other)).is_err());
    }

    const SIGNING_KEY: &str = include_str!("../tests/fixtures/token_signing_key.pem");
    const PUBLIC_KEY: &str = include_str!("../tests/fixtures/token_signing_key.pub.pem");

    #[test]
    fn rs256_public_key_verifies_portal_tokens() {
        let claims = TokenClaims {
            tenant_id: Some("1001".into()),
            user_id: Some("u-42".into()),
            ..Default::default()
        };
        let signed = jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &EncodingKey::from_rsa_pem(SIGNING_KEY.as_bytes()).unwrap(),
        )
        .unwrap();

        let verifier = TokenVerifier::rsa_pem(PUBLIC_KEY).unwrap();
        let decoded = decode_token_claims(&signed, Some(&verifier)).unwrap();
        assert!(decoded.verified);
        assert_eq!(decoded.claims.tenant_id.as_deref(), Some("1001"));
        assert_eq!(decoded.claims.user_id.as_deref(), Some("u-42"));

        // 署名部だけ差し替えたトークン
        let (head, _) = signed.rsplit_once('.').unwrap();
        let tampered = format!("{}.{}", head, URL_SAFE_NO_PAD.encode(b"not-a-signature"));
        assert!(matches!(
            decode_token_claims(&tampered, Some(&verifier)),
            Err(AppError::InvalidJwt(_))
        ));

        // HS256 で作られたトークンは RS256 の検証器では通らない
        let hmac = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"portal-secret"),
        )
        .unwrap();
        assert!(decode_token_claims(&hmac, Some(&verifier)).is_err());
    }

    #[test]
    fn invalid_public_key_is_a_configuration_error() {
        assert!(matches!(
            TokenVerifier::rsa_pem("not a pem"),
            Err(AppError::Configuration(_))
        ));
    }
}
