//! ログインパスワードの暗号化
//!
//! ポータルの公開鍵で RSA（PKCS#1 v1.5）暗号化し base64 で送る。鍵が無い・壊れている場合は
//! 平文の base64 に落とす。これは可用性のための退避であり、秘匿にはならない。

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use shared::AppError;
use tracing::{debug, warn};

/// `identifiers.rsaType` に送る暗号化方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMode {
    PlainBase64 = 0,
    Rsa = 1,
}

impl EncryptionMode {
    pub fn rsa_type(self) -> &'static str {
        match self {
            EncryptionMode::PlainBase64 => "0",
            EncryptionMode::Rsa => "1",
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct EncodedPassword {
    pub mode: EncryptionMode,
    pub value: String,
}

// 値は出力しない
impl std::fmt::Debug for EncodedPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedPassword")
            .field("mode", &self.mode)
            .field("len", &self.value.len())
            .finish()
    }
}

/// 公開鍵があれば RSA、無ければ（または失敗すれば）平文 base64
pub fn encode_password(password: &str, public_key: &str) -> EncodedPassword {
    if public_key.trim().is_empty() {
        debug!("No public key available, sending base64 password");
        return plain(password);
    }

    match encrypt_with_key(password, public_key) {
        Ok(value) => {
            debug!(len = value.len(), "Password encrypted with portal public key");
            EncodedPassword {
                mode: EncryptionMode::Rsa,
                value,
            }
        }
        Err(e) => {
            warn!(error = %e, "RSA encryption failed, falling back to base64 password");
            plain(password)
        }
    }
}

fn plain(password: &str) -> EncodedPassword {
    EncodedPassword {
        mode: EncryptionMode::PlainBase64,
        value: STANDARD.encode(password.as_bytes()),
    }
}

pub fn encrypt_with_key(password: &str, public_key: &str) -> Result<String, AppError> {
    let key = parse_public_key(public_key)?;
    let mut rng = rand::thread_rng();
    let encrypted = key
        .encrypt(&mut rng, Pkcs1v15Encrypt, password.as_bytes())
        .map_err(|e| AppError::Encryption(format!("RSA encryption failed: {}", e)))?;
    Ok(STANDARD.encode(encrypted))
}

/// PEM（SPKI / PKCS#1）もしくはヘッダー無しの base64 SPKI 本体を受け付ける
pub fn parse_public_key(public_key: &str) -> Result<RsaPublicKey, AppError> {
    let text = public_key.trim();
    let pkcs1_label = text.contains("BEGIN RSA PUBLIC KEY");

    let body: String = text
        .lines()
        .filter(|line| !line.trim_start().starts_with("-----"))
        .flat_map(|line| line.chars())
        .filter(|c| !c.is_whitespace())
        .collect();

    let der = STANDARD
        .decode(body.as_bytes())
        .map_err(|e| AppError::Encryption(format!("public key is not base64: {}", e)))?;

    let parsed = if pkcs1_label {
        RsaPublicKey::from_pkcs1_der(&der).map_err(|e| e.to_string())
    } else {
        RsaPublicKey::from_public_key_der(&der)
            .map_err(|e| e.to_string())
            .or_else(|_| RsaPublicKey::from_pkcs1_der(&der).map_err(|e| e.to_string()))
    };

    parsed.map_err(|e| AppError::Encryption(format!("invalid RSA public key: {}", e)))
}
