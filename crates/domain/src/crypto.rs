//! 消息内容静态存储混淆
//!
//! 可逆变换，不是针对持钥组件的完整性保证。落库格式为
//! `ENC:` 前缀 + base64(JSON 信封 {v, iv, ct})，ct 尾部带 AEAD 标签。
//! 未配置密钥时内容原样透传。

use data_encoding::BASE64;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::{DomainError, DomainResult};

const ENVELOPE_PREFIX: &str = "ENC:";
const ENVELOPE_VERSION: u8 = 1;

/// 落库信封
#[derive(Serialize, Deserialize)]
struct Envelope {
    v: u8,
    iv: String,
    ct: String,
}

/// 内容混淆器
///
/// 密钥缺失或非法时退化为透传，与上游档案子系统共享同一份密钥配置。
#[derive(Clone)]
pub struct ContentCipher {
    key: Option<Arc<LessSafeKey>>,
    rng: SystemRandom,
}

impl ContentCipher {
    /// 从 base64 编码的 32 字节密钥创建混淆器
    pub fn new(key_b64: Option<&str>) -> Self {
        let key = key_b64
            .and_then(|encoded| BASE64.decode(encoded.as_bytes()).ok())
            .filter(|bytes| bytes.len() == AES_256_GCM.key_len())
            .and_then(|bytes| UnboundKey::new(&AES_256_GCM, &bytes).ok())
            .map(|unbound| Arc::new(LessSafeKey::new(unbound)));

        Self {
            key,
            rng: SystemRandom::new(),
        }
    }

    /// 未配置密钥的透传混淆器
    pub fn passthrough() -> Self {
        Self::new(None)
    }

    /// 是否实际启用了混淆
    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    /// 混淆明文用于落库
    pub fn encrypt(&self, plain: &str) -> DomainResult<String> {
        let key = match &self.key {
            Some(key) => key,
            None => return Ok(plain.to_string()),
        };

        let mut iv = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut iv)
            .map_err(|_| DomainError::crypto_error("nonce generation failed"))?;

        let nonce = Nonce::assume_unique_for_key(iv);
        let mut buffer = plain.as_bytes().to_vec();
        key.seal_in_place_append_tag(nonce, Aad::empty(), &mut buffer)
            .map_err(|_| DomainError::crypto_error("seal failed"))?;

        let envelope = Envelope {
            v: ENVELOPE_VERSION,
            iv: BASE64.encode(&iv),
            ct: BASE64.encode(&buffer),
        };
        let json = serde_json::to_vec(&envelope)
            .map_err(|err| DomainError::crypto_error(err.to_string()))?;

        Ok(format!("{}{}", ENVELOPE_PREFIX, BASE64.encode(&json)))
    }

    /// 还原落库内容
    ///
    /// 无密钥、非信封格式或还原失败时原样返回输入，
    /// 历史明文数据因此仍可读取。
    pub fn decrypt(&self, stored: &str) -> String {
        let key = match &self.key {
            Some(key) => key,
            None => return stored.to_string(),
        };

        let encoded = match stored.strip_prefix(ENVELOPE_PREFIX) {
            Some(encoded) => encoded,
            None => return stored.to_string(),
        };

        let opened = || -> Option<String> {
            let json = BASE64.decode(encoded.as_bytes()).ok()?;
            let envelope: Envelope = serde_json::from_slice(&json).ok()?;
            if envelope.v != ENVELOPE_VERSION {
                return None;
            }

            let iv = BASE64.decode(envelope.iv.as_bytes()).ok()?;
            let iv: [u8; NONCE_LEN] = iv.try_into().ok()?;
            let mut buffer = BASE64.decode(envelope.ct.as_bytes()).ok()?;

            let nonce = Nonce::assume_unique_for_key(iv);
            let plain = key
                .open_in_place(nonce, Aad::empty(), &mut buffer)
                .ok()?;
            String::from_utf8(plain.to_vec()).ok()
        };

        opened().unwrap_or_else(|| stored.to_string())
    }
}
