use aes::{Aes128, Aes192, Aes256};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{aead::consts::U12, Aes128Gcm, Aes256Gcm, AesGcm, Nonce};
use base64::Engine as _;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use deno_core::{anyhow::anyhow, anyhow::Error as AnyError, op, OpState};
use hmac::{Hmac, Mac};
use md5::Md5;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

type Aes192Gcm = AesGcm<Aes192, U12>;

fn pbkdf2_dispatch(
    algorithm: &str,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    out: &mut [u8],
) -> Result<(), AnyError> {
    match algorithm {
        "sha1" => pbkdf2_hmac::<Sha1>(password, salt, iterations, out),
        "sha256" => pbkdf2_hmac::<Sha256>(password, salt, iterations, out),
        "sha512" => pbkdf2_hmac::<Sha512>(password, salt, iterations, out),
        other => return Err(anyhow!("unsupported pbkdf2 digest: {other}")),
    }
    Ok(())
}

fn digest_bytes(algorithm: &str, data: &[u8]) -> Result<Vec<u8>, AnyError> {
    Ok(match algorithm {
        "md5" => Md5::digest(data).to_vec(),
        "sha1" => Sha1::digest(data).to_vec(),
        "sha256" => Sha256::digest(data).to_vec(),
        "sha512" => Sha512::digest(data).to_vec(),
        other => return Err(anyhow!("unsupported digest algorithm: {other}")),
    })
}

/// `digest(algorithm, data_base64) -> base64` (§4.5 `crypto.digest`).
#[op]
pub fn op_crypto_digest(_state: &mut OpState, algorithm: String, data_base64: String) -> Result<String, AnyError> {
    let data = base64::engine::general_purpose::STANDARD.decode(&data_base64)?;
    let digest = digest_bytes(&algorithm, &data)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(digest))
}

/// `hmac(algorithm, key_base64, data_base64) -> base64` (§4.5 `crypto.hmac`).
#[op]
pub fn op_crypto_hmac(
    _state: &mut OpState,
    algorithm: String,
    key_base64: String,
    data_base64: String,
) -> Result<String, AnyError> {
    let key = base64::engine::general_purpose::STANDARD.decode(&key_base64)?;
    let data = base64::engine::general_purpose::STANDARD.decode(&data_base64)?;
    let tag = match algorithm.as_str() {
        "sha256" => {
            let mut mac = Hmac::<Sha256>::new_from_slice(&key)?;
            mac.update(&data);
            mac.finalize().into_bytes().to_vec()
        }
        "sha512" => {
            let mut mac = Hmac::<Sha512>::new_from_slice(&key)?;
            mac.update(&data);
            mac.finalize().into_bytes().to_vec()
        }
        other => return Err(anyhow!("unsupported hmac algorithm: {other}")),
    };
    Ok(base64::engine::general_purpose::STANDARD.encode(tag))
}

/// `randomBytes(n) -> base64` (§4.5 `crypto.randomBytes`). Bounded to keep a
/// single call from being used to exhaust the invocation's memory budget.
#[op]
pub fn op_crypto_random_bytes(_state: &mut OpState, len: u32) -> Result<String, AnyError> {
    if len > 1024 * 1024 {
        return Err(anyhow!("randomBytes length exceeds 1 MiB limit"));
    }
    let mut buf = vec![0u8; len as usize];
    rand::thread_rng().fill_bytes(&mut buf);
    Ok(base64::engine::general_purpose::STANDARD.encode(buf))
}

/// `pbkdf2(password, salt_base64, iterations, key_len, digest) -> base64`.
#[op]
pub fn op_crypto_pbkdf2(
    _state: &mut OpState,
    password: String,
    salt_base64: String,
    iterations: u32,
    key_len: u32,
    digest: String,
) -> Result<String, AnyError> {
    if key_len > 4096 {
        return Err(anyhow!("pbkdf2 key length exceeds 4096 byte limit"));
    }
    let salt = base64::engine::general_purpose::STANDARD.decode(&salt_base64)?;
    let mut out = vec![0u8; key_len as usize];
    pbkdf2_dispatch(&digest, password.as_bytes(), &salt, iterations, &mut out)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(out))
}

/// `scrypt(password, salt_base64, key_len, log_n, r, p) -> base64` (§4.5 `crypto.scryptSync`).
#[op]
pub fn op_crypto_scrypt(
    _state: &mut OpState,
    password: String,
    salt_base64: String,
    key_len: u32,
    log_n: u8,
    r: u32,
    p: u32,
) -> Result<String, AnyError> {
    if key_len > 4096 {
        return Err(anyhow!("scrypt key length exceeds 4096 byte limit"));
    }
    let salt = base64::engine::general_purpose::STANDARD.decode(&salt_base64)?;
    let params = scrypt::Params::new(log_n, r, p, key_len as usize)
        .map_err(|e| anyhow!("invalid scrypt params: {e}"))?;
    let mut out = vec![0u8; key_len as usize];
    scrypt::scrypt(password.as_bytes(), &salt, &params, &mut out)
        .map_err(|e| anyhow!("scrypt derivation failed: {e}"))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(out))
}

const GCM_NONCE_LEN: usize = 12;

fn aes_gcm_encrypt(key: &[u8], nonce_bytes: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, AnyError> {
    if nonce_bytes.len() != GCM_NONCE_LEN {
        return Err(anyhow!("AES-GCM nonce must be {GCM_NONCE_LEN} bytes, got {}", nonce_bytes.len()));
    }
    let nonce = Nonce::from_slice(nonce_bytes);
    match key.len() {
        16 => Aes128Gcm::new_from_slice(key)
            .map_err(|e| anyhow!("invalid AES-128 key: {e}"))?
            .encrypt(nonce, Payload { msg: plaintext, aad: &[] })
            .map_err(|_| anyhow!("aes-gcm encryption failed")),
        24 => Aes192Gcm::new_from_slice(key)
            .map_err(|e| anyhow!("invalid AES-192 key: {e}"))?
            .encrypt(nonce, Payload { msg: plaintext, aad: &[] })
            .map_err(|_| anyhow!("aes-gcm encryption failed")),
        32 => Aes256Gcm::new_from_slice(key)
            .map_err(|e| anyhow!("invalid AES-256 key: {e}"))?
            .encrypt(nonce, Payload { msg: plaintext, aad: &[] })
            .map_err(|_| anyhow!("aes-gcm encryption failed")),
        other => Err(anyhow!("unsupported AES-GCM key length: {other} bytes")),
    }
}

/// Any GCM decrypt failure (bad key, wrong nonce, or tag mismatch) comes back
/// from `aead` as a single opaque error; all of them surface to JS as
/// `FaasError::AuthFailed` since the caller can't distinguish further either.
fn aes_gcm_decrypt(key: &[u8], nonce_bytes: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, AnyError> {
    if nonce_bytes.len() != GCM_NONCE_LEN {
        return Err(anyhow!("AES-GCM nonce must be {GCM_NONCE_LEN} bytes, got {}", nonce_bytes.len()));
    }
    let nonce = Nonce::from_slice(nonce_bytes);
    let result = match key.len() {
        16 => Aes128Gcm::new_from_slice(key)
            .map_err(|e| anyhow!("invalid AES-128 key: {e}"))?
            .decrypt(nonce, Payload { msg: ciphertext, aad: &[] }),
        24 => Aes192Gcm::new_from_slice(key)
            .map_err(|e| anyhow!("invalid AES-192 key: {e}"))?
            .decrypt(nonce, Payload { msg: ciphertext, aad: &[] }),
        32 => Aes256Gcm::new_from_slice(key)
            .map_err(|e| anyhow!("invalid AES-256 key: {e}"))?
            .decrypt(nonce, Payload { msg: ciphertext, aad: &[] }),
        other => return Err(anyhow!("unsupported AES-GCM key length: {other} bytes")),
    };
    result.map_err(|_| faas_models::FaasError::AuthFailed.into())
}

/// `aesGcmEncrypt(key_base64, nonce_base64, plaintext_base64) -> base64`
/// (AES-128/192/256-GCM; §4.5 `crypto.createCipheriv`/`createDecipheriv`).
#[op]
pub fn op_crypto_aes_gcm_encrypt(
    _state: &mut OpState,
    key_base64: String,
    nonce_base64: String,
    plaintext_base64: String,
) -> Result<String, AnyError> {
    let key = base64::engine::general_purpose::STANDARD.decode(&key_base64)?;
    let nonce_bytes = base64::engine::general_purpose::STANDARD.decode(&nonce_base64)?;
    let plaintext = base64::engine::general_purpose::STANDARD.decode(&plaintext_base64)?;
    let ciphertext = aes_gcm_encrypt(&key, &nonce_bytes, &plaintext)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(ciphertext))
}

#[op]
pub fn op_crypto_aes_gcm_decrypt(
    _state: &mut OpState,
    key_base64: String,
    nonce_base64: String,
    ciphertext_base64: String,
) -> Result<String, AnyError> {
    let key = base64::engine::general_purpose::STANDARD.decode(&key_base64)?;
    let nonce_bytes = base64::engine::general_purpose::STANDARD.decode(&nonce_base64)?;
    let ciphertext = base64::engine::general_purpose::STANDARD.decode(&ciphertext_base64)?;
    let plaintext = aes_gcm_decrypt(&key, &nonce_bytes, &ciphertext)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(plaintext))
}

fn aes_cbc_encrypt(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, AnyError> {
    macro_rules! encrypt_with {
        ($ty:ty) => {
            <cbc::Encryptor<$ty>>::new_from_slices(key, iv)
                .map_err(|e| anyhow!("invalid AES-CBC key/iv: {e}"))?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
        };
    }
    Ok(match key.len() {
        16 => encrypt_with!(Aes128),
        24 => encrypt_with!(Aes192),
        32 => encrypt_with!(Aes256),
        other => return Err(anyhow!("unsupported AES-CBC key length: {other} bytes")),
    })
}

fn aes_cbc_decrypt(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, AnyError> {
    macro_rules! decrypt_with {
        ($ty:ty) => {
            <cbc::Decryptor<$ty>>::new_from_slices(key, iv)
                .map_err(|e| anyhow!("invalid AES-CBC key/iv: {e}"))?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                .map_err(|_| anyhow!("aes-cbc padding invalid"))?
        };
    }
    Ok(match key.len() {
        16 => decrypt_with!(Aes128),
        24 => decrypt_with!(Aes192),
        32 => decrypt_with!(Aes256),
        other => return Err(anyhow!("unsupported AES-CBC key length: {other} bytes")),
    })
}

/// `aesCbcEncrypt(key_base64, iv_base64, plaintext_base64) -> base64`
/// (AES-128/192/256-CBC with PKCS7 padding; §4.5 `crypto.createCipheriv`).
#[op]
pub fn op_crypto_aes_cbc_encrypt(
    _state: &mut OpState,
    key_base64: String,
    iv_base64: String,
    plaintext_base64: String,
) -> Result<String, AnyError> {
    let key = base64::engine::general_purpose::STANDARD.decode(&key_base64)?;
    let iv = base64::engine::general_purpose::STANDARD.decode(&iv_base64)?;
    let plaintext = base64::engine::general_purpose::STANDARD.decode(&plaintext_base64)?;
    let ciphertext = aes_cbc_encrypt(&key, &iv, &plaintext)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(ciphertext))
}

#[op]
pub fn op_crypto_aes_cbc_decrypt(
    _state: &mut OpState,
    key_base64: String,
    iv_base64: String,
    ciphertext_base64: String,
) -> Result<String, AnyError> {
    let key = base64::engine::general_purpose::STANDARD.decode(&key_base64)?;
    let iv = base64::engine::general_purpose::STANDARD.decode(&iv_base64)?;
    let ciphertext = base64::engine::general_purpose::STANDARD.decode(&ciphertext_base64)?;
    let plaintext = aes_cbc_decrypt(&key, &iv, &ciphertext)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_digest_matches_known_vector() {
        let out = digest_bytes("sha256", b"abc").unwrap();
        assert_eq!(out, Sha256::digest(b"abc").to_vec());
    }

    #[test]
    fn unsupported_digest_errors() {
        assert!(digest_bytes("whirlpool", b"abc").is_err());
    }

    #[test]
    fn aes_gcm_round_trips_all_key_sizes() {
        for key_len in [16, 24, 32] {
            let key = vec![7u8; key_len];
            let nonce = [1u8; 12];
            let ciphertext = aes_gcm_encrypt(&key, &nonce, b"hello host api").unwrap();
            let plaintext = aes_gcm_decrypt(&key, &nonce, &ciphertext).unwrap();
            assert_eq!(plaintext, b"hello host api");
        }
    }

    #[test]
    fn aes_gcm_tag_mismatch_is_auth_failed() {
        let key = [7u8; 32];
        let nonce = [1u8; 12];
        let mut ciphertext = aes_gcm_encrypt(&key, &nonce, b"hello host api").unwrap();
        *ciphertext.last_mut().unwrap() ^= 0xff;
        let err = aes_gcm_decrypt(&key, &nonce, &ciphertext).unwrap_err();
        let faas_err = err.downcast::<faas_models::FaasError>().unwrap();
        assert!(matches!(faas_err, faas_models::FaasError::AuthFailed));
    }

    #[test]
    fn aes_cbc_round_trips_all_key_sizes() {
        for key_len in [16, 24, 32] {
            let key = vec![3u8; key_len];
            let iv = [9u8; 16];
            let ciphertext = aes_cbc_encrypt(&key, &iv, b"hello host api").unwrap();
            let plaintext = aes_cbc_decrypt(&key, &iv, &ciphertext).unwrap();
            assert_eq!(plaintext, b"hello host api");
        }
    }

    #[test]
    fn pbkdf2_dispatch_honors_requested_digest() {
        let mut sha256_out = [0u8; 32];
        pbkdf2_dispatch("sha256", b"password", b"salt", 4, &mut sha256_out).unwrap();
        let mut sha512_out = [0u8; 32];
        pbkdf2_dispatch("sha512", b"password", b"salt", 4, &mut sha512_out).unwrap();
        assert_ne!(sha256_out, sha512_out);
        assert!(pbkdf2_dispatch("whirlpool", b"password", b"salt", 4, &mut sha256_out).is_err());
    }
}
