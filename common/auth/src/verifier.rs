use std::collections::HashMap;

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::debug;

use crate::claims::Claims;
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};

/// Decoding keys by `kid`, loaded once at start-up.
#[derive(Clone, Default)]
pub struct KeyStore {
    keys: HashMap<String, DecodingKey>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_key(&mut self, kid: impl Into<String>, key: DecodingKey) {
        self.keys.insert(kid.into(), key);
    }

    pub fn insert_rsa_pem(&mut self, kid: impl Into<String>, pem: &[u8]) -> AuthResult<()> {
        let kid = kid.into();
        let key = DecodingKey::from_rsa_pem(pem).map_err(|err| AuthError::KeyParse(kid.clone(), err.to_string()))?;
        self.insert_key(kid, key);
        Ok(())
    }

    pub fn get(&self, kid: &str) -> Option<&DecodingKey> {
        self.keys.get(kid)
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }
}

#[derive(Clone)]
pub struct JwtVerifier {
    config: JwtConfig,
    store: KeyStore,
}

impl JwtVerifier {
    pub fn new(config: JwtConfig) -> Self {
        Self { config, store: KeyStore::new() }
    }

    pub fn with_store(config: JwtConfig, store: KeyStore) -> Self {
        Self { config, store }
    }

    pub fn with_rsa_pem(mut self, kid: impl Into<String>, pem: &[u8]) -> AuthResult<Self> {
        self.store.insert_rsa_pem(kid, pem)?;
        Ok(self)
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub fn store(&self) -> &KeyStore {
        &self.store
    }

    /// RS256 only; issuer and audience must match the configured values.
    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let header = decode_header(token).map_err(|err| AuthError::InvalidHeader(err.to_string()))?;
        let kid = header.kid.ok_or(AuthError::MissingKeyId)?;
        let key = self.store.get(&kid).ok_or_else(|| AuthError::UnknownKeyId(kid.clone()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.config.issuer.clone()]);
        validation.set_audience(&[self.config.audience.clone()]);
        validation.leeway = self.config.leeway_seconds.into();

        let token_data = decode::<Value>(token, key, &validation)?;
        let claims = Claims::try_from(token_data.claims)?;
        debug!(kid, principal_id = %claims.subject, "verified JWT");
        Ok(claims)
    }
}
