//! Credential checks for exposed API endpoints
//!
//! Supports address white/black lists plus HTTP Basic and Digest (RFC 2617,
//! MD5, qop=auth) authentication against a configured user list. Every
//! failure path answers `false`; malformed credentials are never an error.

use std::collections::{HashMap, HashSet};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use cascata_common::{ITEM_SEPARATOR, LIST_SEPARATOR, md5_hex};
use rand::Rng;
use rand::distr::Alphanumeric;
use tracing::debug;

const PREFIX_BASIC: &str = "Basic ";

/// Supported authentication methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Basic,
    Digest,
}

impl std::str::FromStr for AuthMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" | "basic authentication" => Ok(AuthMethod::Basic),
            "digest" | "digest authentication" => Ok(AuthMethod::Digest),
            other => Err(format!("Invalid authentication method: {}", other)),
        }
    }
}

/// Raw configuration of an [`AuthenticationService`]
#[derive(Debug, Clone, Default)]
pub struct AuthenticationConfig {
    /// Comma-separated white list of addresses; only one of white/black list
    /// should be configured
    pub white_list: Option<String>,
    /// Comma-separated black list of addresses
    pub black_list: Option<String>,
    /// Authentication method; absent means credentials are not checked
    pub method: Option<AuthMethod>,
    /// Comma-separated `name:password` pairs, e.g. `"user1:pwd1,user2:pwd2"`
    pub authorized_users: Option<String>,
    /// Authentication domain used by Digest
    pub realm: Option<String>,
    /// Server nonce used by Digest
    pub nonce: Option<String>,
}

/// Address filtering plus Basic/Digest credential checks
pub struct AuthenticationService {
    white_list: Option<HashSet<String>>,
    black_list: Option<HashSet<String>>,
    method: Option<AuthMethod>,
    // name -> password
    authorized_users: HashMap<String, String>,
    realm: String,
    nonce: String,
}

impl AuthenticationService {
    pub fn new(config: AuthenticationConfig) -> Self {
        Self {
            white_list: parse_address_list(config.white_list.as_deref()),
            black_list: parse_address_list(config.black_list.as_deref()),
            method: config.method,
            authorized_users: parse_user_list(config.authorized_users.as_deref()),
            realm: config.realm.unwrap_or_default(),
            nonce: config.nonce.unwrap_or_default(),
        }
    }

    /// Whether a client address passes the configured lists
    ///
    /// A black-listed address fails; when a white list is configured, only
    /// addresses on it pass.
    pub fn authenticate_address(&self, address: &str) -> bool {
        if let Some(black_list) = &self.black_list
            && black_list.contains(address)
        {
            return false;
        }
        if let Some(white_list) = &self.white_list
            && !white_list.contains(address)
        {
            return false;
        }
        true
    }

    /// Whether credentials must be checked at all
    pub fn should_authenticate(&self) -> bool {
        self.method.is_some()
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// Check an `Authorization` header value against the configured users
    pub fn authenticate(&self, http_method: &str, authorization: &str) -> bool {
        if authorization.is_empty() {
            return false;
        }
        match self.method {
            Some(AuthMethod::Basic) => self.authenticate_basic(authorization),
            Some(AuthMethod::Digest) => self.authenticate_digest(http_method, authorization),
            None => true,
        }
    }

    fn authenticate_basic(&self, authorization: &str) -> bool {
        let mut credentials = authorization.trim();
        if let Some(prefix) = credentials.get(..PREFIX_BASIC.len())
            && prefix.eq_ignore_ascii_case(PREFIX_BASIC)
        {
            credentials = credentials[PREFIX_BASIC.len()..].trim();
        }

        let Ok(decoded) = BASE64.decode(credentials) else {
            debug!("basic credentials are not valid base64");
            return false;
        };
        let Ok(info) = String::from_utf8(decoded) else {
            return false;
        };

        let mut items = info.splitn(2, ITEM_SEPARATOR);
        let name = items.next().unwrap_or("").trim();
        let password = items.next().unwrap_or("").trim();

        self.authorized_users.get(name).map(String::as_str) == Some(password)
    }

    fn authenticate_digest(&self, http_method: &str, authorization: &str) -> bool {
        let Some(username) = digest_parameter(authorization, "username") else {
            return false;
        };
        let required = ["realm", "nonce", "uri", "qop", "nc", "cnonce", "response"];
        let mut values = HashMap::new();
        for name in required {
            match digest_parameter(authorization, name) {
                Some(value) => {
                    values.insert(name, value);
                }
                None => return false,
            }
        }

        let Some(password) = self.authorized_users.get(&username) else {
            return false;
        };

        // HA1/HA2 use the SERVICE's configured realm and nonce; the client
        // copies them from the challenge
        let ha1 = md5_hex(&format!("{}:{}:{}", username, self.realm, password));
        let ha2 = md5_hex(&format!("{}:{}", http_method, values["uri"]));
        let expected = md5_hex(&format!(
            "{}:{}:{}:{}:{}:{}",
            ha1, self.nonce, values["nc"], values["cnonce"], values["qop"], ha2
        ));

        expected.eq_ignore_ascii_case(&values["response"])
    }
}

/// Random server nonce for a Digest challenge
pub fn random_nonce() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

fn parse_address_list(value: Option<&str>) -> Option<HashSet<String>> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    Some(
        value
            .split(LIST_SEPARATOR)
            .map(|address| address.trim().to_string())
            .filter(|address| !address.is_empty())
            .collect(),
    )
}

fn parse_user_list(value: Option<&str>) -> HashMap<String, String> {
    let Some(value) = value else {
        return HashMap::new();
    };
    let mut users = HashMap::new();
    for entry in value.split(LIST_SEPARATOR) {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let mut items = entry.splitn(2, ITEM_SEPARATOR);
        let name = items.next().unwrap_or("").trim();
        let password = items.next().unwrap_or("").trim();
        if !name.is_empty() {
            users.insert(name.to_string(), password.to_string());
        }
    }
    users
}

fn digest_parameter(authorization: &str, name: &str) -> Option<String> {
    let pattern = regex::Regex::new(&format!("{name}=((.+?,)|((.+?)$))")).ok()?;
    let captured = pattern.captures(authorization)?;
    let mut value = captured.get(1)?.as_str();

    value = value.strip_suffix(',').unwrap_or(value);
    value = value.strip_prefix('"').unwrap_or(value);
    value = value.strip_suffix('"').unwrap_or(value);
    if value.is_empty() {
        return None;
    }
    Some(value.to_string())
}
