// Credentials are looked up per request through `CredentialSource`, never stored
// as default headers on a shared client.

use std::{collections::HashMap, sync::RwLock};

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const XSRF_TOKEN_COOKIE: &str = "XSRF-TOKEN";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub bearer: String,
    pub xsrf_token: Option<String>,
}

impl Credentials {
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.bearer)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("bearer", &"<redacted>")
            .field("has_xsrf_token", &self.xsrf_token.is_some())
            .finish()
    }
}

/// Narrow accessor for the credential of the signed-in reader.
///
/// `None` means a guest: reading is allowed, progress is not tracked.
pub trait CredentialSource: Send + Sync {
    fn current(&self) -> Option<Credentials>;
}

/// Cookie-backed credential store.
#[derive(Debug, Default)]
pub struct CookieCredentials {
    cookies: RwLock<HashMap<String, String>>,
}

impl CookieCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `Cookie` header style string, e.g. `accessToken=abc; XSRF-TOKEN=x%3Dy`.
    pub fn from_cookie_header(header: &str) -> Self {
        let cookies = header
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                let value = urlencoding::decode(value.trim())
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| value.trim().to_string());
                Some((name.to_string(), value))
            })
            .collect();
        Self {
            cookies: RwLock::new(cookies),
        }
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut cookies) = self.cookies.write() {
            cookies.insert(name.into(), value.into());
        }
    }

    pub fn remove(&self, name: &str) {
        if let Ok(mut cookies) = self.cookies.write() {
            cookies.remove(name);
        }
    }

    fn get(&self, name: &str) -> Option<String> {
        self.cookies
            .read()
            .ok()?
            .get(name)
            .filter(|v| !v.is_empty())
            .cloned()
    }

    /// Store the tokens handed out by a login.
    pub fn sign_in(&self, access_token: &str, xsrf_token: Option<&str>) {
        self.set(ACCESS_TOKEN_COOKIE, access_token);
        match xsrf_token {
            Some(token) => self.set(XSRF_TOKEN_COOKIE, token),
            None => self.remove(XSRF_TOKEN_COOKIE),
        }
        tracing::info!(has_xsrf = xsrf_token.is_some(), "reader signed in");
    }

    pub fn sign_out(&self) {
        self.remove(ACCESS_TOKEN_COOKIE);
        self.remove(XSRF_TOKEN_COOKIE);
        tracing::info!("reader signed out");
    }
}

impl CredentialSource for CookieCredentials {
    fn current(&self) -> Option<Credentials> {
        let bearer = self.get(ACCESS_TOKEN_COOKIE)?;
        Some(Credentials {
            bearer,
            xsrf_token: self.get(XSRF_TOKEN_COOKIE),
        })
    }
}
