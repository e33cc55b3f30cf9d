use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};

pub const FLASH_COOKIE: &str = "jobboard_flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Info,
    Warning,
    Danger,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Danger => "danger",
        }
    }
}

/// One-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: Level,
    pub message: String,
}

impl Flash {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Level::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Level::Info, message)
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self::new(Level::Danger, message)
    }

    pub fn level(&self) -> &'static str {
        self.level.as_str()
    }
}

/// Appends messages to any already waiting in the jar.
pub fn push(jar: CookieJar, flashes: Vec<Flash>) -> CookieJar {
    if flashes.is_empty() {
        return jar;
    }
    let mut pending = read(&jar);
    pending.extend(flashes);
    let Ok(json) = serde_json::to_vec(&pending) else {
        return jar;
    };
    let cookie = Cookie::build((FLASH_COOKIE, URL_SAFE_NO_PAD.encode(json)))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    jar.add(cookie)
}

/// Removes the pending messages from the jar and returns them.
pub fn take(jar: CookieJar) -> (CookieJar, Vec<Flash>) {
    let flashes = read(&jar);
    if jar.get(FLASH_COOKIE).is_none() {
        return (jar, flashes);
    }
    (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), flashes)
}

fn read(jar: &CookieJar) -> Vec<Flash> {
    jar.get(FLASH_COOKIE)
        .and_then(|cookie| URL_SAFE_NO_PAD.decode(cookie.value()).ok())
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pushed_messages_are_taken_once() {
        let jar = push(CookieJar::new(), vec![Flash::success("Saved")]);
        let jar = push(jar, vec![Flash::danger("But also this")]);

        let (jar, flashes) = take(jar);
        assert_eq!(
            flashes,
            vec![Flash::success("Saved"), Flash::danger("But also this")]
        );
        let (_, again) = take(jar);
        assert!(again.is_empty());
    }

    #[test]
    fn garbage_cookie_yields_no_messages() {
        let jar = CookieJar::new().add(Cookie::new(FLASH_COOKIE, "%%%"));
        let (_, flashes) = take(jar);
        assert!(flashes.is_empty());
    }
}
