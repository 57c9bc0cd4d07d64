use serde::{Deserialize, Serialize};
use spin_sdk::http::Request;

use crate::config::{MAX_PENDING_FLASHES, SESSION_COOKIE};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Flash {
    pub category: String,
    pub message: String,
}

/// Client-side half of the session: the opaque token pointing at the
/// server-side `session:<token>` record, plus flash messages waiting to
/// be shown by the next view.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionCookie {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flashes: Vec<Flash>,
}

impl SessionCookie {
    /// Missing or unreadable cookies yield an empty session.
    pub fn from_request(req: &Request) -> Self {
        req.header("cookie")
            .and_then(|h| h.as_str())
            .and_then(Self::from_cookie_header)
            .unwrap_or_default()
    }

    fn from_cookie_header(header: &str) -> Option<Self> {
        let raw = header.split(';').find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == SESSION_COOKIE).then_some(value)
        })?;
        let decoded = urlencoding::decode(raw).ok()?;
        serde_json::from_str(&decoded).ok()
    }

    pub fn flash(&mut self, category: &str, message: impl Into<String>) {
        self.flashes.push(Flash {
            category: category.to_string(),
            message: message.into(),
        });
        if self.flashes.len() > MAX_PENDING_FLASHES {
            let excess = self.flashes.len() - MAX_PENDING_FLASHES;
            self.flashes.drain(..excess);
        }
    }

    pub fn take_flashes(&mut self) -> Vec<Flash> {
        std::mem::take(&mut self.flashes)
    }

    pub fn set_cookie_header(&self) -> anyhow::Result<String> {
        if self == &SessionCookie::default() {
            return Ok(format!(
                "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
                SESSION_COOKIE
            ));
        }
        let payload = serde_json::to_string(self)?;
        Ok(format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            SESSION_COOKIE,
            urlencoding::encode(&payload)
        ))
    }
}
