//! One-shot notifications carried across a redirect in a short-lived cookie.

use serde::{Deserialize, Serialize};
use tower_cookies::{Cookie, Cookies};

const FLASH_COOKIE: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }

    pub fn css_class(&self) -> &'static str {
        match self.level {
            NoticeLevel::Success => "notice notice-success",
            NoticeLevel::Error => "notice notice-error",
        }
    }

    fn encode(&self) -> Option<String> {
        serde_json::to_string(self)
            .ok()
            .map(|json| urlencoding::encode(&json).into_owned())
    }

    fn decode(value: &str) -> Option<Self> {
        let json = urlencoding::decode(value).ok()?;
        serde_json::from_str(&json).ok()
    }
}

pub fn set_notice(cookies: &Cookies, notice: Notice) {
    let Some(value) = notice.encode() else {
        return;
    };
    let cookie = Cookie::build((FLASH_COOKIE, value))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::minutes(1))
        .build();
    cookies.add(cookie);
}

/// Reads the pending notice, if any, and clears it.
pub fn take_notice(cookies: &Cookies) -> Option<Notice> {
    let value = cookies.get(FLASH_COOKIE)?.value().to_string();
    let mut expired = Cookie::from(FLASH_COOKIE);
    expired.set_path("/");
    cookies.remove(expired);
    Notice::decode(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_notice_is_cookie_safe() {
        let notice = Notice::success("Shipped", "Shipped 3 cases of \"Coffee; dark\" from A-1-2.");
        let encoded = notice.encode().unwrap();

        assert!(!encoded.contains(';'));
        assert!(!encoded.contains('"'));
        assert!(!encoded.contains(' '));
        assert_eq!(Notice::decode(&encoded), Some(notice));
    }

    #[test]
    fn garbage_cookie_is_ignored() {
        assert_eq!(Notice::decode("not%20json"), None);
    }

    #[test]
    fn notice_serializes_for_the_api() {
        let json = serde_json::to_value(Notice::error("Error", "Not enough stock at this location.")).unwrap();
        assert_eq!(json["level"], "error");
        assert_eq!(json["title"], "Error");
    }
}
