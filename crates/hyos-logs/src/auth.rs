use std::sync::LazyLock;

use regex::Regex;

use hyos_types::AuthPrompt;

/// Device-verification link printed when the server needs an operator login
static VERIFY_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://oauth\.accounts\.hytale\.com/oauth2/device/verify\?user_code=[A-Za-z0-9]+")
        .expect("verify url pattern is valid")
});

/// `Authorization code: XYZ789`
static AUTH_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Authorization code:\s*([A-Za-z0-9]+)").expect("auth code pattern is valid")
});

/// Finds a pending OAuth device-flow prompt in server output
pub struct AuthScanner;

impl AuthScanner {
    /// Report a prompt only when both the link and the code are present
    ///
    /// If the server printed several prompts (a retried login), the last one
    /// of each wins.
    pub fn scan(text: &str) -> AuthPrompt {
        let url = VERIFY_URL.find_iter(text).last();
        let code = AUTH_CODE
            .captures_iter(text)
            .last()
            .and_then(|caps| caps.get(1));

        match (url, code) {
            (Some(url), Some(code)) => {
                AuthPrompt::pending(url.as_str().to_string(), code.as_str().to_string())
            }
            _ => AuthPrompt::default(),
        }
    }
}
