//! Session cookie construction.
//!
//! Login and logout build their `Set-Cookie` values here so both sides agree on name,
//! path, domain and flags.

use axum_extra::extract::cookie::Cookie;
pub use axum_extra::extract::cookie::SameSite;

pub const SESSION_COOKIE: &str = "reel_session";

/// Domain / Secure / SameSite policy applied to the session cookie.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub domain: Option<String>,
    pub secure: bool,
    pub same_site: SameSite,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            domain: None,
            secure: true,
            same_site: SameSite::Lax,
        }
    }
}

/// Parse a SameSite name, case-insensitive. Unknown values fall back to `Lax`.
pub fn parse_same_site(value: &str) -> SameSite {
    match value.to_ascii_lowercase().as_str() {
        "none" => SameSite::None,
        "strict" => SameSite::Strict,
        _ => SameSite::Lax,
    }
}

pub fn session_cookie(policy: &CookiePolicy, token: String, max_age: chrono::Duration) -> Cookie<'static> {
    let mut cookie = base(policy, token);
    cookie.set_max_age(time::Duration::seconds(max_age.num_seconds()));
    cookie
}

/// Expired, empty cookie that makes the browser drop the session.
pub fn clear_session_cookie(policy: &CookiePolicy) -> Cookie<'static> {
    let mut cookie = base(policy, String::new());
    cookie.make_removal();
    cookie
}

fn base(policy: &CookiePolicy, value: String) -> Cookie<'static> {
    let mut builder = Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(policy.secure)
        .same_site(policy.same_site);

    if let Some(domain) = &policy.domain {
        builder = builder.domain(domain.clone());
    }

    builder.build()
}
