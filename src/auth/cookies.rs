use axum::http::{header, HeaderMap, HeaderValue};
use time::{macros::format_description, UtcOffset};

use crate::auth::repo_types::Session;

pub const SESSION_COOKIE_NAME: &str = "session_id";

/// `Set-Cookie` value carrying the session token.
pub fn session_cookie(session: &Session) -> HeaderValue {
    let expires = session
        .expires_on
        .to_offset(UtcOffset::UTC)
        // IMF-fixdate, e.g. "Sun, 06 Nov 1994 08:49:37 GMT"
        .format(format_description!(
            "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
        ))
        .unwrap_or_default();
    let value = format!(
        "{}={}; Path=/; Expires={}; HttpOnly; SameSite=Lax",
        SESSION_COOKIE_NAME, session.id, expires
    );
    // tokens are hex and the date is ASCII, so this never fails in practice
    HeaderValue::from_str(&value).unwrap_or_else(|_| clear_session_cookie())
}

/// `Set-Cookie` value that makes the browser drop the session cookie.
pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("session_id=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax")
}

/// Pull the session token out of the request's `Cookie` headers.
pub fn read_session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE_NAME)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
