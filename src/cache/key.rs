//! Cache key derivation.
//!
//! Keys are the percent-escaped request target, or just its path. Only the
//! URL is read; method, headers and body never influence the key. Escaping is
//! injective, so distinct targets always yield distinct keys.

use crate::Request;

/// Key covering the path and the raw query string.
pub fn request_uri_key(request: &Request) -> String {
    urlencoding::encode(&request.request_uri()).into_owned()
}

/// Key covering the path alone; every query string variant shares it.
pub fn path_key(request: &Request) -> String {
    urlencoding::encode(request.path()).into_owned()
}
