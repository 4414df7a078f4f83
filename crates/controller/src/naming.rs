//! Canonical controller and action names.
//!
//! A controller is addressed by a snake case name derived from its type identifier, e.g.
//! `UserProfileController` becomes `user_profile`. Two derivations exist:
//!
//! - the default one only splits where an uppercase letter follows a lowercase one, so an
//!   acronym run stays glued to the following word (`HTTPResponseCode` -> `httpresponse_code`)
//! - the inflection one splits at every word boundary (`HTTPResponseCode` -> `http_response_code`)

use once_cell::sync::Lazy;
use regex::Regex;

const CONTROLLER_SUFFIX: &str = "Controller";

static ACRONYM_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Z]+)([A-Z][a-z])").unwrap());
static WORD_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z\d])([A-Z])").unwrap());

/// Strips the module path and any generic arguments from a `std::any::type_name` string.
pub fn short_type_name(type_name: &str) -> &str {
    let without_generics = type_name.split('<').next().unwrap_or(type_name);
    without_generics.rsplit("::").next().unwrap_or(without_generics)
}

/// Derive the controller name from a type identifier.
pub fn derive_controller_name(type_name: &str, inflect: bool) -> String {
    if inflect { inflected_name(type_name) } else { plain_name(type_name) }
}

/// The name of a controller, with the name prefix prepended when `with_prefix` is set.
pub fn controller_name(
    type_name: &str,
    explicit: Option<&str>,
    prefix: Option<&str>,
    inflect: bool,
    with_prefix: bool,
) -> String {
    let name = match explicit {
        Some(name) => name.to_string(),
        None => derive_controller_name(type_name, inflect),
    };
    match prefix {
        Some(prefix) if with_prefix && !prefix.is_empty() => format!("{prefix}{name}"),
        _ => name,
    }
}

fn plain_name(type_name: &str) -> String {
    let mut chars = type_name.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let rest = chars.as_str();
    let rest = rest.strip_suffix(CONTROLLER_SUFFIX).unwrap_or(rest);

    let mut name = String::with_capacity(type_name.len() + 4);
    name.push(first);
    let mut prev: Option<char> = None;
    for c in rest.chars() {
        if c.is_uppercase() && prev.is_some_and(char::is_lowercase) {
            name.push('_');
        }
        name.push(c);
        prev = Some(c);
    }
    name.to_lowercase()
}

fn inflected_name(type_name: &str) -> String {
    let name = ACRONYM_BOUNDARY.replace_all(type_name, "${1}_${2}");
    let name = WORD_BOUNDARY.replace_all(&name, "${1}_${2}");
    let name = name.replace('-', "_").to_lowercase();
    match name.strip_suffix("_controller") {
        Some(stripped) => stripped.to_string(),
        None => name,
    }
}

/// Names starting with `_`, `-`, an uppercase letter or a digit are reserved for helpers.
pub fn is_action_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| !(c == '_' || c == '-' || c.is_ascii_digit() || c.is_uppercase()))
}

/// The canonical action name, or `None` when `fn_name` is reserved for helpers.
pub fn action_name(fn_name: &str, explicit: Option<&str>, prefix: Option<&str>, with_prefix: bool) -> Option<String> {
    if !is_action_name(fn_name) {
        return None;
    }
    let name = explicit.unwrap_or(fn_name);
    match prefix {
        Some(prefix) if with_prefix => Some(format!("{prefix}{name}")),
        _ => Some(name.to_string()),
    }
}
