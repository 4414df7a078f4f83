//! First-token content negotiation.
//!
//! Only the first entry of the first `Accept` header is considered, quality factors are
//! ignored. Parameters such as `charset` are stripped before comparing.

use crate::render::{APPLICATION_YAML, RendererChoice};
use http::{HeaderMap, header};
use mime::Mime;

/// Selects a renderer for the given request headers; anything unrecognized falls back to text.
pub fn select_renderer(headers: &HeaderMap) -> RendererChoice {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map_or(RendererChoice::Text, renderer_for_accept)
}

pub fn renderer_for_accept(accept: &str) -> RendererChoice {
    let Some(first) = accept.split(',').next() else {
        return RendererChoice::Text;
    };
    let Ok(mime) = first.trim().parse::<Mime>() else {
        return RendererChoice::Text;
    };

    match mime.essence_str() {
        "text/html" => RendererChoice::Template,
        "text/plain" => RendererChoice::Text,
        "application/json" => RendererChoice::Json,
        APPLICATION_YAML => RendererChoice::Yaml,
        _ => RendererChoice::Text,
    }
}
