//! C8 — context router.
//!
//! Translates the two routing surfaces the API exposes — qualified subject
//! names and URL-prefix routes — into `(context, subject)` pairs. Both must
//! agree (§4.7).

use crate::error::{RegistryError, Result};
use crate::model::ContextName;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedSubject {
    pub context: ContextName,
    pub subject: String,
}

/// Parses a qualified subject name: `:.<ctx>:<subject>`, or a bare `<subject>`
/// meaning the default context.
pub fn parse_qualified_subject(raw: &str) -> Result<RoutedSubject> {
    let decoded = percent_decode(raw);
    if let Some(rest) = decoded.strip_prefix(":.") {
        let (ctx_part, subject_part) = rest
            .split_once(':')
            .ok_or_else(|| RegistryError::InvalidContextName(decoded.clone()))?;
        let context = ContextName::parse(&format!(".{ctx_part}"))?;
        Ok(RoutedSubject { context, subject: subject_part.to_owned() })
    } else {
        Ok(RoutedSubject { context: ContextName::default_context(), subject: decoded })
    }
}

/// Parses a URL-prefix route: `/contexts/.<ctx>/<rest>`. Returns the context
/// plus the remaining path for further routing.
pub fn parse_url_prefix(path: &str) -> Result<(ContextName, String)> {
    let decoded = percent_decode(path);
    let trimmed = decoded.strip_prefix('/').unwrap_or(&decoded);
    if let Some(rest) = trimmed.strip_prefix("contexts/") {
        let (ctx_raw, remainder) = rest.split_once('/').unwrap_or((rest, ""));
        let context = ContextName::parse(ctx_raw)?;
        Ok((context, format!("/{remainder}")))
    } else {
        Ok((ContextName::default_context(), format!("/{trimmed}")))
    }
}

/// Builds the qualified-subject wire form for a `(context, subject)` pair,
/// the inverse of `parse_qualified_subject`.
pub fn qualify(context: &ContextName, subject: &str) -> String {
    if context.is_default() {
        subject.to_owned()
    } else {
        format!(":.{}:{}", &context.as_str()[1..], subject)
    }
}

fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(hex) = std::str::from_utf8(&bytes[i + 1..i + 3]) {
                if let Ok(byte) = u8::from_str_radix(hex, 16) {
                    out.push(byte);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_subject_routes_to_default_context() {
        let routed = parse_qualified_subject("user-value").unwrap();
        assert!(routed.context.is_default());
        assert_eq!(routed.subject, "user-value");
    }

    #[test]
    fn qualified_subject_routes_to_named_context() {
        let routed = parse_qualified_subject(":.tenant-a:user-value").unwrap();
        assert_eq!(routed.context.as_str(), ".tenant-a");
        assert_eq!(routed.subject, "user-value");
    }

    #[test]
    fn url_prefix_routes_to_named_context() {
        let (ctx, rest) = parse_url_prefix("/contexts/.tenant-a/subjects").unwrap();
        assert_eq!(ctx.as_str(), ".tenant-a");
        assert_eq!(rest, "/subjects");
    }

    #[test]
    fn invalid_context_name_is_rejected() {
        assert!(parse_qualified_subject(":.bad name:subject").is_err());
    }

    #[test]
    fn percent_encoded_characters_decode_before_validation() {
        let routed = parse_qualified_subject(":.tenant%2Da:subject").unwrap();
        assert_eq!(routed.context.as_str(), ".tenant-a");
    }

    #[test]
    fn qualify_round_trips() {
        let routed = parse_qualified_subject(":.tenant-a:user-value").unwrap();
        let wire = qualify(&routed.context, &routed.subject);
        assert_eq!(wire, ":.tenant-a:user-value");
    }
}
