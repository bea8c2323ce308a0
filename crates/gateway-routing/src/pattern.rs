//! Path patterns and downstream path templates.
//!
//! Pattern syntax, one item per `/`-separated segment:
//! - `orders`: literal segment
//! - `{id}`: exactly one non-empty segment, captured as `id`
//! - `{*rest}`: the remaining zero or more segments, captured as `rest`
//!   (last segment only)
//!
//! A single trailing slash on the request path is ignored.

use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    CatchAll(String),
}

/// Parameters captured by a successful match, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    /// Value of parameter `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Whether nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A compiled inbound path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
    case_sensitive: bool,
}

impl PathPattern {
    /// Compile `pattern`. Literal segments match case-insensitively unless
    /// `case_sensitive` is set.
    pub fn parse(pattern: &str, case_sensitive: bool) -> Result<Self, String> {
        let body = pattern
            .strip_prefix('/')
            .ok_or_else(|| "pattern must start with '/'".to_string())?;
        let body = body.strip_suffix('/').unwrap_or(body);

        let mut segments = Vec::new();
        let mut names = HashSet::new();
        if !body.is_empty() {
            let parts: Vec<&str> = body.split('/').collect();
            let last = parts.len() - 1;
            for (i, part) in parts.iter().enumerate() {
                let segment = parse_segment(part)?;
                match &segment {
                    Segment::Param(name) | Segment::CatchAll(name) => {
                        if !names.insert(name.clone()) {
                            return Err(format!("duplicate parameter {name}"));
                        }
                    }
                    Segment::Literal(_) => {}
                }
                if matches!(segment, Segment::CatchAll(_)) && i != last {
                    return Err("catch-all parameter must be the last segment".to_string());
                }
                segments.push(segment);
            }
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
            case_sensitive,
        })
    }

    /// Match `path`, returning captured parameters.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let body = path.strip_prefix('/').unwrap_or(path);
        let body = body.strip_suffix('/').unwrap_or(body);
        let parts: Vec<&str> = if body.is_empty() {
            Vec::new()
        } else {
            body.split('/').collect()
        };

        let mut params = Vec::new();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(lit) => {
                    let part = parts.get(i)?;
                    let equal = if self.case_sensitive {
                        part == lit
                    } else {
                        part.eq_ignore_ascii_case(lit)
                    };
                    if !equal {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let part = parts.get(i).filter(|p| !p.is_empty())?;
                    params.push((name.clone(), (*part).to_string()));
                }
                Segment::CatchAll(name) => {
                    let rest = parts.get(i..).map(|r| r.join("/")).unwrap_or_default();
                    params.push((name.clone(), rest));
                    return Some(PathParams(params));
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(PathParams(params))
    }

    /// Number of literal segments.
    pub fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    /// Whether the pattern ends in a catch-all.
    pub fn has_catch_all(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::CatchAll(_)))
    }

    /// Names of captured parameters.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(n) | Segment::CatchAll(n) => Some(n.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Source text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_segment(part: &str) -> Result<Segment, String> {
    if part.is_empty() {
        return Err("empty path segment".to_string());
    }
    match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
        Some(inner) => {
            let (catch_all, name) = match inner.strip_prefix('*') {
                Some(name) => (true, name),
                None => (false, inner),
            };
            validate_name(name)?;
            Ok(if catch_all {
                Segment::CatchAll(name.to_string())
            } else {
                Segment::Param(name.to_string())
            })
        }
        None if part.contains('{') || part.contains('}') => {
            Err(format!("unbalanced or partial parameter in segment {part}"))
        }
        None => Ok(Segment::Literal(part.to_string())),
    }
}

fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("empty parameter name".to_string());
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(format!("invalid parameter name {name}"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplatePart {
    Text(String),
    Param(String),
}

/// Downstream path template with `{name}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    parts: Vec<TemplatePart>,
}

impl PathTemplate {
    /// Parse `template`; every placeholder must name one of `known` parameters.
    pub fn parse<'a>(
        template: &str,
        known: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, String> {
        if !template.starts_with('/') {
            return Err("downstream path must start with '/'".to_string());
        }
        let known: HashSet<&str> = known.into_iter().collect();

        let mut parts = Vec::new();
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            let (text, after) = rest.split_at(open);
            if text.contains('}') {
                return Err("unbalanced '}'".to_string());
            }
            if !text.is_empty() {
                parts.push(TemplatePart::Text(text.to_string()));
            }
            let close = after
                .find('}')
                .ok_or_else(|| "unbalanced '{'".to_string())?;
            let inner = &after[1..close];
            let name = inner.strip_prefix('*').unwrap_or(inner);
            validate_name(name)?;
            if !known.contains(name) {
                return Err(format!("unknown parameter {name}"));
            }
            parts.push(TemplatePart::Param(name.to_string()));
            rest = &after[close + 1..];
        }
        if rest.contains('}') {
            return Err("unbalanced '}'".to_string());
        }
        if !rest.is_empty() {
            parts.push(TemplatePart::Text(rest.to_string()));
        }

        Ok(Self {
            raw: template.to_string(),
            parts,
        })
    }

    /// Substitute captured parameters.
    pub fn render(&self, params: &PathParams) -> String {
        let mut out = String::with_capacity(self.raw.len());
        for part in &self.parts {
            match part {
                TemplatePart::Text(text) => out.push_str(text),
                TemplatePart::Param(name) => out.push_str(params.get(name).unwrap_or_default()),
            }
        }
        out
    }

    /// Source text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(p: &str) -> PathPattern {
        PathPattern::parse(p, false).unwrap()
    }

    #[test]
    fn test_literal_match() {
        let p = pattern("/orders");
        assert!(p.matches("/orders").is_some());
        assert!(p.matches("/orders/").is_some());
        assert!(p.matches("/ORDERS").is_some());
        assert!(p.matches("/orders/1").is_none());
        assert!(p.matches("/order").is_none());
    }

    #[test]
    fn test_case_sensitive_literal() {
        let p = PathPattern::parse("/Orders", true).unwrap();
        assert!(p.matches("/Orders").is_some());
        assert!(p.matches("/orders").is_none());
    }

    #[test]
    fn test_root_pattern() {
        let p = pattern("/");
        assert!(p.matches("/").is_some());
        assert!(p.matches("/x").is_none());
        assert_eq!(p.literal_count(), 0);
    }

    #[test]
    fn test_param_capture() {
        let p = pattern("/orders/{id}/items/{item}");
        let params = p.matches("/orders/42/items/7").unwrap();
        assert_eq!(params.get("id"), Some("42"));
        assert_eq!(params.get("item"), Some("7"));
        assert_eq!(p.literal_count(), 2);
        assert!(p.matches("/orders//items/7").is_none());
        assert!(p.matches("/orders/42/items").is_none());
    }

    #[test]
    fn test_catch_all() {
        let p = pattern("/files/{*path}");
        assert_eq!(p.matches("/files/a/b/c.txt").unwrap().get("path"), Some("a/b/c.txt"));
        assert_eq!(p.matches("/files").unwrap().get("path"), Some(""));
        assert_eq!(p.matches("/files/").unwrap().get("path"), Some(""));
        assert!(p.matches("/other/a").is_none());
        assert!(p.has_catch_all());
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(PathPattern::parse("orders", false).is_err());
        assert!(PathPattern::parse("/orders/{id", false).is_err());
        assert!(PathPattern::parse("/orders/id}", false).is_err());
        assert!(PathPattern::parse("/orders/{}", false).is_err());
        assert!(PathPattern::parse("/orders/x{id}", false).is_err());
        assert!(PathPattern::parse("/a/{id}/b/{id}", false).is_err());
        assert!(PathPattern::parse("/{*rest}/tail", false).is_err());
        assert!(PathPattern::parse("/a//b", false).is_err());
    }

    #[test]
    fn test_template_render() {
        let p = pattern("/orders/{id}/{*rest}");
        let t = PathTemplate::parse("/api/v2/orders/{id}/{*rest}", p.param_names()).unwrap();
        let params = p.matches("/orders/42/lines/3").unwrap();
        assert_eq!(t.render(&params), "/api/v2/orders/42/lines/3");
    }

    #[test]
    fn test_template_errors() {
        let p = pattern("/orders/{id}");
        assert!(PathTemplate::parse("/x/{missing}", p.param_names()).is_err());
        assert!(PathTemplate::parse("/x/{id", p.param_names()).is_err());
        assert!(PathTemplate::parse("/x/id}", p.param_names()).is_err());
        assert!(PathTemplate::parse("x/{id}", p.param_names()).is_err());
    }
}
