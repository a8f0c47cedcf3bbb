//! `{variable}` placeholder templates.

/// Replace every `{key}` in `template` with its value.
///
/// Placeholders without a matching key are left as they are.
pub fn render<I, K, V>(template: &str, vars: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut out = template.to_string();
    for (key, value) in vars {
        let placeholder = format!("{{{}}}", key.as_ref());
        if out.contains(&placeholder) {
            out = out.replace(&placeholder, value.as_ref());
        }
    }
    out
}

/// Distinct placeholder names in order of first appearance.
///
/// A placeholder is `{` followed by one or more ASCII letters, digits or
/// underscores, then `}`.
pub fn extract_variables(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        if len > 0 && after[len..].starts_with('}') {
            let name = &after[..len];
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
            rest = &after[len + 1..];
        } else {
            rest = after;
        }
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_replaces_all_occurrences() {
        let out = render(
            "Translate {text} to {lang}. Again: {text}",
            [("text", "hello"), ("lang", "French")],
        );
        assert_eq!(out, "Translate hello to French. Again: hello");
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let out = render("Hi {name}, your {item} shipped", [("name", "Ada")]);
        assert_eq!(out, "Hi Ada, your {item} shipped");
    }

    #[test]
    fn test_render_does_not_treat_key_as_pattern() {
        let out = render("cost: {a.b} {ab}", [("a.b", "1")]);
        assert_eq!(out, "cost: 1 {ab}");
    }

    #[test]
    fn test_extract_variables() {
        assert_eq!(
            extract_variables("{topic}: write about {topic} for {audience_1} {not valid} {}"),
            vec!["topic".to_string(), "audience_1".to_string()]
        );
        assert!(extract_variables("no placeholders").is_empty());
        assert_eq!(extract_variables("{{nested}}"), vec!["nested".to_string()]);
    }
}
