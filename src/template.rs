//! Stateless `{{name}}` variable substitution (`spec.md` §4.3).

use std::collections::HashMap;

use regex::Regex;

fn variable_pattern() -> Regex {
    Regex::new(r"\{\{([A-Za-z_][A-Za-z0-9_]*)\}\}").expect("static template pattern is valid")
}

/// Substitutes every `{{name}}` token with `vars[name]`, left to right, with
/// no recursive expansion of substituted values. A missing variable is left
/// as the literal token.
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    let pattern = variable_pattern();
    pattern
        .replace_all(template, |caps: &regex::Captures| {
            let name = &caps[1];
            vars.get(name).cloned().unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Checks that every name in `required` is present in `vars`.
pub fn validate(required: &[String], vars: &HashMap<String, String>) -> Result<(), Vec<String>> {
    let missing: Vec<String> = required
        .iter()
        .filter(|name| !vars.contains_key(*name))
        .cloned()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_known_variables() {
        let rendered = render("Hello {{name}}, your code is {{code}}.", &vars(&[("name", "Ada"), ("code", "42")]));
        assert_eq!(rendered, "Hello Ada, your code is 42.");
    }

    #[test]
    fn leaves_missing_variables_as_literal_token() {
        let rendered = render("Hi {{name}}, {{unknown}} remains.", &vars(&[("name", "Ada")]));
        assert_eq!(rendered, "Hi Ada, {{unknown}} remains.");
    }

    #[test]
    fn does_not_recursively_expand_substituted_values() {
        let rendered = render("{{a}}", &vars(&[("a", "{{b}}"), ("b", "oops")]));
        assert_eq!(rendered, "{{b}}");
    }

    #[test]
    fn validate_reports_missing_names() {
        let required = vec!["name".to_string(), "code".to_string()];
        let result = validate(&required, &vars(&[("name", "Ada")]));
        assert_eq!(result, Err(vec!["code".to_string()]));
    }

    #[test]
    fn validate_passes_when_all_present() {
        let required = vec!["name".to_string()];
        assert!(validate(&required, &vars(&[("name", "Ada")])).is_ok());
    }
}
