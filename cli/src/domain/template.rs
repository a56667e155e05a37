//! `${var}` placeholder resolution.
//!
//! Resolution is a single pass: text substituted from `vars` is never scanned
//! again, so a value containing `${...}` comes out verbatim.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use silo_common::OrderedMap;

use crate::domain::error::TemplateError;

static VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\$\{([A-Za-z0-9_]+)\}").expect("valid regex")
});

/// Variables available to templates. Later tiers overwrite earlier ones.
pub type TemplateVars = HashMap<String, String>;

/// Replace every `${identifier}` in `template` with its value in `vars`.
///
/// # Errors
///
/// Returns [`TemplateError::UnknownVariable`] for the first identifier not
/// present in `vars`.
pub fn resolve(template: &str, vars: &TemplateVars) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in VAR_RE.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = vars
            .get(name.as_str())
            .ok_or_else(|| TemplateError::UnknownVariable {
                name: name.as_str().to_string(),
                template: template.to_string(),
            })?;
        out.push_str(&template[last..whole.start()]);
        out.push_str(value);
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// Resolve every template of an ordered record, keeping its order.
///
/// # Errors
///
/// Propagates the first unresolved variable.
pub fn resolve_record(
    templates: &OrderedMap<String>,
    vars: &TemplateVars,
) -> Result<OrderedMap<String>, TemplateError> {
    let mut resolved = OrderedMap::new();
    for (key, template) in templates.iter() {
        resolved.insert(key, resolve(template, vars)?);
    }
    Ok(resolved)
}
