//! Strict placeholder rendering for service descriptor templates.
//!
//! Placeholders look like `{{name}}`. Rendering fails if a declared field
//! has no placeholder in the template, or if any placeholder survives
//! substitution. A renamed descriptor field can therefore never silently
//! stop being substituted.

use crate::error::{InstallerError, Result};

pub fn render(template: &str, fields: &[(&str, String)]) -> Result<String> {
    let mut out = template.to_string();

    for (name, value) in fields {
        let token = format!("{{{{{name}}}}}");
        if !out.contains(&token) {
            return Err(InstallerError::Template(format!(
                "field `{name}` has no placeholder in the template"
            )));
        }
        out = out.replace(&token, value);
    }

    if let Some(start) = out.find("{{") {
        let rest = &out[start..];
        let token = rest
            .find("}}")
            .map(|end| &rest[..end + 2])
            .unwrap_or(rest.lines().next().unwrap_or(rest));
        return Err(InstallerError::Template(format!(
            "placeholder `{token}` was not substituted"
        )));
    }

    Ok(out)
}
