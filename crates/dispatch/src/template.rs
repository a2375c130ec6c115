//! Message template rendering.
//!
//! Templates are named subject/body pairs with `{{key}}` placeholders.
//! Substitution values are either plain text or lists; list values flatten
//! to newline-joined lines (one referee per line in assignment summaries).

use std::collections::BTreeMap;

use fairway_common::error::AppError;

/// A substitution value for one placeholder.
#[derive(Debug, Clone)]
pub enum TemplateValue {
    Text(String),
    List(Vec<String>),
}

/// Placeholder name → value map for one render.
pub type TemplateVars = BTreeMap<String, TemplateValue>;

/// A named subject/body template.
#[derive(Debug, Clone, Copy)]
pub struct MessageTemplate {
    pub name: &'static str,
    pub subject: &'static str,
    pub body: &'static str,
}

/// Rendered subject/body ready for a notification record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}

/// Built-in templates, keyed by name.
const TEMPLATES: &[MessageTemplate] = &[
    MessageTemplate {
        name: "club_assignments",
        subject: "Referee assignments - {{tournament_name}}",
        body: "Dear {{club_name}},\n\n\
               The following referees have been assigned to {{tournament_name}} \
               ({{start_date}} - {{end_date}}):\n\n\
               {{referees}}\n\n\
               {{custom_message}}\n\
               Please confirm receipt to the committee.\n",
    },
    MessageTemplate {
        name: "referee_assignment",
        subject: "Assignment notice - {{tournament_name}}",
        body: "Dear {{referee_name}},\n\n\
               You have been assigned as {{role}} to {{tournament_name}} at \
               {{club_name}}, from {{start_date}} to {{end_date}}.\n\n\
               {{custom_message}}\n\
               Please confirm your availability.\n",
    },
    MessageTemplate {
        name: "institutional_summary",
        subject: "Assignment summary - {{tournament_name}}",
        body: "Assignments for {{tournament_name}} at {{club_name}} \
               ({{start_date}} - {{end_date}}):\n\n\
               {{referees}}\n\n\
               {{custom_message}}",
    },
];

/// Look up a built-in template by name.
pub fn get_template(name: &str) -> Option<&'static MessageTemplate> {
    TEMPLATES.iter().find(|t| t.name == name)
}

/// Look up a template, mapping a miss to a validation error naming the
/// accepted templates.
pub fn require_template(name: &str) -> Result<&'static MessageTemplate, AppError> {
    get_template(name).ok_or_else(|| {
        let known: Vec<&str> = TEMPLATES.iter().map(|t| t.name).collect();
        AppError::Validation(format!(
            "Unknown template '{}'. Valid templates: {}",
            name,
            known.join(", ")
        ))
    })
}

/// Replace every `{{key}}` placeholder that has a value in `vars`.
/// Placeholders without a value are left untouched.
pub fn render(input: &str, vars: &TemplateVars) -> String {
    let mut out = input.to_string();
    for (key, value) in vars {
        let placeholder = format!("{{{{{}}}}}", key);
        let replacement = match value {
            TemplateValue::Text(text) => text.clone(),
            TemplateValue::List(items) => items.join("\n"),
        };
        out = out.replace(&placeholder, &replacement);
    }
    out
}

/// Render a template's subject and body with one substitution map.
pub fn render_message(template: &MessageTemplate, vars: &TemplateVars) -> RenderedMessage {
    RenderedMessage {
        subject: render(template.subject, vars),
        body: render(template.body, vars),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, TemplateValue)]) -> TemplateVars {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_render_text_substitution() {
        let out = render(
            "Hello {{name}}, welcome to {{place}}",
            &vars(&[
                ("name", TemplateValue::Text("Anna".into())),
                ("place", TemplateValue::Text("Rome".into())),
            ]),
        );
        assert_eq!(out, "Hello Anna, welcome to Rome");
    }

    #[test]
    fn test_render_flattens_lists() {
        let out = render(
            "Assigned:\n{{referees}}",
            &vars(&[(
                "referees",
                TemplateValue::List(vec!["A - Arbitro".into(), "B - Osservatore".into()]),
            )]),
        );
        assert_eq!(out, "Assigned:\nA - Arbitro\nB - Osservatore");
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let out = render("Hi {{name}} and {{missing}}", &vars(&[(
            "name",
            TemplateValue::Text("X".into()),
        )]));
        assert_eq!(out, "Hi X and {{missing}}");
    }

    #[test]
    fn test_render_message_with_referee_lines() {
        let template = get_template("club_assignments").unwrap();
        let out = render_message(
            template,
            &vars(&[
                ("tournament_name", TemplateValue::Text("X".into())),
                ("club_name", TemplateValue::Text("GC Roma".into())),
                ("start_date", TemplateValue::Text("01/06/2026".into())),
                ("end_date", TemplateValue::Text("03/06/2026".into())),
                ("custom_message", TemplateValue::Text(String::new())),
                (
                    "referees",
                    TemplateValue::List(vec!["A - Arbitro".into()]),
                ),
            ]),
        );
        assert!(out.subject.contains("X"));
        assert!(out.body.contains("X"));
        assert!(out.body.lines().any(|l| l.contains("A - Arbitro")));
    }

    #[test]
    fn test_unknown_template_rejected() {
        assert!(get_template("nope").is_none());
        let err = require_template("nope").unwrap_err();
        assert!(err.to_string().contains("club_assignments"));
    }
}
