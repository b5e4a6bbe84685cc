//! Template rendering.

use std::{collections::HashMap, io, path::Path};

use outreach_common::Contact;
use ramhorns::{Content, Template, encoding::Encoder};

use crate::error::RenderError;

const SUBJECT_PREFIX: &str = "Subject:";

/// Subject and body of one rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
}

/// Turns a template file and a contact into a message.
pub trait Renderer: Send + Sync {
    fn render(&self, template: &Path, contact: &Contact) -> Result<RenderedEmail, RenderError>;
}

/// Mustache templates, read from disk on every call.
///
/// Every contact column is available by name and unknown names render
/// empty. Output is plain text, so `{{name}}` and `{{{name}}}` both insert
/// the value unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct MustacheRenderer;

impl MustacheRenderer {
    /// Renders already-loaded template source.
    pub fn render_source(
        template: &Path,
        source: String,
        contact: &Contact,
    ) -> Result<RenderedEmail, RenderError> {
        let compiled = Template::new(source).map_err(|err| RenderError::Syntax {
            path: template.to_path_buf(),
            message: err.to_string(),
        })?;

        let fields: HashMap<&str, PlainText<'_>> = contact
            .fields()
            .iter()
            .map(|(key, value)| (key.as_str(), PlainText(value.as_str())))
            .collect();

        Ok(split_subject(&compiled.render(&fields), contact))
    }
}

/// A field value written verbatim, whichever tag form refers to it.
struct PlainText<'a>(&'a str);

impl Content for PlainText<'_> {
    #[inline]
    fn is_truthy(&self) -> bool {
        !self.0.is_empty()
    }

    #[inline]
    fn capacity_hint(&self, _tpl: &Template) -> usize {
        self.0.len()
    }

    #[inline]
    fn render_escaped<E: Encoder>(&self, encoder: &mut E) -> Result<(), E::Error> {
        encoder.write_unescaped(self.0)
    }

    #[inline]
    fn render_unescaped<E: Encoder>(&self, encoder: &mut E) -> Result<(), E::Error> {
        encoder.write_unescaped(self.0)
    }
}

impl Renderer for MustacheRenderer {
    fn render(&self, template: &Path, contact: &Contact) -> Result<RenderedEmail, RenderError> {
        let source = std::fs::read_to_string(template).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                RenderError::MissingTemplate(template.to_path_buf())
            } else {
                RenderError::Io {
                    path: template.to_path_buf(),
                    source,
                }
            }
        })?;

        Self::render_source(template, source, contact)
    }
}

/// Splits a leading `Subject:` line off rendered content.
///
/// Without one, the whole content is the body and the subject is
/// synthesized from the contact's `first_name`.
#[must_use]
pub fn split_subject(content: &str, contact: &Contact) -> RenderedEmail {
    if let Some(rest) = content.strip_prefix(SUBJECT_PREFIX) {
        let (subject, body) = rest.split_once('\n').unwrap_or((rest, ""));
        return RenderedEmail {
            subject: subject.trim().to_string(),
            body: body.trim().to_string(),
        };
    }

    RenderedEmail {
        subject: default_subject(contact),
        body: content.to_string(),
    }
}

fn default_subject(contact: &Contact) -> String {
    let name = contact
        .get("first_name")
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("there");

    format!("Quick chat, {name}?")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn jane() -> Contact {
        Contact::from_fields([
            ("email", "jane@x.com"),
            ("first_name", "Jane"),
            ("company", "Acme & Sons"),
        ])
    }

    #[test]
    fn test_subject_line() {
        let rendered = split_subject("Subject:  Hello Jane \n\nBody text\n", &jane());

        assert_eq!(
            rendered,
            RenderedEmail {
                subject: "Hello Jane".to_string(),
                body: "Body text".to_string(),
            }
        );
    }

    #[test]
    fn test_subject_line_only() {
        let rendered = split_subject("Subject: Just this", &jane());
        assert_eq!(rendered.subject, "Just this");
        assert_eq!(rendered.body, "");
    }

    #[test]
    fn test_synthesized_subject() {
        let rendered = split_subject("Hi Jane,\nbody", &jane());
        assert_eq!(rendered.subject, "Quick chat, Jane?");
        assert_eq!(rendered.body, "Hi Jane,\nbody");

        let anonymous = Contact::from_fields([("email", "x@y.z")]);
        assert_eq!(split_subject("body", &anonymous).subject, "Quick chat, there?");
    }

    #[test]
    fn test_render_fields() {
        let rendered = MustacheRenderer::render_source(
            Path::new("inline"),
            "Subject: Hi {{first_name}}\nWorking at {{{company}}}? {{missing}}done".to_string(),
            &jane(),
        )
        .unwrap();

        assert_eq!(rendered.subject, "Hi Jane");
        assert_eq!(rendered.body, "Working at Acme & Sons? done");
    }

    #[test]
    fn test_render_keeps_special_characters() {
        let contact = Contact::from_fields([("email", "a@b.c"), ("company", "Smith & Jones")]);
        let rendered = MustacheRenderer::render_source(
            Path::new("inline"),
            "Subject: Hi {{company}}\n{{company}} <team> \"{{{company}}}\"".to_string(),
            &contact,
        )
        .unwrap();

        assert_eq!(rendered.subject, "Hi Smith & Jones");
        assert_eq!(rendered.body, "Smith & Jones <team> \"Smith & Jones\"");
    }

    #[test]
    fn test_render_section_on_empty_field() {
        let contact = Contact::from_fields([("email", "a@b.c"), ("title", "")]);
        let rendered = MustacheRenderer::render_source(
            Path::new("inline"),
            "{{#title}}as {{title}}{{/title}}{{^title}}no title{{/title}}".to_string(),
            &contact,
        )
        .unwrap();

        assert_eq!(rendered.body, "no title");
    }

    #[test]
    fn test_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.mustache");

        let err = MustacheRenderer.render(&path, &jane()).unwrap_err();
        assert!(matches!(err, RenderError::MissingTemplate(p) if p == path));
    }

    #[test]
    fn test_render_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.com.mustache");
        std::fs::write(&path, "Subject: For {{first_name}}\nHello!\n").unwrap();

        let rendered = MustacheRenderer.render(&path, &jane()).unwrap();
        assert_eq!(rendered.subject, "For Jane");
        assert_eq!(rendered.body, "Hello!");
    }

    #[test]
    fn test_unclosed_section_is_syntax_error() {
        let err = MustacheRenderer::render_source(
            Path::new("broken"),
            "{{#items}}never closed".to_string(),
            &jane(),
        )
        .unwrap_err();

        assert!(matches!(err, RenderError::Syntax { .. }));
    }
}
