//! Template rendering
//!
//! Subjects and bodies are rendered from named templates. The trait is
//! the seam that lets tests substitute a static template set for the
//! on-disk MiniJinja environment.

use minijinja::Environment;
use postrider_common::{Error, Result};
use std::path::Path;

/// Renders a named template against a JSON context.
pub trait TemplateRenderer: Send + Sync {
    /// Render `name` with `context`.
    ///
    /// Returns [`Error::TemplateNotFound`] when no template by that
    /// name exists, so callers can treat optional templates as such.
    fn render(&self, name: &str, context: &serde_json::Value) -> Result<String>;
}

/// MiniJinja-backed renderer loading templates from a directory tree.
///
/// Template names are paths relative to the root, e.g.
/// `core/email/password_reset_subject.txt`.
pub struct MiniJinjaRenderer {
    env: Environment<'static>,
}

impl MiniJinjaRenderer {
    pub fn from_dir(template_root: &Path) -> Self {
        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(template_root));
        Self { env }
    }
}

impl TemplateRenderer for MiniJinjaRenderer {
    fn render(&self, name: &str, context: &serde_json::Value) -> Result<String> {
        let template = self.env.get_template(name).map_err(|e| {
            if e.kind() == minijinja::ErrorKind::TemplateNotFound {
                Error::TemplateNotFound(name.to_string())
            } else {
                Error::Internal(format!("Failed to load template {}: {}", name, e))
            }
        })?;

        template
            .render(context)
            .map_err(|e| Error::Internal(format!("Failed to render template {}: {}", name, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn renderer_with(files: &[(&str, &str)]) -> (TempDir, MiniJinjaRenderer) {
        let temp_dir = TempDir::new().unwrap();
        for (name, body) in files {
            let path = temp_dir.path().join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, body).unwrap();
        }
        let renderer = MiniJinjaRenderer::from_dir(temp_dir.path());
        (temp_dir, renderer)
    }

    #[test]
    fn test_render_with_context() {
        let (_dir, renderer) = renderer_with(&[(
            "core/email/welcome_subject.txt",
            "Welcome to {{ site_name }}",
        )]);

        let rendered = renderer
            .render(
                "core/email/welcome_subject.txt",
                &json!({"site_name": "Example"}),
            )
            .unwrap();
        assert_eq!(rendered, "Welcome to Example");
    }

    #[test]
    fn test_missing_template_maps_to_not_found() {
        let (_dir, renderer) = renderer_with(&[]);

        let err = renderer
            .render("core/email/nope_message.html", &json!({}))
            .unwrap_err();
        assert!(matches!(err, Error::TemplateNotFound(name) if name.contains("nope")));
    }
}
