use handlebars::Handlebars;
use serde_json::{Value, json};

use crate::path::FieldPath;

/// Renders rule messages, which may reference `{{path}}` and `{{value}}`.
pub struct MessageRenderer {
    engine: Handlebars<'static>,
}

impl MessageRenderer {
    pub fn new() -> Self {
        let mut engine = Handlebars::new();
        engine.set_strict_mode(false);
        engine.register_escape_fn(handlebars::no_escape);
        Self { engine }
    }

    pub fn render(&self, template: &str, path: &FieldPath, value: &Value) -> String {
        if !template.contains("{{") {
            return template.to_string();
        }
        let data = json!({ "path": path.as_str(), "value": value });
        match self.engine.render_template(template, &data) {
            Ok(rendered) => rendered,
            Err(error) => {
                tracing::warn!(%path, %error, "message template failed to render");
                template.to_string()
            }
        }
    }
}

impl Default for MessageRenderer {
    fn default() -> Self {
        Self::new()
    }
}
