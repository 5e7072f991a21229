//! Web control panel.
//!
//! Renders the embedded HTML template with Handlebars.

use handlebars::Handlebars;
use serde::Serialize;

const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");

/// Values injected into the control panel template.
#[derive(Debug, Serialize)]
pub struct UiContext {
    pub version: &'static str,
    pub list_path: &'static str,
    pub add_path: &'static str,
    pub delete_path: &'static str,
    pub logs_path: &'static str,
    pub clear_logs_path: &'static str,
}

impl Default for UiContext {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            list_path: "/__mock/list",
            add_path: "/__mock/add",
            delete_path: "/__mock/delete",
            logs_path: "/__mock/logs",
            clear_logs_path: "/__mock/logs/clear",
        }
    }
}

/// Control panel renderer.
pub struct UiRenderer {
    handlebars: Handlebars<'static>,
}

impl UiRenderer {
    /// Create a renderer with the embedded template registered.
    pub fn new() -> Result<Self, handlebars::TemplateError> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        // Injected values are trusted constants.
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.register_template_string("index", INDEX_TEMPLATE)?;
        Ok(Self { handlebars })
    }

    /// Render the control panel page.
    pub fn render_index(&self, context: &UiContext) -> Result<String, handlebars::RenderError> {
        self.handlebars.render("index", context)
    }
}
