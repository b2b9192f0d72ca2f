//! Prompt Renderer - Render the system prompt using Handlebars

use chrono::{Local, NaiveDate};
use handlebars::Handlebars;
use serde::Serialize;

use crate::error::{Result, WeatherAgentError};
use crate::weather::ForecastModel;

/// Built-in system prompt template
pub const SYSTEM_TEMPLATE: &str = include_str!("../../prompts/system.md");

const SYSTEM: &str = "system";

#[derive(Serialize)]
struct ModelEntry {
    id: &'static str,
    description: &'static str,
}

#[derive(Serialize)]
struct SystemContext {
    today: String,
    models: Vec<ModelEntry>,
}

/// Renders prompt templates using Handlebars templating
pub struct PromptRenderer {
    handlebars: Handlebars<'static>,
}

impl PromptRenderer {
    /// Renderer for the built-in system prompt
    pub fn new() -> Result<Self> {
        Self::with_template(SYSTEM_TEMPLATE)
    }

    /// Renderer for a custom system prompt template
    pub fn with_template(template: &str) -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        // Plain text prompt, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars
            .register_template_string(SYSTEM, template)
            .map_err(|e| WeatherAgentError::Template(format!("Failed to register system prompt: {}", e)))?;
        Ok(Self { handlebars })
    }

    /// Render the system prompt for `today`
    pub fn render_system_for(&self, today: NaiveDate) -> Result<String> {
        let context = SystemContext {
            today: today.format("%A, %B %d, %Y").to_string(),
            models: ForecastModel::ALL
                .iter()
                .map(|m| ModelEntry {
                    id: m.id(),
                    description: m.description(),
                })
                .collect(),
        };
        self.handlebars
            .render(SYSTEM, &context)
            .map_err(|e| WeatherAgentError::Template(format!("Failed to render system prompt: {}", e)))
    }

    /// Render the system prompt with the local date
    pub fn render_system(&self) -> Result<String> {
        self.render_system_for(Local::now().date_naive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
    }

    #[test]
    fn test_render_builtin_prompt() {
        let prompt = PromptRenderer::new().unwrap().render_system_for(date()).unwrap();

        assert!(prompt.contains("Monday, January 05, 2026"));
        for model in ForecastModel::ALL {
            assert!(prompt.contains(&format!("- {}: ", model.id())));
        }
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn test_custom_template_no_escaping() {
        let renderer = PromptRenderer::with_template("Date: {{today}} <{{models.[0].id}}>").unwrap();
        let prompt = renderer.render_system_for(date()).unwrap();
        assert_eq!(prompt, "Date: Monday, January 05, 2026 <gfs>");
    }

    #[test]
    fn test_invalid_template() {
        let err = PromptRenderer::with_template("{{#each models}}").err().unwrap();
        assert!(matches!(err, WeatherAgentError::Template(_)));
    }
}
