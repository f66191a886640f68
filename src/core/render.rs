//! Renderer module
//!
//! Renders command output as plain text (what the node would hand back to the
//! host) or as JSON for tooling.

use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "raw" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

/// Something a command can print in either format
pub trait Render: Serialize {
    /// Plain-text rendering
    fn to_text(&self) -> String;
}

/// Render configuration combining format and options
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderConfig {
    pub format: OutputFormat,
    pub pretty: bool,
}

impl RenderConfig {
    #[cfg(test)]
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            pretty: false,
        }
    }

    /// Create a new render config with pretty option
    pub fn with_pretty(format: OutputFormat, pretty: bool) -> Self {
        Self { format, pretty }
    }
}

pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    #[cfg(test)]
    pub fn new(format: OutputFormat) -> Self {
        Self {
            config: RenderConfig::new(format),
        }
    }

    pub fn with_config(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn render<T: Render>(&self, output: &T) -> String {
        match self.config.format {
            OutputFormat::Text => output.to_text(),
            OutputFormat::Json => self.render_json(output),
        }
    }

    /// Render and print to stdout
    pub fn print<T: Render>(&self, output: &T) {
        println!("{}", self.render(output));
    }

    /// Render to a writer
    #[cfg(test)]
    pub fn render_to<T: Render, W: std::io::Write>(
        &self,
        output: &T,
        mut writer: W,
    ) -> std::io::Result<()> {
        writer.write_all(self.render(output).as_bytes())
    }

    fn render_json<T: Serialize>(&self, output: &T) -> String {
        let rendered = if self.config.pretty {
            serde_json::to_string_pretty(output)
        } else {
            serde_json::to_string(output)
        };
        rendered.unwrap_or_else(|_| "null".to_string())
    }
}
