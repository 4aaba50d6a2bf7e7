//! Document to plain text conversion

use pulldown_cmark::{Event, Parser, TagEnd};

use crate::error::{Error, Result};

/// Turns raw document bytes into text
///
/// The buffer is borrowed, so the caller keeps ownership and can reuse it.
pub trait DocumentConverter: Send + Sync {
    fn convert(&self, data: &[u8], file_name: Option<&str>) -> Result<String>;
}

/// File types understood by [`FileConverter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileType {
    Text,
    Markdown,
    Html,
    Csv,
    /// Source code, tagged with its language
    Code(String),
}

impl FileType {
    /// Detect from a file name; `None` for unsupported extensions
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();

        let file_type = match extension.as_str() {
            "txt" | "text" | "log" | "" => Self::Text,
            "md" | "markdown" => Self::Markdown,
            "html" | "htm" => Self::Html,
            "csv" => Self::Csv,
            "rs" => Self::Code("rust".to_string()),
            "py" => Self::Code("python".to_string()),
            "js" | "mjs" => Self::Code("javascript".to_string()),
            "ts" => Self::Code("typescript".to_string()),
            "go" => Self::Code("go".to_string()),
            "java" => Self::Code("java".to_string()),
            "c" | "h" => Self::Code("c".to_string()),
            "cpp" | "hpp" | "cc" => Self::Code("cpp".to_string()),
            "cs" => Self::Code("csharp".to_string()),
            "rb" => Self::Code("ruby".to_string()),
            "sh" => Self::Code("shell".to_string()),
            "toml" | "yaml" | "yml" | "json" | "xml" => Self::Code(extension.clone()),
            _ => return None,
        };
        Some(file_type)
    }
}

/// Converter for text, markdown, HTML, CSV and source files
#[derive(Debug, Clone, Default)]
pub struct FileConverter;

impl FileConverter {
    pub fn new() -> Self {
        Self
    }

    fn markdown_to_text(source: &str) -> String {
        let mut text = String::new();

        for event in Parser::new(source) {
            match event {
                Event::Text(t) | Event::Code(t) => text.push_str(&t),
                Event::SoftBreak | Event::HardBreak => text.push('\n'),
                Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::CodeBlock) => {
                    text.push_str("\n\n")
                }
                _ => {}
            }
        }

        text.trim_end().to_string()
    }

    fn html_to_text(file_name: &str, source: &str) -> Result<String> {
        let document = scraper::Html::parse_document(source);
        let body_selector = scraper::Selector::parse("body")
            .map_err(|e| Error::conversion(file_name, format!("invalid selector: {:?}", e)))?;

        let mut content = String::new();
        if let Some(body) = document.select(&body_selector).next() {
            for text in body.text() {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    if !content.is_empty() {
                        content.push(' ');
                    }
                    content.push_str(trimmed);
                }
            }
        }
        Ok(content)
    }

    fn csv_to_text(file_name: &str, data: &[u8]) -> Result<String> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(data);
        let mut content = String::new();

        let headers = reader
            .headers()
            .map_err(|e| Error::conversion(file_name, e.to_string()))?;
        content.push_str(&headers.iter().collect::<Vec<_>>().join(" | "));
        content.push('\n');

        for record in reader.records() {
            let record = record.map_err(|e| Error::conversion(file_name, e.to_string()))?;
            content.push_str(&record.iter().collect::<Vec<_>>().join(" | "));
            content.push('\n');
        }

        Ok(content)
    }
}

impl DocumentConverter for FileConverter {
    fn convert(&self, data: &[u8], file_name: Option<&str>) -> Result<String> {
        let name = file_name.unwrap_or("");
        let file_type = FileType::from_file_name(name)
            .ok_or_else(|| Error::UnsupportedFileType(name.to_string()))?;

        let text = String::from_utf8_lossy(data);
        let converted = match file_type {
            FileType::Text | FileType::Code(_) => text.into_owned(),
            FileType::Markdown => Self::markdown_to_text(&text),
            FileType::Html => Self::html_to_text(name, &text)?,
            FileType::Csv => Self::csv_to_text(name, data)?,
        };

        tracing::debug!(
            "Converted {} ({:?}): {} bytes -> {} bytes of text",
            name,
            file_type,
            data.len(),
            converted.len()
        );

        Ok(converted)
    }
}
