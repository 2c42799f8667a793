//! Output rendering for accepted events.
//!
//! Templates use Go-style actions, so `{{.Name}}` prints the event path and
//! `{{.Op}}` its kinds (`CREATE|WRITE`). The leading dot is optional, and a
//! bare `{{.}}` prints the whole event as `"path": OP`.

use std::io::{self, Write};
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::TemplateError;
use crate::events::Event;

pub const DEFAULT_TEMPLATE: &str = "{{.Name}}";

fn action_regex() -> &'static Regex {
    static ACTION: OnceLock<Regex> = OnceLock::new();
    ACTION.get_or_init(|| Regex::new(r"(?s)\{\{(.*?)\}\}").expect("action pattern is valid"))
}

fn field_regex() -> &'static Regex {
    static FIELD: OnceLock<Regex> = OnceLock::new();
    FIELD.get_or_init(|| Regex::new(r"^\.?([A-Za-z_][A-Za-z0-9_]*)$").expect("field pattern is valid"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    Op,
    /// The whole event, `{{.}}`
    Event,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Field(Field),
}

/// A compiled output template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn compile(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut last = 0;

        for caps in action_regex().captures_iter(source) {
            let whole = caps.get(0).expect("group 0 always matches");
            push_text(&mut segments, &source[last..whole.start()], last)?;

            let action = caps[1].trim();
            if action.is_empty() {
                return Err(TemplateError::EmptyAction {
                    offset: whole.start(),
                });
            }
            segments.push(Segment::Field(parse_field(action)?));
            last = whole.end();
        }
        push_text(&mut segments, &source[last..], last)?;

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn render(&self, event: &Event) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Field(Field::Name) => out.push_str(&event.path().display().to_string()),
                Segment::Field(Field::Op) => out.push_str(&event.op().to_string()),
                Segment::Field(Field::Event) => out.push_str(&event.to_string()),
            }
        }
        out
    }
}

impl Default for Template {
    fn default() -> Self {
        Self {
            source: DEFAULT_TEMPLATE.to_string(),
            segments: vec![Segment::Field(Field::Name)],
        }
    }
}

impl FromStr for Template {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Template::compile(s)
    }
}

fn push_text(segments: &mut Vec<Segment>, text: &str, base: usize) -> Result<(), TemplateError> {
    // A `{{` left over after matching means an action was never closed.
    if let Some(pos) = text.find("{{") {
        return Err(TemplateError::Unclosed { offset: base + pos });
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text.to_string()));
    }
    Ok(())
}

fn parse_field(action: &str) -> Result<Field, TemplateError> {
    if action == "." {
        return Ok(Field::Event);
    }
    let Some(caps) = field_regex().captures(action) else {
        return Err(TemplateError::InvalidAction {
            action: action.to_string(),
        });
    };
    match &caps[1] {
        "Name" => Ok(Field::Name),
        "Op" => Ok(Field::Op),
        other => Err(TemplateError::UnknownField {
            name: other.to_string(),
        }),
    }
}

/// How accepted events are written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Renderer {
    Template(Template),
    /// One JSON object per line
    Json,
}

impl Renderer {
    /// Writes one event as a single line.
    pub fn write_line<W: Write>(&self, out: &mut W, event: &Event) -> io::Result<()> {
        match self {
            Renderer::Template(template) => writeln!(out, "{}", template.render(event)),
            Renderer::Json => {
                // Serialized whole first so a failure never leaves half a line.
                let mut line = serde_json::to_vec(event)?;
                line.push(b'\n');
                out.write_all(&line)
            }
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Renderer::Template(Template::default())
    }
}
