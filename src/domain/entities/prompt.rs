//! Prompt templates with `{name}` placeholders.
//!
//! Literal braces are written as `{{` and `}}`. Templates are parsed once at
//! construction so formatting cannot fail on syntax, only on missing
//! variables.

use std::collections::{BTreeSet, HashMap};

use crate::domain::{DomainError, Message, MessageRole, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Var(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let source = template.into();
        let segments = parse(&source)?;
        Ok(Self { source, segments })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Variable names referenced by the template, sorted and de-duplicated.
    pub fn input_variables(&self) -> Vec<String> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Var(name) => Some(name.clone()),
                Segment::Text(_) => None,
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn format(&self, vars: &HashMap<String, String>) -> Result<String> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Var(name) => {
                    let value = vars.get(name).ok_or_else(|| {
                        DomainError::validation(format!("missing prompt variable '{name}'"))
                    })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

fn parse(template: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                text.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                text.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => {
                            return Err(DomainError::validation(format!(
                                "unclosed placeholder in template: {template}"
                            )))
                        }
                        Some(ch) => name.push(ch),
                    }
                }
                let name = name.trim();
                if name.is_empty() {
                    return Err(DomainError::validation("empty placeholder in template"));
                }
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                segments.push(Segment::Var(name.to_string()));
            }
            '}' => {
                return Err(DomainError::validation(format!(
                    "unmatched '}}' in template: {template}"
                )))
            }
            _ => text.push(c),
        }
    }

    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(segments)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatPromptPart {
    Message(MessageRole, PromptTemplate),
    /// Where prior conversation turns are spliced in.
    History,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatPromptTemplate {
    parts: Vec<ChatPromptPart>,
}

impl ChatPromptTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: &[(MessageRole, &str)]) -> Result<Self> {
        messages
            .iter()
            .try_fold(Self::new(), |prompt, (role, template)| prompt.message(*role, *template))
    }

    pub fn system(self, template: &str) -> Result<Self> {
        self.message(MessageRole::System, template)
    }

    pub fn user(self, template: &str) -> Result<Self> {
        self.message(MessageRole::User, template)
    }

    pub fn message(mut self, role: MessageRole, template: &str) -> Result<Self> {
        self.parts
            .push(ChatPromptPart::Message(role, PromptTemplate::new(template)?));
        Ok(self)
    }

    pub fn history(mut self) -> Self {
        self.parts.push(ChatPromptPart::History);
        self
    }

    pub fn parts(&self) -> &[ChatPromptPart] {
        &self.parts
    }

    pub fn input_variables(&self) -> Vec<String> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ChatPromptPart::Message(_, t) => Some(t.input_variables()),
                ChatPromptPart::History => None,
            })
            .flatten()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn format_messages(
        &self,
        vars: &HashMap<String, String>,
        history: &[Message],
    ) -> Result<Vec<Message>> {
        let mut messages = Vec::with_capacity(self.parts.len() + history.len());
        for part in &self.parts {
            match part {
                ChatPromptPart::Message(role, template) => {
                    messages.push(Message::new(*role, template.format(vars)?));
                }
                ChatPromptPart::History => messages.extend_from_slice(history),
            }
        }
        Ok(messages)
    }
}
