//! Per-stream accumulation of chunk deltas

use std::collections::BTreeMap;

use crate::parse::Chunk;
use crate::types::{ChatResponse, ContentPart, FinishReason, Message, Role, ToolCall, Usage};

/// Tool call assembled from fragments sharing one index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallFragment {
    /// Position in the `tool_calls` array
    pub index: u32,
    /// Call identifier, once seen
    pub id: Option<String>,
    /// Function name, last write wins
    pub name: Option<String>,
    /// Concatenated argument fragments, possibly incomplete JSON
    pub arguments: String,
}

/// What a merge changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Text or tool calls differ from before the merge
    pub content_changed: bool,
}

/// Everything received so far on one stream
#[derive(Debug, Clone, Default)]
pub struct StreamState {
    text: String,
    fragments: BTreeMap<u32, ToolCallFragment>,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
    id: Option<String>,
    model: Option<String>,
    dropped_lines: u64,
}

impl StreamState {
    /// Fold one chunk into the state
    pub fn merge(&mut self, chunk: Chunk) -> MergeOutcome {
        let mut changed = false;

        if let Some(id) = chunk.id
            && self.id.is_none()
        {
            self.id = Some(id);
        }
        if let Some(model) = chunk.model
            && self.model.is_none()
        {
            self.model = Some(model);
        }

        if let Some(text) = chunk.delta_text
            && !text.is_empty()
        {
            self.text.push_str(&text);
            changed = true;
        }

        for delta in chunk.tool_call_fragments {
            let fragment = self.fragments.entry(delta.index).or_insert_with(|| {
                changed = true;
                ToolCallFragment {
                    index: delta.index,
                    ..ToolCallFragment::default()
                }
            });

            if let Some(id) = delta.id
                && !id.is_empty()
                && fragment.id.as_ref() != Some(&id)
            {
                fragment.id = Some(id);
                changed = true;
            }
            if let Some(name) = delta.name
                && !name.is_empty()
                && fragment.name.as_ref() != Some(&name)
            {
                fragment.name = Some(name);
                changed = true;
            }
            if let Some(arguments) = delta.arguments
                && !arguments.is_empty()
            {
                fragment.arguments.push_str(&arguments);
                changed = true;
            }
        }

        if let Some(reason) = chunk.finish_reason {
            self.finish_reason = Some(reason);
        }
        if let Some(usage) = chunk.usage {
            self.usage = Some(usage);
        }

        MergeOutcome {
            content_changed: changed,
        }
    }

    /// Count a line that could not be parsed
    pub const fn record_dropped_line(&mut self) {
        self.dropped_lines += 1;
    }

    /// Accumulated text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Tool call fragments, ordered by index
    pub fn fragments(&self) -> impl Iterator<Item = &ToolCallFragment> {
        self.fragments.values()
    }

    /// Finish reason, once the gateway sent one
    pub const fn finish_reason(&self) -> Option<&FinishReason> {
        self.finish_reason.as_ref()
    }

    /// Latest usage report
    pub const fn usage(&self) -> Option<Usage> {
        self.usage
    }

    /// Lines skipped because they did not parse
    pub const fn dropped_lines(&self) -> u64 {
        self.dropped_lines
    }

    /// Partial response reflecting the state so far
    ///
    /// Tool call arguments are passed through as received and may not be
    /// valid JSON yet. Fragments without a name yet are left out.
    pub fn snapshot(&self) -> ChatResponse {
        let calls = self.fragments().filter_map(|f| {
            f.name.as_ref().map(|name| ToolCall {
                id: f.id.clone(),
                name: name.clone(),
                arguments: f.arguments.clone(),
            })
        });

        ChatResponse {
            id: self.id.clone(),
            model: self.model.clone(),
            message: assistant_message(&self.text, calls),
            usage: self.usage.unwrap_or_default(),
            finish_reason: self.finish_reason.clone(),
            is_final: false,
        }
    }

    pub(crate) fn into_parts(self) -> StreamParts {
        StreamParts {
            text: self.text,
            fragments: self.fragments.into_values().collect(),
            finish_reason: self.finish_reason,
            usage: self.usage,
            id: self.id,
            model: self.model,
            dropped_lines: self.dropped_lines,
        }
    }
}

/// Owned fields of a finished stream, consumed by the decoder
pub(crate) struct StreamParts {
    pub text: String,
    pub fragments: Vec<ToolCallFragment>,
    pub finish_reason: Option<FinishReason>,
    pub usage: Option<Usage>,
    pub id: Option<String>,
    pub model: Option<String>,
    pub dropped_lines: u64,
}

/// Assistant message with the text part first, then tool calls
pub(crate) fn assistant_message(text: &str, calls: impl IntoIterator<Item = ToolCall>) -> Message {
    let mut content = Vec::new();
    if !text.is_empty() {
        content.push(ContentPart::Text { text: text.to_owned() });
    }
    content.extend(calls.into_iter().map(ContentPart::ToolCall));
    Message::new(Role::Assistant, content)
}
