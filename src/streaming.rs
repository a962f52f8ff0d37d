//! Transcript assembly from streamed delta and done fragments.

use std::collections::HashMap;

use futures::stream::BoxStream;
use futures::StreamExt;

use crate::error::RealtimeError;
use crate::events::{FragmentKind, ServerEvent};

/// Where a piece of transcript text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptSource {
    /// `response.text.*`
    Text,
    /// `response.audio_transcript.*`
    AudioTranscript,
    /// Transcription of the user's input audio.
    InputTranscription,
}

/// Text accumulated for one content part of one item.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    pub item_id: String,
    pub content_index: u32,
    pub source: TranscriptSource,
    pub text: String,
    pub done: bool,
}

/// One change applied by [`TranscriptAssembler::push`].
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptUpdate {
    pub item_id: String,
    pub source: TranscriptSource,
    pub kind: FragmentKind,
    /// The fragment for deltas, the final text for done events.
    pub text: String,
}

/// Folds fragments into per-item text in arrival order.
///
/// A done event replaces whatever deltas accumulated for the same item and
/// content index, since the server's final text is authoritative.
#[derive(Debug, Default, Clone)]
pub struct TranscriptAssembler {
    entries: Vec<TranscriptEntry>,
    positions: HashMap<(String, u32), usize>,
}

impl TranscriptAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `event`. Returns `None` for events that carry no transcript text.
    pub fn push(&mut self, event: &ServerEvent) -> Option<TranscriptUpdate> {
        let (item_id, content_index, source, kind, text) = match event {
            ServerEvent::ResponseTextDelta(e) => {
                (&e.item_id, e.content_index, TranscriptSource::Text, FragmentKind::Delta, &e.delta)
            }
            ServerEvent::ResponseTextDone(e) => {
                (&e.item_id, e.content_index, TranscriptSource::Text, FragmentKind::Done, &e.text)
            }
            ServerEvent::ResponseAudioTranscriptDelta(e) => (
                &e.item_id,
                e.content_index,
                TranscriptSource::AudioTranscript,
                FragmentKind::Delta,
                &e.delta,
            ),
            ServerEvent::ResponseAudioTranscriptDone(e) => (
                &e.item_id,
                e.content_index,
                TranscriptSource::AudioTranscript,
                FragmentKind::Done,
                &e.transcript,
            ),
            ServerEvent::InputAudioTranscriptionCompleted(e) => (
                &e.item_id,
                e.content_index,
                TranscriptSource::InputTranscription,
                FragmentKind::Done,
                &e.transcript,
            ),
            _ => return None,
        };

        let entry = self.entry_mut(item_id, content_index, source);
        match kind {
            FragmentKind::Delta => entry.text.push_str(text),
            FragmentKind::Done => {
                entry.text.clone_from(text);
                entry.done = true;
            }
        }

        Some(TranscriptUpdate {
            item_id: item_id.clone(),
            source,
            kind,
            text: text.clone(),
        })
    }

    fn entry_mut(
        &mut self,
        item_id: &str,
        content_index: u32,
        source: TranscriptSource,
    ) -> &mut TranscriptEntry {
        let key = (item_id.to_string(), content_index);
        let index = match self.positions.get(&key) {
            Some(index) => *index,
            None => {
                self.entries.push(TranscriptEntry {
                    item_id: item_id.to_string(),
                    content_index,
                    source,
                    text: String::new(),
                    done: false,
                });
                self.positions.insert(key, self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[index]
    }

    /// All text gathered for `item_id` so far, across content parts.
    pub fn text(&self, item_id: &str) -> Option<String> {
        let mut parts = self
            .entries
            .iter()
            .filter(|entry| entry.item_id == item_id)
            .peekable();
        parts.peek()?;
        Some(parts.map(|entry| entry.text.as_str()).collect())
    }

    /// Whether every content part seen for `item_id` has its done event.
    pub fn is_done(&self, item_id: &str) -> bool {
        let mut parts = self.entries.iter().filter(|e| e.item_id == item_id).peekable();
        parts.peek().is_some() && parts.all(|entry| entry.done)
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Entries joined by newlines, in first-seen order.
    pub fn transcript(&self) -> String {
        self.entries
            .iter()
            .map(|entry| entry.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.positions.clear();
    }
}

/// Turn a stream of server events into transcript updates, dropping
/// events that carry no text. Stops after the first error.
pub fn transcript_updates(
    events: BoxStream<'static, Result<ServerEvent, RealtimeError>>,
) -> BoxStream<'static, Result<TranscriptUpdate, RealtimeError>> {
    let updates = async_stream::stream! {
        let mut assembler = TranscriptAssembler::new();
        let mut inner = std::pin::pin!(events);
        while let Some(item) = inner.next().await {
            match item {
                Ok(event) => {
                    if let Some(update) = assembler.push(&event) {
                        yield Ok(update);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    };
    Box::pin(updates)
}
