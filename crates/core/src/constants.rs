//! Constants used throughout the incident capture core crate.

/// Debounce delay for narrative auto-save, in milliseconds.
pub const DEFAULT_NARRATIVE_AUTOSAVE_MS: u64 = 3_000;

/// Debounce delay for clarification answer auto-save, in milliseconds.
pub const DEFAULT_ANSWER_AUTOSAVE_MS: u64 = 2_000;

/// Upper bound accepted for any configured debounce delay, in milliseconds.
pub const MAX_AUTOSAVE_MS: u64 = 60_000;

/// Minimum trimmed characters a phase needs for the narrative step to be complete.
pub const MIN_PHASE_CHARS: usize = 50;

/// An answer is complete when its trimmed length is strictly greater than this.
pub const ANSWER_COMPLETE_CHARS: usize = 10;

/// Longest accepted clarification answer, in characters.
pub const MAX_ANSWER_CHARS: usize = 5_000;

/// Number of questions the template generator produces per phase.
pub const QUESTIONS_PER_PHASE: usize = 3;

/// Prefix of URLs handed out for documents held by the in-memory backend.
pub const MEMORY_DOCUMENT_URL_PREFIX: &str = "memory://documents/";
