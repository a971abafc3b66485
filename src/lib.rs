//! # memory-bank
//!
//! Local-first context capture, indexing, and retrieval for AI
//! coding-assistant sessions.
//!
//! memory-bank captures session transcripts (via a host agent's Stop
//! hook, a PTY-wrapped command, or a structured transcript import),
//! sanitizes and chunks them, indexes the chunks for semantic
//! retrieval, and assembles token-budgeted context packs a new agent
//! session can be seeded with.
//!
//! ## Modules
//!
//! - [`core`]: shared domain types (sessions, chunks, events, artifacts)
//! - [`sanitize`]: streaming ANSI/control-code sanitizer for PTY output
//! - [`transcript`]: turn extraction from structured transcripts
//! - [`chunking`]: token-bounded, overlap-aware chunking
//! - [`storage`]: on-disk layout, config, locking, session/artifact logs
//! - [`index`]: append-only vector index and cosine search
//! - [`retrieval`]: scoring, decay, boosting, and rerank
//! - [`episode`]: session classification (build/test/debug/...)
//! - [`state`]: project state summarization
//! - [`pack`]: context pack assembly and rendering
//! - [`oracle`]: the embedding/chat capability trait and its backends
//! - [`cli`]: the command-line interface

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
// Note: unsafe is needed for memory-mapped I/O (memmap2)
#![warn(unsafe_code)]

pub mod chunking;
pub mod cli;
pub mod core;
pub mod episode;
pub mod error;
pub mod index;
pub mod io;
pub mod oracle;
pub mod pack;
pub mod retrieval;
pub mod sanitize;
pub mod state;
pub mod storage;
pub mod transcript;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export core domain types
pub use core::{ArtifactKind, Chunk, ChunkKey, PtyEvent, SessionMeta, SessionSource, SourceType, SpeakerRole, Stream};

// Re-export storage types
pub use storage::{Config, Layout, Store};

// Re-export chunking types
pub use chunking::{chunk_turns, token_count};

// Re-export index types
pub use index::VectorIndex;

// Re-export retrieval types
pub use retrieval::{retrieve, RetrievalFilters, RetrievalOptions, ScoredChunk};

// Re-export episode types
pub use episode::{classify_session, Episode};

// Re-export project state types
pub use state::ProjectState;

// Re-export pack types
pub use pack::{assemble, render, ContextPack};

// Re-export oracle types
pub use oracle::{cosine_similarity, Oracle};

// Re-export CLI types
pub use cli::{execute, Cli, Commands};
