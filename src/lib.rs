//! # devhelper
//!
//! Retrieval-augmented question answering over a codebase.
//!
//! devhelper ingests a local directory, a repository snapshot, or a
//! webpage; splits the text into overlapping chunks (README chunks are
//! boosted); embeds the chunks into a persistent vector index keyed by a
//! content fingerprint; and answers questions by routing them to either
//! a whole-project summary or a standard top-k retrieval-QA prompt.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌─────────────────┐
//! │   Sources    │──▶│   Pipeline    │──▶│  Vector index   │
//! │ dir/repo/web │   │ load + chunk  │   │ <fingerprint>/  │
//! └──────────────┘   └───────────────┘   └───────┬─────────┘
//!                                                │
//!                       ┌────────────────────────┤
//!                       ▼                        ▼
//!                 ┌───────────┐           ┌────────────┐
//!                 │  Summary  │           │ Retrieval  │
//!                 │   route   │           │ QA route   │
//!                 └───────────┘           └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! devh index ./my-project                # build the vector index
//! devh ask ./my-project "what does this repo do?"
//! devh chat https://github.com/o/r      # interactive session over a repo
//! devh suggest ./my-project              # recommend chunking parameters
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and deployment policy |
//! | [`models`] | Core data types |
//! | [`loader`] | Filesystem content loading with binary detection |
//! | [`fetch`] | Repository snapshot and webpage fetchers |
//! | [`advisor`] | Size-based chunking parameter suggestions |
//! | [`chunker`] | Recursive text splitting with overlap |
//! | [`embedding`] | Embedding engine abstraction |
//! | [`index`] | Fingerprinted persistent vector index |
//! | [`llm`] | Language-model backend abstraction |
//! | [`router`] | Summary vs. retrieval-QA question routing |
//! | [`history`] | Chat transcript recording |
//! | [`error`] | Crate-wide error taxonomy |

pub mod advisor;
pub mod chunker;
pub mod config;
pub mod embedding;
pub mod error;
pub mod fetch;
pub mod history;
pub mod index;
pub mod llm;
pub mod loader;
pub mod models;
pub mod router;
