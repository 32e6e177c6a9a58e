//! # DealDesk
//!
//! A document retrieval and question-answering service for brokerage teams.
//!
//! DealDesk answers natural-language questions ("how do I handle a sublease
//! for a co-op?") by locating the relevant forms and guides in a shared
//! Google Drive, extracting bounded text from them, and synthesizing a
//! short answer with source citations.
//!
//! ## Architecture
//!
//! ```text
//! question
//!    │
//!    ▼
//! ┌───────────┐   ┌──────────┐   ┌────────┐   ┌──────────┐
//! │ Normalize │──▶│  Locate  │──▶│  Rank  │──▶│ Extract  │
//! │ terms     │   │ (tiered) │   │        │   │ (bounded)│
//! └───────────┘   └──────────┘   └────────┘   └────┬─────┘
//!                                                  │
//!                              ┌───────────────────┤
//!                              ▼                   ▼
//!                         ┌──────────┐       ┌────────────┐
//!                         │  Cite    │──────▶│ Synthesize │──▶ answer
//!                         └──────────┘       └────────────┘
//! ```
//!
//! Lookup and extraction failures degrade to smaller result sets; only an
//! empty question or a synthesis failure fails a request.
//!
//! ## Quick Start
//!
//! ```bash
//! dealdesk ask "where is the REBNY sublease form?"
//! dealdesk search "commission schedule"
//! dealdesk inspect <file-id>
//! dealdesk serve                # start the HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`query`] | Question normalization and synonym expansion |
//! | [`store`] | Document-store trait and shared types |
//! | [`drive`] | Google Drive / Docs / Sheets backend |
//! | [`locate`] | Tiered, widening candidate lookup |
//! | [`rank`] | Additive relevance scoring |
//! | [`extract`] | Multi-format bounded text extraction |
//! | [`cite`] | Citation assembly and open URLs |
//! | [`synthesize`] | Prompt construction and completion client |
//! | [`pipeline`] | End-to-end orchestration |
//! | [`server`] | JSON HTTP server |

pub mod cite;
pub mod config;
pub mod drive;
pub mod extract;
pub mod locate;
pub mod pipeline;
pub mod query;
pub mod rank;
pub mod server;
pub mod store;
pub mod synthesize;
