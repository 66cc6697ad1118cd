//! # coding-expert - ReAct coding agent over HTTP
//!
//! coding-expert answers programming questions by running a ReAct loop: the LLM
//! thinks, calls one of the registered tools (static analysis, sandboxed
//! execution, documentation and Q&A search, a calculator), observes the result and
//! repeats until it can give a final answer or runs out of steps or time.
//!
//! ## Quickstart
//!
//! ```bash
//! export LLM_API_KEY="your-key"
//! coding-expert serve --port 8080
//!
//! curl -s localhost:8080/api/v1/coding/ask \
//!   -H 'content-type: application/json' \
//!   -d '{"query": "Why does this Go slice alias its parent?"}'
//! ```
//!
//! Long-lived settings go in `coding-expert.toml`:
//!
//! ```toml
//! [agent]
//! max_steps = 8
//! timeout_seconds = 90
//!
//! [sandbox]
//! languages = ["go", "python"]
//! ```
//!
//! ## Architecture Overview
//!
//! - `coding-expert-core/` holds the agent loop, tool and language registries,
//!   the sandbox, the LLM contract, retrieval and configuration.
//! - `src/server/` exposes the core over axum under `/api/v1`.
//! - `src/main.rs` wires configuration, logging and signals together.

pub mod cli;
pub mod server;

pub use server::{router, serve, shutdown_signal};
