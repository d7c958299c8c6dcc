// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits describing what the system works
// with: recordings, run state, collaborator contracts, errors.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits

// Error taxonomy shared by every layer below the CLI
pub mod error;

// An annotated recording (features + frame labels)
pub mod recording;

// Model kind and split method choices
pub mod selector;

// Epoch and step counters owned by the orchestrator
pub mod state;

// Collaborator contracts: recording sources and metrics sinks
pub mod traits;
