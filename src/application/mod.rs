// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (training a detector, inspecting a run).
//
// Rules for this layer:
//   - No tensor math or model code here
//   - No argument parsing or printing here (that's Layer 1)
//   - Only workflow coordination and configuration
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Run configuration and its validation
pub mod config;

// The training workflow
pub mod train_use_case;

// Listing a run's checkpoints
pub mod checkpoints_use_case;
