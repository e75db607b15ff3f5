// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Handles all cross-cutting concerns that don't belong in
// any specific business layer:
//
//   artifact_store.rs — Versioned persistence for the fitted
//                       preprocessor/model pair. Each version
//                       is an immutable directory with a
//                       checksummed manifest; latest.json
//                       promotes exactly one of them.
//
// Why is this a separate layer?
//   Persistence is used by both training (save) and serving
//   (load) but belongs to neither. Keeping it here:
//   - Prevents duplication across layers
//   - Makes it easy to swap implementations
//     (e.g. swap the directory layout for S3 cloud storage)
//   - Keeps other layers focused on their core logic
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)

/// Versioned artifact saving, loading and promotion
pub mod artifact_store;
