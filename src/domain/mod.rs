// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// This is the heart of the application — plain Rust structs,
// enums, and traits that define the core concepts of the
// forecasting system.
//
// Rules for this layer:
//   - NO file I/O or network calls
//   - NO serving or persistence code
//   - Only data shapes, the column schema, the error
//     taxonomy, and the trait seams other layers implement
//
// Why keep this layer pure?
//   - Easy to unit test (no disk, no fixtures)
//   - Easy to understand (no framework noise)
//   - Easy to swap implementations (just implement the trait)
//
// Think of this layer as the "dictionary" of the system —
// it defines what things ARE, not how they work.
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Raw source-table rows and the merged record type
pub mod record;

// The canonical feature column schema (order is the contract)
pub mod schema;

// The closed error taxonomy for the whole pipeline
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;
