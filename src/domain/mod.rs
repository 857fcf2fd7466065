// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that describe what the system works on:
// character drawings, one-shot tasks, and the traits the
// other layers implement.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// One drawing of one character
pub mod glyph;

// An N-way one-shot classification task
pub mod task;

// Core abstractions (traits) that other layers implement
pub mod traits;
