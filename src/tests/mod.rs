// Test modules for the multi-gen crate
//
// Test organization follows the source layout: each source module has a
// corresponding test file that focuses on behaviour verification.

// Test helper utilities (scripted adapters, fast configs)
pub mod helpers;

// Contract and error taxonomy
pub mod error;
