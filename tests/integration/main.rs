//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters.  All tests run on the host (x86_64) with no
//! radio required.

mod classifier_tests;
mod mock_radio;
mod orchestrator_tests;
