//! Build integration tests: full builds followed by quick builds against a
//! scripted project.

mod common;

mod hijack_tests;
mod invalidation_tests;
mod rebuild_tests;
