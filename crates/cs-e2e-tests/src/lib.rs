//! Integration tests live in `tests/`. This crate exports nothing.
