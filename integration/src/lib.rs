//! End-to-end tests for service-common live under `tests/`.

#![forbid(unsafe_code)]
