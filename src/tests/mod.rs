//! Integration tests compiled into the library's test binary rather
//! than `tests/`, so they get `#[cfg(test)]` access to crate internals
//! (harness helpers build a `ConnectionContext` directly instead of
//! going through `main`) and a single compile unit for fast iteration.

mod common;

mod backend_sql_test;
mod protocol_scenarios;
mod tls_scenarios;
