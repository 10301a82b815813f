//! Helpers for integration tests: throwaway databases and seed data for the collaborating tables.
pub mod prepare_env;
pub mod seed;
