//! Workspace root package. Hosts the git hooks installed by `cargo-husky`.
