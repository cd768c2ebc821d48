//! Workspace root crate. Holds only shared dev tooling config; all
//! functionality lives in the `crates/*` workspace members.
