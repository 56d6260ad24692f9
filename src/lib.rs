//! Workspace meta-package. The actual code lives in the `banter-*` crates
//! under `crates/`; this package only anchors workspace-wide tooling.
