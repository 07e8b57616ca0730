//! FRB-facing bindings for `notebox_core`.

pub mod api;
