// Copyright 2020 Google LLC
//
// Use of this source code is governed by an MIT-style license that can be found
// in the LICENSE file or at https://opensource.org/licenses/MIT.

//! Handler for the file finder action.
//!
//! The handler finds filesystem objects matching path expressions and reports
//! them, optionally hashing or downloading their contents.
//! Features supported by this handler:
//! - Resolve glob expressions in paths e.g. `/a?[!d]*` match `/abcd`.
//! - Resolve recursive elements in glob expressions e.g. `/**` match `/a/b`.
//! - Resolve alternatives in paths e.g. `/a{b,c}d` match `/abd` and `/acd`.
//! - Filter the results by metadata (size, times, extension) and by contents
//!   (literal or regex matches, scanned in overlapping chunks).
//!
//! Expression expansion (like `%%hostname%%` visible in the GRR Admin UI)
//! is performed on the server side, so it's out of scope of this handler.

pub mod action;
pub mod chunks;
pub mod condition;
pub mod download;
pub mod error;
pub mod glob;
pub mod groups;
pub mod hash;
pub mod path;
pub mod request;
pub mod resolve;
pub mod response;
pub mod stat;
pub mod task;

pub use action::{handle, Skip};
pub use request::Request;

// Life of a path:
// - request paths are `String`s,
// - path groups are expanded, the type is still a `String`,
// - the path is converted to a `Task`, in which the constant part of the path
//   is stored as a `PathBuf` and glob parts are stored as a `Regex`,
// - tasks are resolved into `Entry`s, which are checked against conditions,
// - entries meeting all conditions become `Response`s.
