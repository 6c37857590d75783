// Drachen
// Copyright (c) The Project Drachen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Shared support for project Drachen.
//!
//! This crate provides the byte-level I/O traits and streams, and the common
//! error type, used by the Drachen frame-stream codec. It contains nothing
//! specific to the Drachen container format itself.

pub mod errors;
pub mod io;
