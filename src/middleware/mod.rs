// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (sessions, transport security).

pub mod security;
pub mod session;

pub use session::{with_session, CurrentSession};
