// ABOUTME: Core types and constants for the event relay server
// ABOUTME: Foundation crate with error handling and tunable default values
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Relay Core
//!
//! Foundation crate providing shared types and constants for the event relay
//! server. This crate is designed to change infrequently, enabling incremental
//! compilation benefits in the workspace.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError` and `ErrorCode`
//! - **constants**: Defaults for caches, stream limits and the HTTP surface

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Application constants organized by domain
pub mod constants;
