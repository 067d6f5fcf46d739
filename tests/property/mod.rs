// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! Properties of the structural diff that must hold for every snapshot.

mod diff_properties;
