//! Common test utilities for weabase.
//!
//! This module provides shared utilities for testing the weabase library and server.
#![allow(dead_code)]

pub mod assertions;
pub mod http_client;
pub mod test_data;
