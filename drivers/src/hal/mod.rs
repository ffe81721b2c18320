//! Hardware Abstraction Layer (HAL) - Platform-Independent Traits
//!
//! This module defines the generic storage traits. They are implemented
//! by concrete device drivers and by the partition layer, so filesystem
//! code can be written without knowing whether it sits on a whole disk
//! or on a slice of one.
//!
//! # Available Interfaces
//!
//! - [`block_device`]: Block storage device access

pub mod block_device;
