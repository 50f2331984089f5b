//! Vulkan backend for transient placement
//!
//! This module provides a Vulkan implementation of the [`TransientDevice`](super::TransientDevice)
//! trait using the ash crate.

pub mod device;

pub use device::VulkanTransientDevice;
