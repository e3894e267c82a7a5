//! Cross-module call infrastructure
//!
//! The test module and the host agree on a C-compatible contract:
//! - Descriptor and attribute entry points ([`abi`])
//! - Validated, fault-isolated calls through that contract ([`boundary`])
//!
//! # Safety
//!
//! Every call into module code is `unsafe`. All of it is isolated in
//! [`boundary`] behind safe wrappers; the rest of the crate never touches a raw
//! function pointer.

pub mod abi;
pub mod boundary;

pub use abi::{
    RawAttributeInfo, RawLifecycleHooks, RawMethodInfo, RawOutcome, RawTag, RawTestClass,
    METHOD_ATTRIBUTE_MARKER, TEST_METHOD_MARKER,
};
pub use boundary::{BoundTest, BoundaryError, CallStatus, Hook, TestInstance};
