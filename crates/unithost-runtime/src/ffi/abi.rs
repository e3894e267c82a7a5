//! C-compatible contract shared with test modules
//!
//! A module exports, per test method, a niladic descriptor entry point whose
//! mangled name contains [`TEST_METHOD_MARKER`]. Replacing that marker with
//! [`METHOD_ATTRIBUTE_MARKER`] names the optional attribute provider for the
//! same method.
//!
//! All pointers handed out by the module stay owned by the module. Strings are
//! NUL-terminated and only need to outlive the call that returned them (outcome
//! messages: until the instance is destroyed).

use std::os::raw::c_char;

/// Marker embedded in every test descriptor export name
pub const TEST_METHOD_MARKER: &str = "__GetTestMethodInfo_";

/// Marker embedded in every attribute provider export name
pub const METHOD_ATTRIBUTE_MARKER: &str = "__GetMethodAttributeInfo_";

/// `RawOutcome::kind` for a call that returned normally
pub const OUTCOME_OK: u32 = 0;
/// `RawOutcome::kind` for an assertion failure raised by the test
pub const OUTCOME_ASSERTION_FAILED: u32 = 1;
/// `RawOutcome::kind` for any other fault caught inside the module
pub const OUTCOME_FAULT: u32 = 2;

pub type DescriptorFn = unsafe extern "C-unwind" fn() -> *const RawMethodInfo;
pub type AttributeFn = unsafe extern "C-unwind" fn() -> *const RawAttributeInfo;
pub type CreateFn = unsafe extern "C-unwind" fn() -> *mut RawTestClass;
pub type DestroyFn = unsafe extern "C-unwind" fn(*mut RawTestClass);
pub type InvokeFn = unsafe extern "C-unwind" fn(*mut RawTestClass, *mut RawOutcome);
pub type HookFn = unsafe extern "C-unwind" fn(*mut RawTestClass, *mut RawOutcome);

/// Returned by a descriptor entry point
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawMethodInfo {
    /// The bound test body
    pub invoke: Option<InvokeFn>,
    /// Factory for a fresh class instance
    pub create: Option<CreateFn>,
    /// Releases an instance produced by `create`
    pub destroy: Option<DestroyFn>,
}

/// Header every test class instance starts with
#[repr(C)]
#[derive(Debug)]
pub struct RawTestClass {
    pub hooks: *const RawLifecycleHooks,
}

/// Per-class lifecycle hooks; a `None` slot is a no-op
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct RawLifecycleHooks {
    pub init_class: Option<HookFn>,
    pub cleanup_class: Option<HookFn>,
    pub init_method: Option<HookFn>,
    pub cleanup_method: Option<HookFn>,
}

/// Out-parameter filled by the test body and hooks
#[repr(C)]
#[derive(Debug)]
pub struct RawOutcome {
    pub kind: u32,
    pub message: *const c_char,
}

impl Default for RawOutcome {
    fn default() -> Self {
        Self {
            kind: OUTCOME_OK,
            message: std::ptr::null(),
        }
    }
}

/// Returned by an attribute provider
#[repr(C)]
#[derive(Debug)]
pub struct RawAttributeInfo {
    pub ignore: bool,
    pub ignore_on_platform: bool,
    pub tags: *const RawTag,
    pub tag_count: usize,
}

#[repr(C)]
#[derive(Debug)]
pub struct RawTag {
    pub key: *const c_char,
    pub value: *const c_char,
}
