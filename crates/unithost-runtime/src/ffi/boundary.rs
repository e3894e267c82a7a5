//! Fault-isolated calls into module code
//!
//! Every function pointer obtained from a module passes through this file.
//! Pointers are validated non-null before first use, and every call runs under
//! `catch_unwind` so an unwinding fault becomes a typed value instead of
//! tearing down the host.

use super::abi::{
    AttributeFn, CreateFn, DescriptorFn, DestroyFn, HookFn, InvokeFn, RawLifecycleHooks,
    RawOutcome, RawTestClass, OUTCOME_ASSERTION_FAILED, OUTCOME_FAULT, OUTCOME_OK,
};
use crate::attributes::AttributeInfo;
use std::any::Any;
use std::ffi::{c_void, CStr};
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::ptr::NonNull;
use thiserror::Error;
use tracing::warn;

/// Result of one call into a test body or lifecycle hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallStatus {
    /// Returned normally
    Completed,
    /// The module reported an assertion failure with this message
    AssertionFailed(String),
    /// Anything else went wrong; the string is diagnostic detail only
    Fault(String),
}

impl CallStatus {
    /// Decode the out-parameter written by the module
    ///
    /// # Safety
    ///
    /// `outcome.message` must be null or point to a NUL-terminated string that
    /// is still alive.
    unsafe fn from_raw(outcome: &RawOutcome) -> Self {
        match outcome.kind {
            OUTCOME_OK => CallStatus::Completed,
            OUTCOME_ASSERTION_FAILED => {
                let message = copy_c_string(outcome.message);
                if message.is_empty() {
                    CallStatus::AssertionFailed("Assertion failed".to_string())
                } else {
                    CallStatus::AssertionFailed(message)
                }
            }
            OUTCOME_FAULT => CallStatus::Fault(copy_c_string(outcome.message)),
            other => CallStatus::Fault(format!("unknown outcome kind {}", other)),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, CallStatus::Completed)
    }
}

/// Failures while binding or instantiating a test
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoundaryError {
    #[error("Descriptor entry point returned null")]
    NullDescriptor,

    #[error("Method info has a null {0} pointer")]
    NullPointer(&'static str),

    #[error("Class factory returned a null instance")]
    NullInstance,

    #[error("Attribute provider returned null")]
    NullAttributes,

    #[error("Fault in {call}: {detail}")]
    Fault { call: &'static str, detail: String },
}

/// Lifecycle hooks of a test class, in the order the invoker runs them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    InitClass,
    InitMethod,
    CleanupMethod,
    CleanupClass,
}

impl Hook {
    pub fn name(self) -> &'static str {
        match self {
            Hook::InitClass => "class initialize",
            Hook::InitMethod => "method initialize",
            Hook::CleanupMethod => "method cleanup",
            Hook::CleanupClass => "class cleanup",
        }
    }

    fn select(self, hooks: &RawLifecycleHooks) -> Option<HookFn> {
        match self {
            Hook::InitClass => hooks.init_class,
            Hook::InitMethod => hooks.init_method,
            Hook::CleanupMethod => hooks.cleanup_method,
            Hook::CleanupClass => hooks.cleanup_class,
        }
    }
}

/// The validated construct/invoke/destroy triple of one test
#[derive(Debug, Clone, Copy)]
pub struct BoundTest {
    invoke: InvokeFn,
    create: CreateFn,
    destroy: DestroyFn,
}

impl BoundTest {
    /// Call a descriptor entry point and validate the triple it returns
    ///
    /// # Safety
    ///
    /// `address` must be the address of a function with the [`DescriptorFn`]
    /// signature, and the module that owns it must stay loaded for as long as
    /// the returned binding or any instance created from it is used.
    pub unsafe fn bind(address: NonNull<c_void>) -> Result<Self, BoundaryError> {
        let descriptor = std::mem::transmute::<*mut c_void, DescriptorFn>(address.as_ptr());
        let info = guarded("descriptor", || descriptor())?;
        let info = info.as_ref().ok_or(BoundaryError::NullDescriptor)?;

        Ok(Self {
            invoke: info.invoke.ok_or(BoundaryError::NullPointer("invoke"))?,
            create: info.create.ok_or(BoundaryError::NullPointer("create"))?,
            destroy: info.destroy.ok_or(BoundaryError::NullPointer("destroy"))?,
        })
    }

    /// Construct a fresh class instance
    pub fn instantiate(&self) -> Result<TestInstance, BoundaryError> {
        let create = self.create;
        let raw = guarded("create", || unsafe { create() })?;
        let raw = NonNull::new(raw).ok_or(BoundaryError::NullInstance)?;

        Ok(TestInstance {
            raw,
            invoke: self.invoke,
            destroy: self.destroy,
            released: false,
        })
    }
}

/// One live class instance, destroyed exactly once
///
/// Dropping an instance that was not explicitly destroyed still releases it
/// through the module's destructor.
#[derive(Debug)]
pub struct TestInstance {
    raw: NonNull<RawTestClass>,
    invoke: InvokeFn,
    destroy: DestroyFn,
    released: bool,
}

impl TestInstance {
    /// Run a lifecycle hook; a missing hook completes immediately
    pub fn run_hook(&mut self, hook: Hook) -> CallStatus {
        // SAFETY: `raw` came from the module's factory and is alive until release.
        let hooks = unsafe { self.raw.as_ref().hooks.as_ref() };
        match hooks.and_then(|h| hook.select(h)) {
            Some(f) => self.call(hook.name(), f),
            None => CallStatus::Completed,
        }
    }

    /// Run the test body
    pub fn invoke(&mut self) -> CallStatus {
        self.call("test body", self.invoke)
    }

    /// Release the instance through the module's destructor
    pub fn destroy(mut self) -> Result<(), BoundaryError> {
        self.release()
    }

    fn call(&mut self, what: &'static str, f: HookFn) -> CallStatus {
        let raw = self.raw.as_ptr();
        let mut outcome = RawOutcome::default();
        match guarded(what, || unsafe { f(raw, &mut outcome) }) {
            // SAFETY: message strings live until the instance is destroyed.
            Ok(()) => unsafe { CallStatus::from_raw(&outcome) },
            Err(err) => CallStatus::Fault(err.to_string()),
        }
    }

    fn release(&mut self) -> Result<(), BoundaryError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let raw = self.raw.as_ptr();
        let destroy = self.destroy;
        guarded("destroy", || unsafe { destroy(raw) })
    }
}

impl Drop for TestInstance {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(error = %err, "test instance destructor faulted");
        }
    }
}

/// Call an attribute provider and copy out what it returns
///
/// # Safety
///
/// `address` must be the address of a function with the [`AttributeFn`]
/// signature whose module is loaded for the duration of the call.
pub unsafe fn read_attributes(address: NonNull<c_void>) -> Result<AttributeInfo, BoundaryError> {
    let provider = std::mem::transmute::<*mut c_void, AttributeFn>(address.as_ptr());
    let raw = guarded("attribute provider", || provider())?;
    let raw = raw.as_ref().ok_or(BoundaryError::NullAttributes)?;

    let mut info = AttributeInfo {
        ignore: raw.ignore,
        ignore_on_platform: raw.ignore_on_platform,
        ..AttributeInfo::default()
    };

    if !raw.tags.is_null() && raw.tag_count > 0 {
        for tag in std::slice::from_raw_parts(raw.tags, raw.tag_count) {
            info.tags
                .insert(copy_c_string(tag.key), copy_c_string(tag.value));
        }
    }

    Ok(info)
}

fn guarded<R>(call: &'static str, f: impl FnOnce() -> R) -> Result<R, BoundaryError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| BoundaryError::Fault {
        call,
        detail: panic_message(payload.as_ref()),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Copy a module-owned C string; null becomes the empty string
unsafe fn copy_c_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}
