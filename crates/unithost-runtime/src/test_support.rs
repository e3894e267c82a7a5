//! In-process stand-in for a compiled test module
//!
//! Entry points are plain `extern "C-unwind"` functions registered under
//! Itanium-mangled names, so the whole pipeline runs without a shared library.

use crate::error::SymbolError;
use crate::ffi::abi::{
    AttributeFn, DescriptorFn, RawAttributeInfo, RawLifecycleHooks, RawMethodInfo, RawOutcome,
    RawTag, RawTestClass, METHOD_ATTRIBUTE_MARKER, OUTCOME_ASSERTION_FAILED, OUTCOME_FAULT,
    TEST_METHOD_MARKER,
};
use crate::module::ExportTable;
use std::cell::RefCell;
use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

thread_local! {
    static EVENTS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

fn record(event: &str) {
    EVENTS.with(|e| e.borrow_mut().push(event.to_string()));
}

pub fn take_events() -> Vec<String> {
    EVENTS.with(|e| std::mem::take(&mut *e.borrow_mut()))
}

pub fn events(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// `_ZN<len>Class<len>Member Ev`: a niladic static member function
pub fn mangle(class: &str, member: &str) -> String {
    format!("_ZN{}{}{}{}Ev", class.len(), class, member.len(), member)
}

/// Same as [`mangle`] but taking one `int` parameter
pub fn mangle_unary(class: &str, member: &str) -> String {
    format!("_ZN{}{}{}{}Ei", class.len(), class, member.len(), member)
}

pub fn descriptor_symbol(class: &str, method: &str) -> String {
    mangle(class, &format!("{}{}", TEST_METHOD_MARKER, method))
}

pub fn attribute_symbol(class: &str, method: &str) -> String {
    mangle(class, &format!("{}{}", METHOD_ATTRIBUTE_MARKER, method))
}

// ---------------------------------------------------------------------------
// Fake test class

#[repr(C)]
struct FakeSuite {
    header: RawTestClass,
}

static HOOKS: RawLifecycleHooks = RawLifecycleHooks {
    init_class: Some(init_class),
    cleanup_class: Some(cleanup_class),
    init_method: Some(init_method),
    cleanup_method: Some(cleanup_method),
};

static FAILING_INIT_HOOKS: RawLifecycleHooks = RawLifecycleHooks {
    init_class: Some(init_class),
    cleanup_class: Some(cleanup_class),
    init_method: Some(init_method_fails),
    cleanup_method: Some(cleanup_method),
};

unsafe extern "C-unwind" fn create_suite() -> *mut RawTestClass {
    record("create");
    Box::into_raw(Box::new(FakeSuite {
        header: RawTestClass { hooks: &HOOKS },
    })) as *mut RawTestClass
}

unsafe extern "C-unwind" fn create_suite_failing_init() -> *mut RawTestClass {
    record("create");
    Box::into_raw(Box::new(FakeSuite {
        header: RawTestClass {
            hooks: &FAILING_INIT_HOOKS,
        },
    })) as *mut RawTestClass
}

unsafe extern "C-unwind" fn create_null() -> *mut RawTestClass {
    record("create");
    std::ptr::null_mut()
}

unsafe extern "C-unwind" fn destroy_suite(instance: *mut RawTestClass) {
    record("destroy");
    drop(Box::from_raw(instance as *mut FakeSuite));
}

unsafe extern "C-unwind" fn init_class(_: *mut RawTestClass, _: *mut RawOutcome) {
    record("init_class");
}

unsafe extern "C-unwind" fn cleanup_class(_: *mut RawTestClass, _: *mut RawOutcome) {
    record("cleanup_class");
}

unsafe extern "C-unwind" fn init_method(_: *mut RawTestClass, _: *mut RawOutcome) {
    record("init_method");
}

unsafe extern "C-unwind" fn init_method_fails(_: *mut RawTestClass, outcome: *mut RawOutcome) {
    record("init_method");
    (*outcome).kind = OUTCOME_FAULT;
    (*outcome).message = c"fixture unavailable".as_ptr();
}

unsafe extern "C-unwind" fn cleanup_method(_: *mut RawTestClass, _: *mut RawOutcome) {
    record("cleanup_method");
}

unsafe extern "C-unwind" fn body_pass(_: *mut RawTestClass, _: *mut RawOutcome) {
    record("body");
}

unsafe extern "C-unwind" fn body_assert(_: *mut RawTestClass, outcome: *mut RawOutcome) {
    record("body");
    (*outcome).kind = OUTCOME_ASSERTION_FAILED;
    (*outcome).message = c"expected 1 got 2".as_ptr();
}

unsafe extern "C-unwind" fn body_fault(_: *mut RawTestClass, outcome: *mut RawOutcome) {
    record("body");
    (*outcome).kind = OUTCOME_FAULT;
    (*outcome).message = c"std::bad_alloc".as_ptr();
}

unsafe extern "C-unwind" fn body_panic(_: *mut RawTestClass, _: *mut RawOutcome) {
    record("body");
    panic!("boom");
}

// ---------------------------------------------------------------------------
// Descriptor entry points

static PASS_INFO: RawMethodInfo = RawMethodInfo {
    invoke: Some(body_pass),
    create: Some(create_suite),
    destroy: Some(destroy_suite),
};

static ASSERT_INFO: RawMethodInfo = RawMethodInfo {
    invoke: Some(body_assert),
    create: Some(create_suite),
    destroy: Some(destroy_suite),
};

static FAULT_INFO: RawMethodInfo = RawMethodInfo {
    invoke: Some(body_fault),
    create: Some(create_suite),
    destroy: Some(destroy_suite),
};

static PANIC_INFO: RawMethodInfo = RawMethodInfo {
    invoke: Some(body_panic),
    create: Some(create_suite),
    destroy: Some(destroy_suite),
};

static FAILING_INIT_INFO: RawMethodInfo = RawMethodInfo {
    invoke: Some(body_pass),
    create: Some(create_suite_failing_init),
    destroy: Some(destroy_suite),
};

static NO_INVOKE_INFO: RawMethodInfo = RawMethodInfo {
    invoke: None,
    create: Some(create_suite),
    destroy: Some(destroy_suite),
};

static NULL_INSTANCE_INFO: RawMethodInfo = RawMethodInfo {
    invoke: Some(body_pass),
    create: Some(create_null),
    destroy: Some(destroy_suite),
};

pub unsafe extern "C-unwind" fn descriptor_pass() -> *const RawMethodInfo {
    &PASS_INFO
}

pub unsafe extern "C-unwind" fn descriptor_assert() -> *const RawMethodInfo {
    &ASSERT_INFO
}

pub unsafe extern "C-unwind" fn descriptor_fault() -> *const RawMethodInfo {
    &FAULT_INFO
}

pub unsafe extern "C-unwind" fn descriptor_panic() -> *const RawMethodInfo {
    &PANIC_INFO
}

pub unsafe extern "C-unwind" fn descriptor_failing_init() -> *const RawMethodInfo {
    &FAILING_INIT_INFO
}

pub unsafe extern "C-unwind" fn descriptor_no_invoke() -> *const RawMethodInfo {
    &NO_INVOKE_INFO
}

pub unsafe extern "C-unwind" fn descriptor_null_instance() -> *const RawMethodInfo {
    &NULL_INSTANCE_INFO
}

pub unsafe extern "C-unwind" fn descriptor_null() -> *const RawMethodInfo {
    std::ptr::null()
}

// ---------------------------------------------------------------------------
// Attribute providers

fn leak_attributes(
    ignore: bool,
    ignore_on_platform: bool,
    tags: Vec<RawTag>,
) -> *const RawAttributeInfo {
    let tags: &'static [RawTag] = Box::leak(tags.into_boxed_slice());
    Box::leak(Box::new(RawAttributeInfo {
        ignore,
        ignore_on_platform,
        tags: tags.as_ptr(),
        tag_count: tags.len(),
    }))
}

pub unsafe extern "C-unwind" fn attributes_ignore() -> *const RawAttributeInfo {
    leak_attributes(true, false, Vec::new())
}

pub unsafe extern "C-unwind" fn attributes_ignore_on_platform() -> *const RawAttributeInfo {
    leak_attributes(false, true, Vec::new())
}

pub unsafe extern "C-unwind" fn attributes_tagged() -> *const RawAttributeInfo {
    leak_attributes(
        false,
        false,
        vec![
            RawTag {
                key: c"Priority".as_ptr(),
                value: c"1".as_ptr(),
            },
            RawTag {
                key: c"Owner".as_ptr(),
                value: c"qa".as_ptr(),
            },
        ],
    )
}

pub unsafe extern "C-unwind" fn attributes_panic() -> *const RawAttributeInfo {
    panic!("attribute provider exploded");
}

pub unsafe extern "C-unwind" fn attributes_null() -> *const RawAttributeInfo {
    std::ptr::null()
}

// ---------------------------------------------------------------------------
// Fake module

/// An [`ExportTable`] backed by function pointers in this test binary
pub struct FakeModule {
    path: PathBuf,
    names: Vec<String>,
    addresses: Vec<Option<NonNull<c_void>>>,
}

impl FakeModule {
    pub fn new() -> Self {
        Self {
            path: PathBuf::from("libfake_suite.so"),
            names: Vec::new(),
            addresses: Vec::new(),
        }
    }

    pub fn test(self, class: &str, method: &str, descriptor: DescriptorFn) -> Self {
        let name = descriptor_symbol(class, method);
        self.export(name, descriptor as *mut c_void)
    }

    pub fn attributes(self, class: &str, method: &str, provider: AttributeFn) -> Self {
        let name = attribute_symbol(class, method);
        self.export(name, provider as *mut c_void)
    }

    /// Export a name with an arbitrary address
    pub fn export(mut self, name: impl Into<String>, address: *mut c_void) -> Self {
        self.names.push(name.into());
        self.addresses.push(NonNull::new(address));
        self
    }

    /// Listed in the export table but not resolvable
    pub fn dangling(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self.addresses.push(None);
        self
    }
}

impl ExportTable for FakeModule {
    fn path(&self) -> &Path {
        &self.path
    }

    fn exports(&self) -> &[String] {
        &self.names
    }

    fn address(&self, symbol: &str) -> Result<NonNull<c_void>, SymbolError> {
        let index = self
            .names
            .iter()
            .position(|n| n == symbol)
            .ok_or_else(|| SymbolError::Unresolved {
                symbol: symbol.to_string(),
                reason: "not exported".to_string(),
            })?;

        self.addresses[index].ok_or_else(|| SymbolError::Unresolved {
            symbol: symbol.to_string(),
            reason: "dangling export".to_string(),
        })
    }
}

/// `Suite::T1` passes, `Suite::T2` is ignored, `Suite::T3` fails an assertion
pub fn scenario_a() -> FakeModule {
    // Registration order is deliberately not the run order.
    FakeModule::new()
        .test("Suite", "T3", descriptor_assert)
        .attributes("Suite", "T2", attributes_ignore)
        .test("Suite", "T1", descriptor_pass)
        .test("Suite", "T2", descriptor_assert)
        .export("_ZN5Suite6helperEv", descriptor_pass as *mut c_void)
        .export("main", std::ptr::null_mut())
}
