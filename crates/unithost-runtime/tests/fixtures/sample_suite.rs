//! A test module as the macro layer would emit it, compiled on demand as a cdylib
//!
//! Class `Suite`:
//! - `T1` passes
//! - `T2` is marked ignore through its attribute provider
//! - `T3` fails with "expected 1 got 2"

#![allow(dead_code)]

use std::os::raw::c_char;

type Invoke = unsafe extern "C-unwind" fn(*mut TestClass, *mut Outcome);
type Create = unsafe extern "C-unwind" fn() -> *mut TestClass;
type Destroy = unsafe extern "C-unwind" fn(*mut TestClass);

#[repr(C)]
pub struct MethodInfo {
    invoke: Option<Invoke>,
    create: Option<Create>,
    destroy: Option<Destroy>,
}

#[repr(C)]
pub struct Hooks {
    init_class: Option<Invoke>,
    cleanup_class: Option<Invoke>,
    init_method: Option<Invoke>,
    cleanup_method: Option<Invoke>,
}

#[repr(C)]
pub struct TestClass {
    hooks: *const Hooks,
}

#[repr(C)]
pub struct Outcome {
    kind: u32,
    message: *const c_char,
}

#[repr(C)]
pub struct Tag {
    key: *const c_char,
    value: *const c_char,
}

#[repr(C)]
pub struct AttributeInfo {
    ignore: bool,
    ignore_on_platform: bool,
    tags: *const Tag,
    tag_count: usize,
}

// Only ever read, and every pointer targets a 'static literal.
unsafe impl Sync for AttributeInfo {}

const ASSERTION_FAILED: u32 = 1;

static HOOKS: Hooks = Hooks {
    init_class: Some(init_class),
    cleanup_class: None,
    init_method: None,
    cleanup_method: None,
};

unsafe extern "C-unwind" fn init_class(_: *mut TestClass, _: *mut Outcome) {}

unsafe extern "C-unwind" fn create() -> *mut TestClass {
    Box::into_raw(Box::new(TestClass { hooks: &HOOKS }))
}

unsafe extern "C-unwind" fn destroy(instance: *mut TestClass) {
    drop(Box::from_raw(instance));
}

unsafe extern "C-unwind" fn passes(_: *mut TestClass, _: *mut Outcome) {}

unsafe extern "C-unwind" fn fails(_: *mut TestClass, outcome: *mut Outcome) {
    (*outcome).kind = ASSERTION_FAILED;
    (*outcome).message = c"expected 1 got 2".as_ptr();
}

static PASSING: MethodInfo = MethodInfo {
    invoke: Some(passes),
    create: Some(create),
    destroy: Some(destroy),
};

static FAILING: MethodInfo = MethodInfo {
    invoke: Some(fails),
    create: Some(create),
    destroy: Some(destroy),
};

static IGNORED: AttributeInfo = AttributeInfo {
    ignore: true,
    ignore_on_platform: false,
    tags: std::ptr::null(),
    tag_count: 0,
};

#[export_name = "_ZN5Suite22__GetTestMethodInfo_T1Ev"]
pub extern "C-unwind" fn suite_t1() -> *const MethodInfo {
    &PASSING
}

#[export_name = "_ZN5Suite22__GetTestMethodInfo_T2Ev"]
pub extern "C-unwind" fn suite_t2() -> *const MethodInfo {
    &PASSING
}

#[export_name = "_ZN5Suite27__GetMethodAttributeInfo_T2Ev"]
pub extern "C-unwind" fn suite_t2_attributes() -> *const AttributeInfo {
    &IGNORED
}

#[export_name = "_ZN5Suite22__GetTestMethodInfo_T3Ev"]
pub extern "C-unwind" fn suite_t3() -> *const MethodInfo {
    &FAILING
}

/// Not a test: no marker in its name
#[no_mangle]
pub extern "C" fn sample_suite_version() -> u32 {
    1
}
