//! Module binding
//!
//! A test module is opened once per run. Its export table is read from the file
//! with `object`, and the live binding used to resolve addresses comes from
//! `libloading`. Both happen in [`ModuleHandle::open`], so a module that cannot
//! be scanned is never mapped into the process.

use crate::error::{LoadError, SymbolError};
use libloading::Library;
use object::{BinaryFormat, Object};
use std::ffi::c_void;
use std::fs;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use tracing::debug;

/// Exported names of a module plus on-demand address lookup
///
/// Lookups are never cached: each call asks the underlying binding again.
pub trait ExportTable {
    /// Location the module was loaded from
    fn path(&self) -> &Path;

    /// Every exported symbol name, as it appears in the export table
    fn exports(&self) -> &[String];

    /// Resolve an exported name to its address
    fn address(&self, symbol: &str) -> Result<NonNull<c_void>, SymbolError>;
}

/// The one live binding to a loaded test module
///
/// Dropping the handle unloads the module; every address obtained from it is
/// invalid afterwards.
pub struct ModuleHandle {
    path: PathBuf,
    exports: Vec<String>,
    library: Library,
}

impl ModuleHandle {
    /// Scan the export table and load the module
    ///
    /// # Safety note
    ///
    /// Loading runs the module's initializers in this process. The module must
    /// be trusted.
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }

        let exports = read_exports(path)?;

        let library =
            unsafe { Library::new(loader_path(path)) }.map_err(|e| LoadError::LoadFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        debug!(
            module = %path.display(),
            exports = exports.len(),
            "module loaded"
        );

        Ok(Self {
            path: path.to_path_buf(),
            exports,
            library,
        })
    }
}

impl ExportTable for ModuleHandle {
    fn path(&self) -> &Path {
        &self.path
    }

    fn exports(&self) -> &[String] {
        &self.exports
    }

    fn address(&self, symbol: &str) -> Result<NonNull<c_void>, SymbolError> {
        // SAFETY: the address is only read here; the caller decides its type.
        let resolved: libloading::Symbol<'_, *mut c_void> =
            unsafe { self.library.get(symbol.as_bytes()) }.map_err(|e| {
                SymbolError::Unresolved {
                    symbol: symbol.to_string(),
                    reason: e.to_string(),
                }
            })?;

        NonNull::new(*resolved).ok_or_else(|| SymbolError::NullAddress(symbol.to_string()))
    }
}

impl Drop for ModuleHandle {
    fn drop(&mut self) {
        debug!(module = %self.path.display(), "module released");
    }
}

/// Path handed to the dynamic loader
///
/// A bare file name would be looked up on the loader's search path instead of
/// the file that was scanned, so it is anchored to the current directory.
fn loader_path(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => path.to_path_buf(),
        _ => Path::new(".").join(path),
    }
}

/// Read the exported symbol names of a module file
///
/// Mach-O prefixes C symbols with an underscore that the dynamic loader does
/// not expect; it is stripped so names round-trip through [`ExportTable::address`].
pub fn read_exports(path: &Path) -> Result<Vec<String>, LoadError> {
    let data = fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let file = object::File::parse(&*data).map_err(|e| LoadError::ExportTable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let strip_underscore = file.format() == BinaryFormat::MachO;

    let exports = file.exports().map_err(|e| LoadError::ExportTable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    Ok(exports
        .iter()
        .filter_map(|export| std::str::from_utf8(export.name()).ok())
        .map(|name| match name.strip_prefix('_') {
            Some(stripped) if strip_underscore => stripped.to_string(),
            _ => name.to_string(),
        })
        .collect())
}
