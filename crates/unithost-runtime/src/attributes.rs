//! Attribute resolution - optional per-test metadata
//!
//! A test may export a companion provider returning ignore flags and key/value
//! tags. Providers are optional: a missing provider means default metadata, and
//! a provider that cannot be resolved or faults is absorbed here and reported
//! back as default metadata plus a diagnostic.

use crate::catalog::{DecodedSymbol, SymbolCatalog, TestDescriptor};
use crate::ffi::abi::{METHOD_ATTRIBUTE_MARKER, TEST_METHOD_MARKER};
use crate::ffi::boundary;
use crate::module::ExportTable;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Metadata attached to one test method
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeInfo {
    /// Never run this test
    pub ignore: bool,
    /// Do not run this test on the current platform
    pub ignore_on_platform: bool,
    /// Free-form key/value tags, ordered by key
    pub tags: BTreeMap<String, String>,
}

impl AttributeInfo {
    pub fn is_ignored(&self) -> bool {
        self.ignore || self.ignore_on_platform
    }
}

/// Outcome of one attribute lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeLookup {
    pub info: AttributeInfo,
    /// Set when a provider was expected but could not deliver
    pub fault: Option<String>,
}

/// Derive the provider export name from a descriptor export name
///
/// Substitutes the marker inside the mangled name. When the marker is preceded
/// by an Itanium `<length>` prefix, the length is rewritten to match the longer
/// identifier; the shortest digit suffix whose rewrite demangles to the
/// expected provider name wins.
pub fn provider_symbol(descriptor: &str) -> Option<String> {
    let at = descriptor.find(TEST_METHOD_MARKER)?;
    let prefix = &descriptor[..at];
    let rest = &descriptor[at + TEST_METHOD_MARKER.len()..];
    let plain = format!("{}{}{}", prefix, METHOD_ATTRIBUTE_MARKER, rest);

    let expected = match DecodedSymbol::decode(descriptor) {
        Some(decoded) => decoded
            .name
            .replacen(TEST_METHOD_MARKER, METHOD_ATTRIBUTE_MARKER, 1),
        None => return Some(plain),
    };

    let digits_start = prefix.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    for split in (digits_start..at).rev() {
        let Ok(length) = prefix[split..].parse::<usize>() else {
            continue;
        };
        if length < TEST_METHOD_MARKER.len() {
            continue;
        }

        let repaired = length - TEST_METHOD_MARKER.len() + METHOD_ATTRIBUTE_MARKER.len();
        let candidate = format!(
            "{}{}{}{}",
            &prefix[..split],
            repaired,
            METHOD_ATTRIBUTE_MARKER,
            rest
        );
        if DecodedSymbol::decode(&candidate).is_some_and(|d| d.name == expected) {
            return Some(candidate);
        }
    }

    Some(plain)
}

/// Fetches [`AttributeInfo`] for tests of one catalog
pub struct AttributeResolver<'a> {
    catalog: &'a SymbolCatalog,
    table: &'a dyn ExportTable,
}

impl<'a> AttributeResolver<'a> {
    pub fn new(catalog: &'a SymbolCatalog, table: &'a dyn ExportTable) -> Self {
        Self { catalog, table }
    }

    /// Look up metadata for one test; never fails
    pub fn resolve(&self, test: &TestDescriptor) -> AttributeLookup {
        if !self.catalog.has_attributes(&test.qualified_name) {
            return AttributeLookup::default();
        }

        match self.fetch(test) {
            Ok(info) => {
                debug!(test = %test.qualified_name, ?info, "attributes resolved");
                AttributeLookup { info, fault: None }
            }
            Err(fault) => {
                warn!(test = %test.qualified_name, %fault, "attribute provider unavailable");
                AttributeLookup {
                    info: AttributeInfo::default(),
                    fault: Some(fault),
                }
            }
        }
    }

    fn fetch(&self, test: &TestDescriptor) -> Result<AttributeInfo, String> {
        let symbol = provider_symbol(&test.symbol)
            .ok_or_else(|| format!("'{}' carries no descriptor marker", test.symbol))?;

        let address = self
            .catalog
            .resolve(self.table, &symbol, 0)
            .map_err(|e| e.to_string())?;

        // SAFETY: the registry verified a niladic provider under this name and
        // the module stays loaded for the whole run.
        unsafe { boundary::read_attributes(address) }.map_err(|e| e.to_string())
    }
}
