//! Symbol catalog - find test entry points in a module's export table
//!
//! Export names are matched against the two ABI markers, decoded from their
//! Itanium-mangled form, and kept only when the decoded signature is niladic.
//! The resulting run order is the lexicographic order of qualified names.

use crate::error::SymbolError;
use crate::ffi::abi::{METHOD_ATTRIBUTE_MARKER, TEST_METHOD_MARKER};
use crate::module::ExportTable;
use cpp_demangle::{DemangleOptions, Symbol};
use std::collections::{BTreeSet, HashMap};
use std::ffi::c_void;
use std::ptr::NonNull;
use tracing::debug;

/// A decoded export: fully qualified function name and parameter count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSymbol {
    /// e.g. `Suite::__GetTestMethodInfo_T1`
    pub name: String,
    pub arity: usize,
}

impl DecodedSymbol {
    /// Demangle an Itanium C++ symbol; anything else yields `None`
    pub fn decode(mangled: &str) -> Option<Self> {
        let symbol = Symbol::new(mangled.as_bytes()).ok()?;
        let demangled = symbol.demangle(&DemangleOptions::new()).ok()?;
        Self::parse(&demangled)
    }

    /// Split a demangled signature like `ns::Class::fn(int, char)`
    pub fn parse(demangled: &str) -> Option<Self> {
        let demangled = demangled.trim();
        if !demangled.ends_with(')') {
            return None;
        }

        // Walk back to the '(' matching the final ')'
        let mut depth = 0usize;
        let mut open = None;
        for (i, c) in demangled.char_indices().rev() {
            match c {
                ')' => depth += 1,
                '(' => {
                    depth -= 1;
                    if depth == 0 {
                        open = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }

        let open = open?;
        let name = demangled[..open].trim();
        if name.is_empty() {
            return None;
        }

        let params = demangled[open + 1..demangled.len() - 1].trim();
        Some(Self {
            name: name.to_string(),
            arity: count_params(params),
        })
    }
}

fn count_params(params: &str) -> usize {
    if params.is_empty() || params == "void" {
        return 0;
    }

    let mut depth = 0i32;
    let mut count = 1;
    for c in params.chars() {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth -= 1,
            ',' if depth == 0 => count += 1,
            _ => {}
        }
    }
    count
}

/// One discovered test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDescriptor {
    /// Mangled descriptor export name
    pub symbol: String,
    /// `Class::Method`
    pub qualified_name: String,
}

impl TestDescriptor {
    /// Everything before the last `::`, or the whole name without one
    pub fn class_name(&self) -> &str {
        match self.qualified_name.rfind("::") {
            Some(pos) => &self.qualified_name[..pos],
            None => &self.qualified_name,
        }
    }

    /// Everything after the last `::`, or empty without one
    pub fn method_name(&self) -> &str {
        match self.qualified_name.rfind("::") {
            Some(pos) => &self.qualified_name[pos + 2..],
            None => "",
        }
    }
}

/// Discovered tests plus the symbol registry they resolve through
#[derive(Debug, Default)]
pub struct SymbolCatalog {
    tests: Vec<TestDescriptor>,
    attribute_symbols: BTreeSet<String>,
    registry: HashMap<String, DecodedSymbol>,
}

impl SymbolCatalog {
    /// Scan a module's exports
    ///
    /// `filter` keeps only tests whose qualified name contains it (case
    /// sensitive); `None` or an empty string keeps everything.
    pub fn build(table: &dyn ExportTable, filter: Option<&str>) -> Self {
        let mut catalog = SymbolCatalog::default();

        for export in table.exports() {
            let marker = if export.contains(TEST_METHOD_MARKER) {
                TEST_METHOD_MARKER
            } else if export.contains(METHOD_ATTRIBUTE_MARKER) {
                METHOD_ATTRIBUTE_MARKER
            } else {
                continue;
            };

            let Some(decoded) = DecodedSymbol::decode(export) else {
                debug!(symbol = %export, "skipping undecodable export");
                continue;
            };

            if !decoded.name.contains(marker) {
                continue;
            }

            let niladic = decoded.arity == 0;
            let qualified = decoded.name.replacen(marker, "", 1);
            catalog.registry.insert(export.clone(), decoded);

            if !niladic {
                debug!(symbol = %export, "skipping entry point with parameters");
                continue;
            }

            if marker == TEST_METHOD_MARKER {
                catalog.tests.push(TestDescriptor {
                    symbol: export.clone(),
                    qualified_name: qualified,
                });
            } else {
                catalog.attribute_symbols.insert(qualified);
            }
        }

        catalog.tests.sort_by(|a, b| {
            a.qualified_name
                .cmp(&b.qualified_name)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });

        if let Some(pattern) = filter.filter(|f| !f.is_empty()) {
            catalog.tests.retain(|t| t.qualified_name.contains(pattern));
        }

        debug!(
            tests = catalog.tests.len(),
            providers = catalog.attribute_symbols.len(),
            "symbol catalog built"
        );

        catalog
    }

    /// Tests in run order
    pub fn tests(&self) -> &[TestDescriptor] {
        &self.tests
    }

    /// Whether an attribute provider was exported for this qualified name
    pub fn has_attributes(&self, qualified_name: &str) -> bool {
        self.attribute_symbols.contains(qualified_name)
    }

    /// Resolve an export by name and expected parameter count
    ///
    /// The registry only holds decoded signatures; the address itself is looked
    /// up again on every call.
    pub fn resolve(
        &self,
        table: &dyn ExportTable,
        symbol: &str,
        arity: usize,
    ) -> Result<NonNull<c_void>, SymbolError> {
        let signature = self
            .registry
            .get(symbol)
            .ok_or_else(|| SymbolError::Unknown(symbol.to_string()))?;

        if signature.arity != arity {
            return Err(SymbolError::ArityMismatch {
                symbol: symbol.to_string(),
                expected: arity,
                actual: signature.arity,
            });
        }

        let address = table.address(symbol)?;
        debug!(symbol = %symbol, name = %signature.name, "symbol resolved");
        Ok(address)
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}
