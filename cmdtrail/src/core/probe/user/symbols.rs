//! Symbols
//!
//! Resolution of exported functions in ELF binaries and shared libraries.

use std::{fs, path::Path};

use elf::{abi::STT_FUNC, endian::AnyEndian, ElfBytes, ParseError};

use crate::core::probe::ProbeAttachError;

/// Checks the ELF file at `path` defines a function named `symbol`, in its
/// dynamic symbol table or in its full symbol table. Resolving the function
/// address is left to libbpf at attach time.
pub(crate) fn check_function(path: &Path, symbol: &str) -> Result<(), ProbeAttachError> {
    let library_err = |reason: String| ProbeAttachError::Library {
        path: path.to_path_buf(),
        reason,
    };

    let data = fs::read(path).map_err(|e| library_err(e.to_string()))?;
    let file = ElfBytes::<AnyEndian>::minimal_parse(data.as_slice())
        .map_err(|e| library_err(format!("not a valid ELF file ({e})")))?;

    match defines_function(&file, symbol) {
        Ok(true) => Ok(()),
        Ok(false) => Err(ProbeAttachError::SymbolNotFound {
            symbol: symbol.to_string(),
            path: path.to_path_buf(),
        }),
        Err(e) => Err(library_err(format!("malformed symbol tables ({e})"))),
    }
}

fn defines_function(file: &ElfBytes<AnyEndian>, symbol: &str) -> Result<bool, ParseError> {
    let tables = [file.dynamic_symbol_table()?, file.symbol_table()?];

    for (symtab, strtab) in tables.into_iter().flatten() {
        for sym in symtab.iter() {
            if sym.st_symtype() != STT_FUNC || sym.is_undefined() {
                continue;
            }
            if strtab.get(sym.st_name as usize)? == symbol {
                return Ok(true);
            }
        }
    }

    Ok(false)
}
