//! Parsers for export listings captured from platform tools.
//!
//! Each parser returns the raw (still decorated) names of defined, global
//! symbols. Lines that do not look like symbol rows are skipped.

use crate::config::ListingFormat;
use std::collections::BTreeSet;

fn is_hex(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_hexdigit())
}

/// `nm -D --defined-only` / `nm -gU`
pub fn parse_nm(output: &str) -> BTreeSet<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.ends_with(':'))
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 2 {
                return None;
            }
            let type_code = parts[parts.len() - 2];
            let symbol = parts[parts.len() - 1];
            let mut chars = type_code.chars();
            let code = chars.next()?;
            // Lowercase codes are local, except GNU unique `u`
            let global = code.is_ascii_uppercase() || code == 'u';
            (chars.next().is_none() && code != 'U' && global).then(|| symbol.to_string())
        })
        .collect()
}

/// `readelf -Ws --dyn-syms`
pub fn parse_readelf(output: &str) -> BTreeSet<String> {
    output
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 8 {
                return None;
            }
            let number = parts[0].strip_suffix(':')?;
            if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            let bind = parts[4].to_ascii_uppercase();
            let visibility = parts[5].to_ascii_uppercase();
            let section = parts[6].to_ascii_uppercase();
            let name = parts[7].split('@').next().unwrap_or("");
            let exported = section != "UND"
                && matches!(bind.as_str(), "GLOBAL" | "WEAK" | "GNU_UNIQUE" | "UNIQUE")
                && !matches!(visibility.as_str(), "HIDDEN" | "INTERNAL");
            (exported && !name.is_empty() && name != "0").then(|| name.to_string())
        })
        .collect()
}

/// `objdump -T`
pub fn parse_objdump(output: &str) -> BTreeSet<String> {
    output
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 7 || !is_hex(parts[0]) {
                return None;
            }
            let binding = parts[1].to_ascii_lowercase();
            if !matches!(binding.as_str(), "g" | "w" | "u") || parts[3] == "*UND*" {
                return None;
            }
            let name = parts[parts.len() - 1];
            (name != "*UND*").then(|| name.to_string())
        })
        .collect()
}

/// `dumpbin /exports`: `ordinal hint RVA name`
pub fn parse_dumpbin(output: &str) -> BTreeSet<String> {
    output
        .lines()
        .filter(|line| line.starts_with(char::is_whitespace))
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            match parts.as_slice() {
                [ordinal, hint, rva, name]
                    if ordinal.chars().all(|c| c.is_ascii_digit())
                        && is_hex(hint)
                        && is_hex(rva) =>
                {
                    Some((*name).to_string())
                }
                _ => None,
            }
        })
        .collect()
}

/// Dispatch on the configured listing format
pub fn parse_listing(output: &str, format: ListingFormat) -> BTreeSet<String> {
    match format {
        ListingFormat::Nm => parse_nm(output),
        ListingFormat::Readelf => parse_readelf(output),
        ListingFormat::Objdump => parse_objdump(output),
        ListingFormat::Dumpbin => parse_dumpbin(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(set: BTreeSet<String>) -> Vec<String> {
        set.into_iter().collect()
    }

    #[test]
    fn test_nm_keeps_global_defined() {
        let out = "\
0000000000001139 T lrtc_factory_create
0000000000001150 t local_helper
                 U malloc
0000000000004010 B lrtc_global_state
0000000000001160 W weak_symbol
";
        assert_eq!(
            names(parse_nm(out)),
            vec!["lrtc_factory_create", "lrtc_global_state", "weak_symbol"]
        );
    }

    #[test]
    fn test_readelf_filters_undefined_and_hidden() {
        let out = "\
Symbol table '.dynsym' contains 4 entries:
   Num:    Value          Size Type    Bind   Vis      Ndx Name
     1: 0000000000000000     0 FUNC    GLOBAL DEFAULT  UND malloc@GLIBC_2.2.5 (2)
     2: 0000000000001139    11 FUNC    GLOBAL DEFAULT   14 lrtc_factory_create@@LUMENRTC_1
     3: 0000000000001150    11 FUNC    GLOBAL HIDDEN    14 lrtc_hidden
     4: 0000000000001160    11 FUNC    WEAK   DEFAULT   14 lrtc_weak
";
        assert_eq!(
            names(parse_readelf(out)),
            vec!["lrtc_factory_create", "lrtc_weak"]
        );
    }

    #[test]
    fn test_objdump_dynamic_table() {
        let out = "\
liblumenrtc.so:     file format elf64-x86-64

DYNAMIC SYMBOL TABLE:
0000000000000000      DF *UND*  0000000000000000  GLIBC_2.2.5 malloc
0000000000001139 g    DF .text  000000000000000b  Base        lrtc_factory_create
";
        assert_eq!(names(parse_objdump(out)), vec!["lrtc_factory_create"]);
    }

    #[test]
    fn test_dumpbin_exports() {
        let out = "\
    ordinal hint RVA      name

          1    0 00001000 lrtc_factory_create
          2    1 00001010 _lrtc_stdcall@8

  Summary
";
        assert_eq!(
            names(parse_dumpbin(out)),
            vec!["_lrtc_stdcall@8", "lrtc_factory_create"]
        );
    }
}
