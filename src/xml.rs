//! XML document generation for the `qXfer` objects (`library-list`,
//! `threads`, `memory-map`). Documents are generated in full and then
//! windowed by [`crate::stub::qxfer`].

use std::fmt::Write as _;

use crate::target::{DynamicLibraryRecord, ThreadRecord};

/// Escape text that will appear between XML tags or inside an attribute
/// value. Minimal escaping, matching what GDB's own XML parser requires.
pub fn escape(input: &str, out: &mut String) {
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
}

pub fn library_list(libraries: &[DynamicLibraryRecord]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n<library-list>\n");
    for lib in libraries {
        let mut path = String::new();
        escape(&lib.full_path, &mut path);
        let _ = writeln!(
            out,
            "  <library name=\"{}\"><segment address=\"0x{:x}\"/></library>",
            path, lib.load_address
        );
    }
    out.push_str("</library-list>\n");
    out
}

pub fn thread_list(threads: &[ThreadRecord]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n<threads>\n");
    for t in threads {
        let mut name = String::new();
        escape(&t.user_friendly_name, &mut name);
        let _ = writeln!(
            out,
            "  <thread id=\"{:x}\" name=\"{}\"/>",
            t.thread_id, name
        );
    }
    out.push_str("</threads>\n");
    out
}

pub fn memory_map(regions: &[crate::stub::session::MemoryRegion]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n<memory-map>\n");
    for r in regions {
        let mut kind = String::new();
        escape(r.kind, &mut kind);
        if r.erase_block_size > 0 {
            let _ = writeln!(
                out,
                "  <memory type=\"{}\" start=\"0x{:x}\" length=\"0x{:x}\"><property name=\"blocksize\">0x{:x}</property></memory>",
                kind, r.start, r.length, r.erase_block_size
            );
        } else {
            let _ = writeln!(
                out,
                "  <memory type=\"{}\" start=\"0x{:x}\" length=\"0x{:x}\"/>",
                kind, r.start, r.length
            );
        }
    }
    out.push_str("</memory-map>\n");
    out
}
