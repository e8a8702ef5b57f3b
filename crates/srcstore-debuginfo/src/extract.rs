use std::borrow::Cow;
use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use object::{Object, ObjectSection};
use srcstore_types::{Digest, SourceReference};
use tracing::debug;

use crate::error::{DebugInfoError, Result};

/// List every `(filename, digest)` pair recorded in the image at `path`.
///
/// Order follows compilation units in `.debug_info` and, within a unit, its
/// line-table file entries. Duplicates across units are kept.
pub fn extract(path: impl AsRef<Path>) -> Result<Vec<SourceReference>> {
    let path = path.as_ref();
    let open_error = |source| DebugInfoError::Open {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(open_error)?;
    // SAFETY: the mapping is read-only and private to this call. A
    // concurrent truncation of the file can still fault; that is the
    // accepted cost of not copying whole executables into memory.
    let map = unsafe { Mmap::map(&file) }.map_err(open_error)?;

    let references = extract_from_bytes(&map)?;
    debug!(path = %path.display(), count = references.len(), "extracted source references");
    Ok(references)
}

/// Same as [`extract`], over an image already in memory.
pub fn extract_from_bytes(data: &[u8]) -> Result<Vec<SourceReference>> {
    let image = object::File::parse(data).map_err(|e| DebugInfoError::NotAnImage(e.to_string()))?;
    if image.section_by_name(gimli::SectionId::DebugInfo.name()).is_none() {
        return Err(DebugInfoError::NoDebugInfo);
    }

    let endian = if image.is_little_endian() {
        gimli::RunTimeEndian::Little
    } else {
        gimli::RunTimeEndian::Big
    };

    let sections = gimli::DwarfSections::load(|id| load_section(&image, id))?;
    let dwarf = sections.borrow(|section| gimli::EndianSlice::new(&**section, endian));

    let mut references = Vec::new();
    let mut headers = dwarf.units();
    let mut unit_index = 0;
    while let Some(header) = headers.next()? {
        let unit = dwarf.unit(header)?;
        collect_unit_files(&dwarf, &unit, unit_index, &mut references)?;
        unit_index += 1;
    }
    Ok(references)
}

fn load_section<'data>(
    image: &object::File<'data>,
    id: gimli::SectionId,
) -> Result<Cow<'data, [u8]>> {
    match image.section_by_name(id.name()) {
        Some(section) => section.uncompressed_data().map_err(|e| DebugInfoError::Section {
            name: id.name(),
            reason: e.to_string(),
        }),
        None => Ok(Cow::Borrowed(&[])),
    }
}

/// Append the file table of one compilation unit.
fn collect_unit_files<R: gimli::Reader>(
    dwarf: &gimli::Dwarf<R>,
    unit: &gimli::Unit<R>,
    unit_index: usize,
    out: &mut Vec<SourceReference>,
) -> Result<()> {
    let Some(program) = unit.line_program.as_ref() else {
        debug!(unit = unit_index, "compilation unit has no line table");
        return Ok(());
    };
    let header = program.header();

    // DWARF 5 numbers file entries from 0; earlier versions from 1.
    let base: u64 = if header.version() >= 5 { 0 } else { 1 };
    let files = header.file_names();
    debug!(
        unit = unit_index,
        base,
        end = base + files.len() as u64,
        "walking file table"
    );

    for entry in files {
        let name = dwarf.attr_string(unit, entry.path_name())?;
        let name = name.to_string_lossy()?.into_owned();
        if !header.file_has_md5() {
            return Err(DebugInfoError::MissingDigest {
                unit: unit_index,
                file: name,
            });
        }
        out.push(SourceReference::new(name, Digest::from_bytes(*entry.md5())));
    }
    Ok(())
}
