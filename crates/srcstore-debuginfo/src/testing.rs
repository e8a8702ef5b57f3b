//! Synthetic ELF images with DWARF line tables.
//!
//! Compiling real executables in tests would tie them to a particular
//! toolchain; these builders emit the minimum the extractor reads: one
//! compile unit per file list, each with a DWARF 5 line program whose file
//! table carries the given names and digests.

use gimli::write::{
    AttributeValue, Dwarf, EndianVec, FileInfo, LineProgram, LineString, Sections, Unit,
};
use gimli::{Encoding, Format, LineEncoding, LittleEndian};
use object::write::Object;
use object::{Architecture, BinaryFormat, Endianness, SectionKind};
use srcstore_types::Digest;

/// One line-table file entry.
#[derive(Clone, Debug)]
pub struct SourceFile {
    pub name: String,
    pub md5: Digest,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, md5: Digest) -> Self {
        Self {
            name: name.into(),
            md5,
        }
    }
}

const ENCODING: Encoding = Encoding {
    format: Format::Dwarf32,
    version: 5,
    address_size: 8,
};

const COMP_DIR: &[u8] = b"/build";

/// An ELF image with one compilation unit per entry of `units`.
///
/// The first file of each unit becomes the unit's primary source file
/// (file index 0); the rest follow in order.
pub fn elf_image(units: &[Vec<SourceFile>]) -> Vec<u8> {
    let mut dwarf = Dwarf::new();
    for files in units {
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        let digests: Vec<Digest> = files.iter().map(|f| f.md5).collect();
        dwarf.units.add(unit(&names, Some(&digests)));
    }
    to_elf(debug_sections(&mut dwarf), None)
}

/// An ELF image whose single line table records names but no digests.
pub fn elf_image_without_md5(files: &[&str]) -> Vec<u8> {
    let mut dwarf = Dwarf::new();
    dwarf.units.add(unit(files, None));
    to_elf(debug_sections(&mut dwarf), None)
}

/// An ELF image with a `.debug_info` cut short mid-unit.
pub fn elf_image_with_truncated_debug_info(files: &[SourceFile]) -> Vec<u8> {
    let mut dwarf = Dwarf::new();
    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    let digests: Vec<Digest> = files.iter().map(|f| f.md5).collect();
    dwarf.units.add(unit(&names, Some(&digests)));
    to_elf(debug_sections(&mut dwarf), Some(6))
}

/// A valid ELF image with no debug sections at all.
pub fn elf_image_without_debug_info() -> Vec<u8> {
    let mut obj = Object::new(BinaryFormat::Elf, Architecture::X86_64, Endianness::Little);
    let text = obj.add_section(Vec::new(), b".text".to_vec(), SectionKind::Text);
    obj.set_section_data(text, vec![0xc3], 1);
    obj.write().expect("write ELF image")
}

fn unit(files: &[&str], digests: Option<&[Digest]>) -> Unit {
    let info = |i: usize| {
        digests.map(|d| FileInfo {
            md5: *d[i].as_bytes(),
            ..Default::default()
        })
    };

    let (first, rest) = files.split_first().expect("at least one source file");
    let mut program = LineProgram::new(
        ENCODING,
        LineEncoding::default(),
        LineString::String(COMP_DIR.to_vec()),
        LineString::String(first.as_bytes().to_vec()),
        info(0),
    );
    program.file_has_md5 = digests.is_some();

    let dir = program.default_directory();
    for (i, name) in rest.iter().enumerate() {
        program.add_file(LineString::String(name.as_bytes().to_vec()), dir, info(i + 1));
    }

    let mut unit = Unit::new(ENCODING, program);
    let root = unit.root();
    unit.get_mut(root)
        .set(gimli::DW_AT_stmt_list, AttributeValue::LineProgramRef);
    unit
}

fn debug_sections(dwarf: &mut Dwarf) -> Sections<EndianVec<LittleEndian>> {
    let mut sections = Sections::new(EndianVec::new(LittleEndian));
    dwarf.write(&mut sections).expect("write DWARF sections");
    sections
}

fn to_elf(sections: Sections<EndianVec<LittleEndian>>, truncate_info: Option<usize>) -> Vec<u8> {
    let mut obj = Object::new(BinaryFormat::Elf, Architecture::X86_64, Endianness::Little);
    sections
        .for_each(|id, data| -> Result<(), gimli::write::Error> {
            let mut bytes = data.slice().to_vec();
            if bytes.is_empty() {
                return Ok(());
            }
            if id == gimli::SectionId::DebugInfo {
                if let Some(len) = truncate_info {
                    bytes.truncate(len);
                }
            }
            let section =
                obj.add_section(Vec::new(), id.name().as_bytes().to_vec(), SectionKind::Debug);
            obj.set_section_data(section, bytes, 1);
            Ok(())
        })
        .expect("collect DWARF sections");
    obj.write().expect("write ELF image")
}
