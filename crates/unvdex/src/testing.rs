//! Builders for small, well-formed DEX and VDEX images used by the tests.
//!
//! This file is also compiled into the integration tests with `#[path]`, so
//! it must not refer to anything through `crate::`.

#![allow(dead_code)]

const DEX_HEADER_SIZE: usize = 0x70;
const CLASS_DEF_ITEM_SIZE: usize = 0x20;
const CODE_ITEM_HEADER_SIZE: usize = 16;
const ACC_PUBLIC: u32 = 0x0001;
const ACC_NATIVE: u32 = 0x0100;

pub fn write_uleb128(out: &mut Vec<u8>, mut value: u32) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// One quickening-info record: `u32` length, then the payload.
pub fn quickening_record(payload: &[u8]) -> Vec<u8> {
    let mut out = (payload.len() as u32).to_le_bytes().to_vec();
    out.extend_from_slice(payload);
    out
}

/// Slow reference Adler-32, independent of the one under test.
fn fixture_adler32(data: &[u8]) -> u32 {
    let (mut a, mut b) = (1u32, 0u32);
    for &byte in data {
        a = (a + u32::from(byte)) % 65521;
        b = (b + a) % 65521;
    }
    (b << 16) | a
}

/// A class_def entry and its class data. Methods given as `None` are native.
#[derive(Debug, Clone, Default)]
pub struct ClassSpec {
    has_data: bool,
    static_fields: u32,
    instance_fields: u32,
    direct_methods: Vec<Option<Vec<u16>>>,
    virtual_methods: Vec<Option<Vec<u16>>>,
}

impl ClassSpec {
    pub fn new() -> Self {
        Self {
            has_data: true,
            ..Self::default()
        }
    }

    /// A class_def whose `class_data_off` is 0.
    pub fn without_data() -> Self {
        Self::default()
    }

    pub fn fields(mut self, static_fields: u32, instance_fields: u32) -> Self {
        self.static_fields = static_fields;
        self.instance_fields = instance_fields;
        self
    }

    pub fn direct_method(mut self, insns: Vec<u16>) -> Self {
        self.direct_methods.push(Some(insns));
        self
    }

    pub fn virtual_method(mut self, insns: Vec<u16>) -> Self {
        self.virtual_methods.push(Some(insns));
        self
    }

    pub fn native_direct_method(mut self) -> Self {
        self.direct_methods.push(None);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct DexImage {
    classes: Vec<ClassSpec>,
}

pub struct BuiltDex {
    pub bytes: Vec<u8>,
    /// Start of every instruction array, in class/direct/virtual order.
    pub insns_offsets: Vec<usize>,
}

fn put_u32(bytes: &mut [u8], at: usize, value: u32) {
    bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn align4(bytes: &mut Vec<u8>) {
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }
}

impl DexImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class(mut self, class: ClassSpec) -> Self {
        self.classes.push(class);
        self
    }

    /// Layout: header, class_defs, code items, class data.
    pub fn build(self) -> BuiltDex {
        let class_defs_off = DEX_HEADER_SIZE;
        let data_off = class_defs_off + self.classes.len() * CLASS_DEF_ITEM_SIZE;
        let mut bytes = vec![0u8; data_off];
        let mut insns_offsets = Vec::new();

        // Code items first, so every code_off is known when class data is written.
        let mut code_offs: Vec<(Vec<Option<u32>>, Vec<Option<u32>>)> = Vec::new();
        for class in &self.classes {
            let mut place = |methods: &[Option<Vec<u16>>]| -> Vec<Option<u32>> {
                methods
                    .iter()
                    .map(|method| {
                        let insns = method.as_ref()?;
                        align4(&mut bytes);
                        let code_off = bytes.len();
                        bytes.extend_from_slice(&1u16.to_le_bytes()); // registers_size
                        bytes.extend_from_slice(&[0u8; 6]); // ins, outs, tries
                        bytes.extend_from_slice(&0u32.to_le_bytes()); // debug_info_off
                        bytes.extend_from_slice(&(insns.len() as u32).to_le_bytes());
                        insns_offsets.push(code_off + CODE_ITEM_HEADER_SIZE);
                        for unit in insns {
                            bytes.extend_from_slice(&unit.to_le_bytes());
                        }
                        Some(code_off as u32)
                    })
                    .collect()
            };
            let direct = place(&class.direct_methods);
            let virtual_ = place(&class.virtual_methods);
            code_offs.push((direct, virtual_));
        }

        let classes = self.classes.iter().zip(&code_offs).enumerate();
        for (index, (class, (direct, virtual_))) in classes {
            if !class.has_data {
                continue;
            }
            let class_data_off = bytes.len();
            let mut data = Vec::new();
            write_uleb128(&mut data, class.static_fields);
            write_uleb128(&mut data, class.instance_fields);
            write_uleb128(&mut data, direct.len() as u32);
            write_uleb128(&mut data, virtual_.len() as u32);
            for field in 0..class.static_fields + class.instance_fields {
                let restarts = field == 0 || field == class.static_fields;
                write_uleb128(&mut data, u32::from(!restarts));
                write_uleb128(&mut data, ACC_PUBLIC);
            }
            for methods in [direct, virtual_] {
                for (position, code_off) in methods.iter().enumerate() {
                    write_uleb128(&mut data, u32::from(position != 0));
                    match code_off {
                        Some(code_off) => {
                            write_uleb128(&mut data, ACC_PUBLIC);
                            write_uleb128(&mut data, *code_off);
                        }
                        None => {
                            write_uleb128(&mut data, ACC_PUBLIC | ACC_NATIVE);
                            write_uleb128(&mut data, 0);
                        }
                    }
                }
            }
            bytes.extend_from_slice(&data);
            let entry = class_defs_off + index * CLASS_DEF_ITEM_SIZE;
            put_u32(&mut bytes, entry, index as u32); // class_idx
            put_u32(&mut bytes, entry + 0x18, class_data_off as u32);
        }
        align4(&mut bytes);

        let file_size = bytes.len();
        bytes[..8].copy_from_slice(b"dex\n035\0");
        put_u32(&mut bytes, 0x20, file_size as u32);
        put_u32(&mut bytes, 0x24, DEX_HEADER_SIZE as u32);
        put_u32(&mut bytes, 0x28, 0x1234_5678);
        put_u32(&mut bytes, 0x60, self.classes.len() as u32);
        put_u32(&mut bytes, 0x64, class_defs_off as u32);
        put_u32(&mut bytes, 0x68, (file_size - data_off) as u32);
        put_u32(&mut bytes, 0x6c, data_off as u32);
        let checksum = fixture_adler32(&bytes[0x0c..]);
        put_u32(&mut bytes, 0x08, checksum);

        BuiltDex {
            bytes,
            insns_offsets,
        }
    }
}

/// A version 006 VDEX around the given DEX files.
#[derive(Debug, Clone)]
pub struct VdexImage {
    dex_files: Vec<Vec<u8>>,
    location_checksums: Option<Vec<u32>>,
    verifier_deps: Vec<u8>,
    quickening_info: Vec<u8>,
}

pub struct BuiltVdex {
    pub bytes: Vec<u8>,
    /// Absolute offset of every DEX file.
    pub dex_offsets: Vec<usize>,
}

impl VdexImage {
    pub fn new(dex_files: Vec<Vec<u8>>) -> Self {
        Self {
            dex_files,
            location_checksums: None,
            verifier_deps: Vec::new(),
            quickening_info: Vec::new(),
        }
    }

    pub fn location_checksums(mut self, checksums: Vec<u32>) -> Self {
        self.location_checksums = Some(checksums);
        self
    }

    pub fn verifier_deps(mut self, data: Vec<u8>) -> Self {
        self.verifier_deps = data;
        self
    }

    pub fn quickening_info(mut self, data: Vec<u8>) -> Self {
        self.quickening_info = data;
        self
    }

    pub fn build(self) -> BuiltVdex {
        // Default location checksums mirror each DEX header checksum.
        let checksums = self.location_checksums.unwrap_or_else(|| {
            self.dex_files
                .iter()
                .map(|dex| {
                    dex.get(8..12)
                        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                        .unwrap_or(0)
                })
                .collect()
        });
        let dex_size: usize = self.dex_files.iter().map(Vec::len).sum();

        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"vdex006\0");
        bytes.extend_from_slice(&(self.dex_files.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&(dex_size as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.verifier_deps.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.quickening_info.len() as u32).to_le_bytes());
        for checksum in checksums {
            bytes.extend_from_slice(&checksum.to_le_bytes());
        }
        let mut dex_offsets = Vec::new();
        for dex in &self.dex_files {
            dex_offsets.push(bytes.len());
            bytes.extend_from_slice(dex);
        }
        bytes.extend_from_slice(&self.verifier_deps);
        bytes.extend_from_slice(&self.quickening_info);

        BuiltVdex { bytes, dex_offsets }
    }
}
