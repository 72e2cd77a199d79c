//! Built-in type tables. Order in each table is the preference order used
//! when several names of one system share a family.

use std::ffi::{
    c_double, c_float, c_int, c_long, c_longlong, c_schar, c_short, c_uchar, c_uint,
    c_ulong, c_ulonglong, c_ushort,
};

use crate::descriptor::{TypeDescriptor, TypeInfo, TypeSystem};

/// Native names probed for every session. Signage and kind come from the
/// probe, never from this table.
pub const NATIVE_TYPES: &[&str] = &[
    "char",
    "float",
    "double",
    "int",
    "long double",
    "short",
    "long long",
    "long",
    "unsigned char",
    "unsigned int",
    "unsigned long long",
    "unsigned long",
    "unsigned short",
    "signed char",
    "bool",
];

/// Size of the target's `long double`, matching libffi's `ffi_type_longdouble`.
pub const fn long_double_size() -> usize {
    if cfg!(windows) || (cfg!(target_vendor = "apple") && cfg!(target_arch = "aarch64")) {
        8
    } else if cfg!(any(
        target_arch = "x86_64",
        target_arch = "aarch64",
        target_arch = "powerpc64",
        target_arch = "riscv64",
        target_arch = "s390x",
        target_arch = "wasm32"
    )) {
        16
    } else if cfg!(target_arch = "x86") {
        12
    } else {
        8
    }
}

pub fn ffi_types() -> Vec<(TypeDescriptor, TypeInfo)> {
    let entries = [
        ("c_int8", TypeInfo::signed(1)),
        ("c_int16", TypeInfo::signed(2)),
        ("c_int32", TypeInfo::signed(4)),
        ("c_int64", TypeInfo::signed(8)),
        ("c_uint8", TypeInfo::unsigned(1)),
        ("c_uint16", TypeInfo::unsigned(2)),
        ("c_uint32", TypeInfo::unsigned(4)),
        ("c_uint64", TypeInfo::unsigned(8)),
        ("c_float", TypeInfo::float(size_of::<c_float>())),
        ("c_double", TypeInfo::float(size_of::<c_double>())),
        ("c_longdouble", TypeInfo::float(long_double_size())),
        ("c_bool", TypeInfo::unsigned(size_of::<bool>())),
        ("c_byte", TypeInfo::signed(size_of::<c_schar>())),
        ("c_int", TypeInfo::signed(size_of::<c_int>())),
        ("c_long", TypeInfo::signed(size_of::<c_long>())),
        ("c_longlong", TypeInfo::signed(size_of::<c_longlong>())),
        ("c_short", TypeInfo::signed(size_of::<c_short>())),
        ("c_size_t", TypeInfo::unsigned(size_of::<usize>())),
        ("c_ssize_t", TypeInfo::signed(size_of::<isize>())),
        ("c_ubyte", TypeInfo::unsigned(size_of::<c_uchar>())),
        ("c_uint", TypeInfo::unsigned(size_of::<c_uint>())),
        ("c_ulong", TypeInfo::unsigned(size_of::<c_ulong>())),
        ("c_ulonglong", TypeInfo::unsigned(size_of::<c_ulonglong>())),
        ("c_ushort", TypeInfo::unsigned(size_of::<c_ushort>())),
    ];

    entries
        .into_iter()
        .map(|(name, info)| (TypeDescriptor::ffi(name), info))
        .collect()
}

pub fn arraylib_types() -> Vec<(TypeDescriptor, TypeInfo)> {
    let entries = [
        ("int8", TypeInfo::signed(1)),
        ("int16", TypeInfo::signed(2)),
        ("int32", TypeInfo::signed(4)),
        ("int64", TypeInfo::signed(8)),
        ("float32", TypeInfo::float(4)),
        ("float64", TypeInfo::float(8)),
        ("float128", TypeInfo::float(long_double_size())),
        ("uint8", TypeInfo::unsigned(1)),
        ("uint16", TypeInfo::unsigned(2)),
        ("uint32", TypeInfo::unsigned(4)),
        ("uint64", TypeInfo::unsigned(8)),
        // families carry no boolean kind: `bool_` aliases uint8 and its
        // array-interface typestr is `|u1`, never `|b1`
        ("bool_", TypeInfo::unsigned(size_of::<bool>())),
        ("byte", TypeInfo::signed(size_of::<c_schar>())),
        ("double", TypeInfo::float(size_of::<c_double>())),
        ("float_", TypeInfo::float(size_of::<c_double>())),
        ("int_", TypeInfo::signed(size_of::<c_long>())),
        ("intc", TypeInfo::signed(size_of::<c_int>())),
        ("longfloat", TypeInfo::float(long_double_size())),
        ("longlong", TypeInfo::signed(size_of::<c_longlong>())),
        ("short", TypeInfo::signed(size_of::<c_short>())),
        ("single", TypeInfo::float(size_of::<c_float>())),
        ("ubyte", TypeInfo::unsigned(size_of::<c_uchar>())),
        ("uint", TypeInfo::unsigned(size_of::<c_ulong>())),
        ("uintc", TypeInfo::unsigned(size_of::<c_uint>())),
        ("ulonglong", TypeInfo::unsigned(size_of::<c_ulonglong>())),
        ("ushort", TypeInfo::unsigned(size_of::<c_ushort>())),
    ];

    entries
        .into_iter()
        .map(|(name, info)| (TypeDescriptor::arraylib(name), info))
        .collect()
}

/// Entries known without probing: the ArrayLib and FFI tables.
pub fn static_types() -> Vec<(TypeDescriptor, TypeInfo)> {
    let mut all = arraylib_types();
    all.extend(ffi_types());
    all
}

/// Array-interface typestring for an ArrayLib type (`<i4`, `|u1`, `<f8`).
pub fn typestr(info: &TypeInfo) -> Option<String> {
    use crate::descriptor::{NumericKind, Signage};

    let size = info.size_bytes?;
    let kind = match (info.numeric_kind, info.signage) {
        (NumericKind::Float, _) => 'f',
        (NumericKind::Integer, Signage::Unsigned) => 'u',
        (NumericKind::Integer, _) => 'i',
        (NumericKind::Other, _) => 'V',
    };
    let order = if size == 1 || kind == 'V' {
        '|'
    } else if cfg!(target_endian = "little") {
        '<'
    } else {
        '>'
    };
    Some(format!("{order}{kind}{size}"))
}

pub fn is_catalog_name(system: TypeSystem, name: &str) -> bool {
    match system {
        TypeSystem::Native => NATIVE_TYPES.contains(&name),
        TypeSystem::ArrayLib => arraylib_types().iter().any(|(desc, _)| desc.name == name),
        TypeSystem::Ffi => ffi_types().iter().any(|(desc, _)| desc.name == name),
    }
}
