use std::ffi::{c_long, c_ulong};

use phillip_config::BuildConfig;
use phillip_types::catalog::long_double_size;
use phillip_types::{TypeContext, TypeInfo};

/// Session with the native table filled in by hand, so tests never probe.
pub fn offline_context() -> TypeContext {
    let mut ctx = TypeContext::new(BuildConfig::default()).unwrap();
    for (name, info) in [
        ("char", TypeInfo::signed(1)),
        ("float", TypeInfo::float(4)),
        ("double", TypeInfo::float(8)),
        ("int", TypeInfo::signed(4)),
        ("long double", TypeInfo::float(long_double_size())),
        ("short", TypeInfo::signed(2)),
        ("long long", TypeInfo::signed(8)),
        ("long", TypeInfo::signed(size_of::<c_long>())),
        ("unsigned char", TypeInfo::unsigned(1)),
        ("unsigned int", TypeInfo::unsigned(4)),
        ("unsigned long long", TypeInfo::unsigned(8)),
        ("unsigned long", TypeInfo::unsigned(size_of::<c_ulong>())),
        ("unsigned short", TypeInfo::unsigned(2)),
        ("signed char", TypeInfo::signed(1)),
        ("bool", TypeInfo::unsigned(1)),
    ] {
        ctx.register_native(name, info).unwrap();
    }
    ctx
}
