//! Value codec: native [`Value`]s to and from the tagged wire layout.
//!
//! Encoding allocates the memory that payload pointers refer to (C strings,
//! vector descriptors, element buffers) inside the [`Encoder`], so encoded
//! payloads stay valid exactly as long as the encoder does. Decoding copies
//! everything it reads into owned values.

use std::any::Any;
use std::ffi::{CStr, CString};

use cti_sys::{PackedValue, PackedVector, RawArg, RawHandle, TypeCode};
use tracing::trace;

use crate::error::{CtiError, CtiResult};
use crate::registry::TypeRegistry;
use crate::value::{ExtValue, FuncRef, Value};

/// Default limit on vector nesting, applied by both directions.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Encodes values and owns the memory their payloads point into.
#[derive(Debug)]
pub struct Encoder<'r> {
    registry: &'r TypeRegistry,
    max_depth: usize,
    strings: Vec<CString>,
    vectors: Vec<Box<PackedVector>>,
    buffers: Vec<Vec<PackedValue>>,
}

impl<'r> Encoder<'r> {
    /// An encoder consulting `registry` for extension kinds.
    #[must_use]
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            max_depth: DEFAULT_MAX_DEPTH,
            strings: Vec::new(),
            vectors: Vec::new(),
            buffers: Vec::new(),
        }
    }

    /// Override the nesting limit.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Encode one value. The returned payload borrows memory owned by `self`.
    ///
    /// # Errors
    ///
    /// Returns [`CtiError::InconsistentVectorType`] for a heterogeneous
    /// vector, [`CtiError::UnsupportedValueKind`] for an unregistered
    /// extension code, [`CtiError::InvalidString`] for a string with an
    /// interior NUL and [`CtiError::NestingTooDeep`] past the depth limit.
    pub fn encode(&mut self, value: &Value) -> CtiResult<RawArg> {
        self.encode_at(value, 0)
    }

    /// Encode a whole argument list into parallel code and payload arrays.
    ///
    /// Fails on the first argument that cannot be encoded.
    ///
    /// # Errors
    ///
    /// See [`Encoder::encode`].
    pub fn pack(mut self, args: &[Value]) -> CtiResult<PackedArgs<'r>> {
        let mut type_codes = Vec::with_capacity(args.len());
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            let raw = self.encode(arg)?;
            type_codes.push(raw.type_code);
            values.push(raw.value);
        }
        Ok(PackedArgs {
            _encoder: self,
            type_codes,
            values,
        })
    }

    fn encode_at(&mut self, value: &Value, depth: usize) -> CtiResult<RawArg> {
        let raw = match value {
            Value::Int(v) => RawArg::new(TypeCode::INT64, PackedValue::int64(*v)),
            Value::Float(v) => RawArg::new(TypeCode::FLOAT64, PackedValue::float64(*v)),
            Value::Ptr(h) => RawArg::new(TypeCode::POINTER, PackedValue::handle(*h)),
            Value::Str(s) => {
                let c = CString::new(s.as_bytes()).map_err(|_| {
                    CtiError::InvalidString("string contains an interior NUL byte".to_owned())
                })?;
                let payload = PackedValue { v_str: c.as_ptr() };
                self.strings.push(c);
                RawArg::new(TypeCode::STRING, payload)
            },
            Value::Func(f) => RawArg::new(
                TypeCode::FUNCTION_REF,
                PackedValue {
                    v_func: f.handle().as_ptr().cast_const(),
                },
            ),
            Value::Vec(items) => self.encode_vector(items, depth)?,
            Value::Ext(ext) => {
                if self.registry.lookup_by_code(ext.type_code).is_none() {
                    return Err(CtiError::UnsupportedValueKind(format!(
                        "extension type code {} is not registered",
                        ext.type_code.0
                    )));
                }
                RawArg::new(ext.type_code, PackedValue::handle(ext.handle))
            },
        };
        Ok(raw)
    }

    fn encode_vector(&mut self, items: &[Value], depth: usize) -> CtiResult<RawArg> {
        if depth >= self.max_depth {
            return Err(CtiError::NestingTooDeep {
                limit: self.max_depth,
            });
        }

        let mut element = TypeCode::UNKNOWN;
        let mut data = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let raw = self.encode_at(item, depth.saturating_add(1))?;
            if index == 0 {
                element = raw.type_code;
            } else if raw.type_code != element {
                return Err(CtiError::InconsistentVectorType {
                    expected: element,
                    found: raw.type_code,
                    index,
                });
            }
            data.push(raw.value);
        }

        let descriptor = Box::new(PackedVector {
            data: if data.is_empty() {
                std::ptr::null()
            } else {
                data.as_ptr()
            },
            size: data.len(),
            type_code: element,
        });
        let payload = PackedValue {
            v_vec: &raw const *descriptor,
        };
        // Moving the boxes and vectors into the arena does not move their
        // heap allocations, so the pointers above stay valid.
        self.buffers.push(data);
        self.vectors.push(descriptor);
        Ok(RawArg::new(TypeCode::VECTOR, payload))
    }
}

/// An encoded argument list together with the memory it points into.
#[derive(Debug)]
pub struct PackedArgs<'r> {
    _encoder: Encoder<'r>,
    type_codes: Vec<TypeCode>,
    values: Vec<PackedValue>,
}

impl PackedArgs<'_> {
    /// Argument type codes.
    #[must_use]
    pub fn type_codes(&self) -> &[TypeCode] {
        &self.type_codes
    }

    /// Argument payloads, parallel to [`PackedArgs::type_codes`].
    #[must_use]
    pub fn values(&self) -> &[PackedValue] {
        &self.values
    }

    /// Number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Decodes tagged wire values into owned native values.
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'r> {
    registry: &'r TypeRegistry,
    max_depth: usize,
}

impl<'r> Decoder<'r> {
    /// A decoder consulting `registry` for extension kinds.
    #[must_use]
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Override the nesting limit.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Decode one tagged value.
    ///
    /// # Safety
    ///
    /// Every pointer reachable from `raw` (strings, vector descriptors and
    /// their element buffers) must be valid for reads for the duration of
    /// this call.
    ///
    /// # Errors
    ///
    /// Returns [`CtiError::UnknownTypeCode`] for `Unknown` or unregistered
    /// codes, [`CtiError::NullPayload`] for null string or vector data,
    /// [`CtiError::InvalidString`] for non UTF-8 text and
    /// [`CtiError::NestingTooDeep`] past the depth limit.
    pub unsafe fn decode(&self, raw: RawArg) -> CtiResult<Value> {
        // SAFETY: forwarded from the caller.
        unsafe { self.decode_at(raw.type_code, raw.value, 0) }
    }

    unsafe fn decode_at(&self, code: TypeCode, value: PackedValue, depth: usize) -> CtiResult<Value> {
        // SAFETY (all union reads): `code` selects the live field; pointer
        // validity is guaranteed by the caller of `decode`.
        match code {
            TypeCode::UNKNOWN => Err(CtiError::UnknownTypeCode(code)),
            TypeCode::INT64 => Ok(Value::Int(unsafe { value.v_int64 })),
            TypeCode::FLOAT64 => Ok(Value::Float(unsafe { value.v_float64 })),
            TypeCode::POINTER => Ok(Value::Ptr(value.as_handle())),
            TypeCode::STRING => {
                let ptr = unsafe { value.v_str };
                if ptr.is_null() {
                    return Err(CtiError::NullPayload(code));
                }
                let bytes = unsafe { CStr::from_ptr(ptr) }.to_bytes().to_vec();
                String::from_utf8(bytes)
                    .map(Value::Str)
                    .map_err(|_| CtiError::InvalidString("string is not valid UTF-8".to_owned()))
            },
            TypeCode::FUNCTION_REF => Ok(Value::Func(FuncRef::new(RawHandle::from_ptr(unsafe {
                value.v_func
            })))),
            TypeCode::VECTOR => unsafe { self.decode_vector(value, depth) },
            ext => {
                if self.registry.lookup_by_code(ext).is_none() {
                    return Err(CtiError::UnknownTypeCode(ext));
                }
                Ok(Value::Ext(ExtValue::new(ext, value.as_handle())))
            },
        }
    }

    unsafe fn decode_vector(&self, value: PackedValue, depth: usize) -> CtiResult<Value> {
        if depth >= self.max_depth {
            return Err(CtiError::NestingTooDeep {
                limit: self.max_depth,
            });
        }
        // SAFETY: `value` is a vector payload; see `decode`.
        let descriptor = unsafe { value.v_vec };
        if descriptor.is_null() {
            return Err(CtiError::NullPayload(TypeCode::VECTOR));
        }
        // SAFETY: non-null descriptor provided by the caller.
        let descriptor = unsafe { *descriptor };
        if descriptor.size == 0 {
            return Ok(Value::Vec(Vec::new()));
        }
        if descriptor.data.is_null() {
            return Err(CtiError::NullPayload(TypeCode::VECTOR));
        }

        trace!(
            len = descriptor.size,
            element = descriptor.type_code.0,
            depth,
            "decoding vector"
        );
        // SAFETY: the descriptor reports `size` payloads at `data`.
        let items = unsafe { std::slice::from_raw_parts(descriptor.data, descriptor.size) };
        items
            .iter()
            .map(|&item| unsafe { self.decode_at(descriptor.type_code, item, depth.saturating_add(1)) })
            .collect::<CtiResult<Vec<_>>>()
            .map(Value::Vec)
    }
}

/// Map a dynamically-typed native value onto a packed kind.
///
/// Checks run in a fixed order: integers, floats, strings, function
/// references and raw pointers, ordered sequences, an already-built
/// [`Value`], then each registered extension probe in ascending code order.
///
/// # Errors
///
/// Returns [`CtiError::UnsupportedValueKind`] if nothing matches.
pub fn classify(value: &dyn Any, registry: &TypeRegistry) -> CtiResult<Value> {
    macro_rules! try_downcast {
        ($($t:ty),*) => {
            $(
                if let Some(v) = value.downcast_ref::<$t>() {
                    return Ok(Value::from(v.clone()));
                }
            )*
        };
    }

    try_downcast!(i64, i32, i16, i8, u32, u16, u8);
    if let Some(v) = value.downcast_ref::<u64>() {
        return i64::try_from(*v).map(Value::Int).map_err(|_| {
            CtiError::UnsupportedValueKind(format!("u64 {v} does not fit in Int64"))
        });
    }
    try_downcast!(f64, f32);
    try_downcast!(String, &'static str);
    try_downcast!(FuncRef, RawHandle);
    try_downcast!(Vec<Value>, Vec<i64>, Vec<i32>, Vec<i16>, Vec<i8>, Vec<u32>, Vec<u16>, Vec<u8>);
    try_downcast!(Vec<f64>, Vec<f32>, Vec<String>, Vec<&'static str>, Vec<FuncRef>);
    try_downcast!(
        Vec<Vec<Value>>,
        Vec<Vec<i64>>,
        Vec<Vec<i32>>,
        Vec<Vec<f64>>,
        Vec<Vec<String>>,
        Vec<Vec<&'static str>>
    );
    if let Some(v) = value.downcast_ref::<Value>() {
        return Ok(v.clone());
    }

    for (code, probe) in registry.extension_probes() {
        if let Some(handle) = probe(value) {
            return Ok(Value::Ext(ExtValue::new(code, handle)));
        }
    }

    Err(CtiError::UnsupportedValueKind(
        "value matches no packed kind".to_owned(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ExtensionHooks, TypeRegistry};

    fn round_trip(registry: &TypeRegistry, value: &Value) -> Value {
        let mut enc = Encoder::new(registry);
        let raw = enc.encode(value).unwrap();
        unsafe { Decoder::new(registry).decode(raw) }.unwrap()
    }

    #[test]
    fn test_scalar_round_trips() {
        let reg = TypeRegistry::new();
        for v in [0, -1, i64::MIN, i64::MAX] {
            assert_eq!(round_trip(&reg, &Value::Int(v)), Value::Int(v));
        }
        for s in ["", "hello", "héllo wörld ✓"] {
            assert_eq!(round_trip(&reg, &Value::from(s)), Value::from(s));
        }
        let h = RawHandle::from_addr(0x1000);
        assert_eq!(round_trip(&reg, &Value::Ptr(h)), Value::Ptr(h));
        let f = FuncRef::new(RawHandle::from_addr(0x2000));
        assert_eq!(round_trip(&reg, &Value::Func(f)), Value::Func(f));
    }

    #[test]
    fn test_float_bit_patterns_preserved() {
        let reg = TypeRegistry::new();
        for v in [0.0, -0.0, 1.5, f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            match round_trip(&reg, &Value::Float(v)) {
                Value::Float(back) => assert_eq!(back.to_bits(), v.to_bits()),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_mixed_vector_rejected() {
        let reg = TypeRegistry::new();
        let mixed = Value::Vec(vec![Value::Int(1), Value::Int(2), Value::from("x")]);
        let err = Encoder::new(&reg).encode(&mixed).unwrap_err();
        assert!(matches!(
            err,
            CtiError::InconsistentVectorType {
                expected: TypeCode::INT64,
                found: TypeCode::STRING,
                index: 2
            }
        ));
    }

    #[test]
    fn test_empty_vector() {
        let reg = TypeRegistry::new();
        let mut enc = Encoder::new(&reg);
        let raw = enc.encode(&Value::Vec(Vec::new())).unwrap();
        assert_eq!(raw.type_code, TypeCode::VECTOR);
        let descriptor = unsafe { *raw.value.v_vec };
        assert_eq!(descriptor.size, 0);
        assert_eq!(descriptor.type_code, TypeCode::UNKNOWN);
        let back = unsafe { Decoder::new(&reg).decode(raw) }.unwrap();
        assert_eq!(back, Value::Vec(Vec::new()));
    }

    #[test]
    fn test_empty_vector_decodes_regardless_of_element_kind() {
        let reg = TypeRegistry::new();
        let descriptor = PackedVector {
            data: std::ptr::null(),
            size: 0,
            type_code: TypeCode(999),
        };
        let raw = RawArg::new(TypeCode::VECTOR, PackedValue { v_vec: &raw const descriptor });
        let back = unsafe { Decoder::new(&reg).decode(raw) }.unwrap();
        assert_eq!(back, Value::Vec(Vec::new()));
    }

    #[test]
    fn test_nested_vector_round_trip() {
        let reg = TypeRegistry::new();
        let nested = Value::from(vec![vec![1, 2, 3], vec![4]]);
        assert_eq!(round_trip(&reg, &nested), nested);
    }

    #[test]
    fn test_outer_vector_compares_codes_only() {
        let reg = TypeRegistry::new();
        let nested = Value::Vec(vec![Value::from(vec![1]), Value::Vec(Vec::new())]);
        assert_eq!(round_trip(&reg, &nested), nested);
    }

    #[test]
    fn test_unknown_code_rejected_on_decode() {
        let reg = TypeRegistry::new();
        let decoder = Decoder::new(&reg);
        let err = unsafe { decoder.decode(RawArg::new(TypeCode::UNKNOWN, PackedValue::zeroed())) }
            .unwrap_err();
        assert!(matches!(err, CtiError::UnknownTypeCode(TypeCode::UNKNOWN)));
        let err = unsafe { decoder.decode(RawArg::new(TypeCode(77), PackedValue::zeroed())) }
            .unwrap_err();
        assert!(matches!(err, CtiError::UnknownTypeCode(TypeCode(77))));
    }

    #[test]
    fn test_null_string_rejected() {
        let reg = TypeRegistry::new();
        let raw = RawArg::new(TypeCode::STRING, PackedValue { v_str: std::ptr::null() });
        let err = unsafe { Decoder::new(&reg).decode(raw) }.unwrap_err();
        assert!(matches!(err, CtiError::NullPayload(TypeCode::STRING)));
    }

    #[test]
    fn test_non_utf8_rejected() {
        let reg = TypeRegistry::new();
        let bytes = c"\xff\xfe";
        let raw = RawArg::new(TypeCode::STRING, PackedValue { v_str: bytes.as_ptr() });
        let err = unsafe { Decoder::new(&reg).decode(raw) }.unwrap_err();
        assert!(matches!(err, CtiError::InvalidString(_)));
    }

    #[test]
    fn test_interior_nul_rejected() {
        let reg = TypeRegistry::new();
        let err = Encoder::new(&reg).encode(&Value::from("a\0b")).unwrap_err();
        assert!(matches!(err, CtiError::InvalidString(_)));
    }

    #[test]
    fn test_depth_limit() {
        let reg = TypeRegistry::new();
        let two = Value::from(vec![vec![1]]);
        let three = Value::Vec(vec![two.clone()]);
        let mut enc = Encoder::new(&reg).with_max_depth(2);
        let raw = enc.encode(&two).unwrap();
        assert!(matches!(
            enc.encode(&three),
            Err(CtiError::NestingTooDeep { limit: 2 })
        ));

        let mut deep_enc = Encoder::new(&reg);
        let deep_raw = deep_enc.encode(&three).unwrap();
        let shallow = Decoder::new(&reg).with_max_depth(2);
        assert!(unsafe { shallow.decode(raw) }.is_ok());
        assert!(matches!(
            unsafe { shallow.decode(deep_raw) },
            Err(CtiError::NestingTooDeep { limit: 2 })
        ));
    }

    fn probe_u128_high(v: &dyn Any) -> Option<RawHandle> {
        v.downcast_ref::<u128>().map(|_| RawHandle::from_addr(0x55))
    }

    fn probe_u128_low(v: &dyn Any) -> Option<RawHandle> {
        v.downcast_ref::<u128>().map(|_| RawHandle::from_addr(0x12))
    }

    fn probe_u128(v: &dyn Any) -> Option<RawHandle> {
        v.downcast_ref::<u128>()
            .map(|x| RawHandle::from_addr(usize::try_from(*x).unwrap_or(0)))
    }

    #[test]
    fn test_extension_encode_requires_registration() {
        let reg = TypeRegistry::new();
        let ext = Value::Ext(ExtValue::new(TypeCode(32), RawHandle::from_addr(4)));
        let err = Encoder::new(&reg).encode(&ext).unwrap_err();
        assert!(matches!(err, CtiError::UnsupportedValueKind(_)));

        reg.register(TypeCode(32), "Wide", ExtensionHooks::new(probe_u128))
            .unwrap();
        assert_eq!(round_trip(&reg, &ext), ext);
    }

    #[test]
    fn test_pack_aborts_on_first_failure() {
        let reg = TypeRegistry::new();
        let args = [Value::Int(1), Value::Vec(vec![Value::Int(1), Value::Float(1.0)])];
        assert!(Encoder::new(&reg).pack(&args).is_err());

        let packed = Encoder::new(&reg)
            .pack(&[Value::Int(1), Value::from("two")])
            .unwrap();
        assert_eq!(packed.len(), 2);
        assert_eq!(packed.type_codes(), &[TypeCode::INT64, TypeCode::STRING]);
    }

    #[test]
    fn test_classify_priority() {
        let reg = TypeRegistry::new();
        assert_eq!(classify(&7_u8, &reg).unwrap(), Value::Int(7));
        assert_eq!(classify(&2.5_f32, &reg).unwrap(), Value::Float(2.5));
        assert_eq!(classify(&"hi", &reg).unwrap(), Value::from("hi"));
        assert_eq!(
            classify(&vec![1_i64, 2], &reg).unwrap(),
            Value::from(vec![1, 2])
        );
        assert_eq!(
            classify(&vec![1_i32, 2], &reg).unwrap(),
            Value::from(vec![1, 2])
        );
        assert_eq!(
            classify(&vec![0.5_f32], &reg).unwrap(),
            Value::from(vec![0.5])
        );
        assert_eq!(
            classify(&vec!["a", "b"], &reg).unwrap(),
            Value::from(vec!["a", "b"])
        );
        assert_eq!(
            classify(&vec![vec![1_i64, 2, 3], vec![4]], &reg).unwrap(),
            Value::from(vec![vec![1, 2, 3], vec![4]])
        );
        assert_eq!(
            classify(&vec![vec![Value::Int(1)], Vec::new()], &reg).unwrap(),
            Value::Vec(vec![Value::Vec(vec![Value::Int(1)]), Value::Vec(Vec::new())])
        );
        assert!(matches!(
            classify(&u64::MAX, &reg),
            Err(CtiError::UnsupportedValueKind(_))
        ));
        match classify(&5_u128, &reg) {
            Err(CtiError::UnsupportedValueKind(msg)) => {
                assert_eq!(msg, "value matches no packed kind");
            },
            other => panic!("unexpected {other:?}"),
        }

        reg.register(TypeCode(60), "Wide", ExtensionHooks::new(probe_u128))
            .unwrap();
        assert_eq!(
            classify(&5_u128, &reg).unwrap(),
            Value::Ext(ExtValue::new(TypeCode(60), RawHandle::from_addr(5)))
        );
    }

    #[test]
    fn test_lowest_extension_code_wins() {
        let reg = TypeRegistry::new();
        reg.register(TypeCode(55), "High", ExtensionHooks::new(probe_u128_high))
            .unwrap();
        reg.register(TypeCode(12), "Low", ExtensionHooks::new(probe_u128_low))
            .unwrap();
        assert_eq!(
            classify(&9_u128, &reg).unwrap(),
            Value::Ext(ExtValue::new(TypeCode(12), RawHandle::from_addr(0x12)))
        );
    }
}
