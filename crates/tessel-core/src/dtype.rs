use std::fmt;

/// Element types a tensor can hold.
///
/// Every dtype has a fixed itemsize; there are no packed types at this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// Boolean, stored as one byte (0 or 1)
    Bool,
    /// 8-bit signed integer
    I8,
    /// 16-bit signed integer
    I16,
    /// 32-bit signed integer
    I32,
    /// 64-bit signed integer
    I64,
    /// 8-bit unsigned integer
    U8,
    /// 16-bit unsigned integer
    U16,
    /// 32-bit unsigned integer
    U32,
    /// 64-bit unsigned integer
    U64,
    /// 16-bit IEEE 754 half-precision float
    F16,
    /// 16-bit Brain Float (same exponent range as F32, reduced mantissa)
    BF16,
    /// 32-bit IEEE 754 single-precision float
    F32,
    /// 64-bit IEEE 754 double-precision float
    F64,
    /// Complex number with two f32 components
    C64,
}

/// Coarse classification used by dispatch decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Bool,
    Signed,
    Unsigned,
    Floating,
    Complex,
}

impl DType {
    pub const ALL: [DType; 14] = [
        DType::Bool,
        DType::I8,
        DType::I16,
        DType::I32,
        DType::I64,
        DType::U8,
        DType::U16,
        DType::U32,
        DType::U64,
        DType::F16,
        DType::BF16,
        DType::F32,
        DType::F64,
        DType::C64,
    ];

    /// Size in bytes of a single element.
    pub fn itemsize(&self) -> usize {
        match self {
            DType::Bool | DType::I8 | DType::U8 => 1,
            DType::I16 | DType::U16 | DType::F16 | DType::BF16 => 2,
            DType::I32 | DType::U32 | DType::F32 => 4,
            DType::I64 | DType::U64 | DType::F64 | DType::C64 => 8,
        }
    }

    /// Number of bytes needed to store `n` elements of this dtype.
    pub fn storage_bytes(&self, n: usize) -> usize {
        self.itemsize() * n
    }

    pub fn category(&self) -> Category {
        match self {
            DType::Bool => Category::Bool,
            DType::I8 | DType::I16 | DType::I32 | DType::I64 => Category::Signed,
            DType::U8 | DType::U16 | DType::U32 | DType::U64 => Category::Unsigned,
            DType::F16 | DType::BF16 | DType::F32 | DType::F64 => Category::Floating,
            DType::C64 => Category::Complex,
        }
    }

    /// Whether this dtype is a real floating-point type.
    pub fn is_floating_point(&self) -> bool {
        self.category() == Category::Floating
    }

    /// Whether this dtype is a signed or unsigned integer type.
    pub fn is_integral(&self) -> bool {
        matches!(self.category(), Category::Signed | Category::Unsigned)
    }

    pub fn is_unsigned(&self) -> bool {
        self.category() == Category::Unsigned
    }

    pub fn is_signed(&self) -> bool {
        self.category() == Category::Signed
    }

    pub fn is_complex(&self) -> bool {
        self.category() == Category::Complex
    }

    pub fn is_bool(&self) -> bool {
        self.category() == Category::Bool
    }

    /// Whether values of this dtype have a total-ish order (everything but complex).
    pub fn is_real(&self) -> bool {
        !self.is_complex()
    }

    /// Lowercase name used in error messages and Display.
    pub fn name(&self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::I8 => "int8",
            DType::I16 => "int16",
            DType::I32 => "int32",
            DType::I64 => "int64",
            DType::U8 => "uint8",
            DType::U16 => "uint16",
            DType::U32 => "uint32",
            DType::U64 => "uint64",
            DType::F16 => "float16",
            DType::BF16 => "bfloat16",
            DType::F32 => "float32",
            DType::F64 => "float64",
            DType::C64 => "complex64",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
