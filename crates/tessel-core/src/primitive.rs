//! Graph-node operations.
//!
//! A [`Primitive`] names an operation and carries only the parameters it needs.
//! [`OpKind`] is the parameter-free tag backends key their capability tables on.

use std::fmt;

macro_rules! op_kinds {
    ($($name:ident),* $(,)?) => {
        /// Parameter-free tag for every operation kind.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum OpKind {
            $($name),*
        }

        impl OpKind {
            pub const ALL: &'static [OpKind] = &[$(OpKind::$name),*];

            /// Operation name as it appears in error messages.
            pub fn name(self) -> &'static str {
                match self {
                    $(OpKind::$name => stringify!($name)),*
                }
            }
        }
    };
}

op_kinds! {
    Abs, Add, AddMM, Arange, ArcCos, ArcCosh, ArcSin, ArcSinh, ArcTan, ArcTanh,
    ArgPartition, ArgReduce, ArgSort, AsType, AsStrided, Broadcast, Ceil, Compiled,
    Concatenate, Convolution, Copy, Cos, Cosh, CustomVJP, Depends, Divide, DivMod,
    Remainder, Equal, Erf, ErfInv, Exp, FFT, Floor, Full, Gather, Greater,
    GreaterEqual, Less, LessEqual, Load, Log, Log1p, LogicalNot, LogicalAnd,
    LogicalOr, LogAddExp, Matmul, Maximum, Minimum, Multiply, Negative, NotEqual,
    Pad, Partition, Power, QRF, QuantizedMatmul, RandomBits, Reduce, Reshape,
    Round, Scan, Scatter, Sigmoid, Sign, Sin, Sinh, Slice, Softmax, Sort, Split,
    Square, Sqrt, StopGradient, Subtract, Tan, Tanh, Transpose,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Logarithm base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogBase {
    E,
    Two,
    Ten,
}

/// Reductions over a set of axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReduceKind {
    And,
    Or,
    Sum,
    Prod,
    Min,
    Max,
}

/// Associative operations a scan can accumulate with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanKind {
    Sum,
    Prod,
    Min,
    Max,
    LogAddExp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgReduceKind {
    ArgMin,
    ArgMax,
}

/// How scattered updates combine with the existing value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScatterKind {
    None,
    Sum,
    Prod,
    Max,
    Min,
}

/// An operation node. Immutable and stateless; the output dtype and shape are
/// carried by the output tensors handed to the evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Abs,
    Add,
    /// `alpha * (a @ b) + beta * c`
    AddMM { alpha: f32, beta: f32 },
    Arange { start: f64, stop: f64, step: f64 },
    ArcCos,
    ArcCosh,
    ArcSin,
    ArcSinh,
    ArcTan,
    ArcTanh,
    ArgPartition { kth: usize, axis: usize },
    ArgReduce { kind: ArgReduceKind, axis: usize },
    ArgSort { axis: usize },
    /// Cast to the output tensor's dtype.
    AsType,
    /// Offset is relative to the input's own offset.
    AsStrided { strides: Vec<usize>, offset: usize },
    Broadcast,
    Ceil,
    Compiled,
    Concatenate { axis: usize },
    Convolution,
    Copy,
    Cos,
    Cosh,
    CustomVJP,
    Depends,
    Divide,
    DivMod,
    Remainder,
    Equal,
    Erf,
    ErfInv,
    Exp,
    FFT,
    Floor,
    Full,
    Gather { axes: Vec<usize>, slice_sizes: Vec<usize> },
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Load,
    Log { base: LogBase },
    Log1p,
    LogicalNot,
    LogicalAnd,
    LogicalOr,
    LogAddExp,
    Matmul,
    Maximum,
    Minimum,
    Multiply,
    Negative,
    NotEqual,
    Pad { axes: Vec<usize>, low: Vec<usize>, high: Vec<usize> },
    Partition { kth: usize, axis: usize },
    Power,
    QRF,
    QuantizedMatmul,
    /// `width` is the output itemsize in bytes.
    RandomBits { width: usize },
    Reduce { kind: ReduceKind, axes: Vec<usize> },
    Reshape,
    Round,
    Scan { reduce_type: ScanKind, axis: usize, reverse: bool, inclusive: bool },
    Scatter { kind: ScatterKind, axes: Vec<usize> },
    Sigmoid,
    Sign,
    Sin,
    Sinh,
    Slice { start: Vec<usize>, stop: Vec<usize>, step: Vec<usize> },
    Softmax,
    Sort { axis: usize },
    Split { indices: Vec<usize>, axis: usize },
    Square,
    Sqrt { recip: bool },
    StopGradient,
    Subtract,
    Tan,
    Tanh,
    Transpose { axes: Vec<usize> },
}

impl Primitive {
    pub fn kind(&self) -> OpKind {
        match self {
            Primitive::Abs => OpKind::Abs,
            Primitive::Add => OpKind::Add,
            Primitive::AddMM { .. } => OpKind::AddMM,
            Primitive::Arange { .. } => OpKind::Arange,
            Primitive::ArcCos => OpKind::ArcCos,
            Primitive::ArcCosh => OpKind::ArcCosh,
            Primitive::ArcSin => OpKind::ArcSin,
            Primitive::ArcSinh => OpKind::ArcSinh,
            Primitive::ArcTan => OpKind::ArcTan,
            Primitive::ArcTanh => OpKind::ArcTanh,
            Primitive::ArgPartition { .. } => OpKind::ArgPartition,
            Primitive::ArgReduce { .. } => OpKind::ArgReduce,
            Primitive::ArgSort { .. } => OpKind::ArgSort,
            Primitive::AsType => OpKind::AsType,
            Primitive::AsStrided { .. } => OpKind::AsStrided,
            Primitive::Broadcast => OpKind::Broadcast,
            Primitive::Ceil => OpKind::Ceil,
            Primitive::Compiled => OpKind::Compiled,
            Primitive::Concatenate { .. } => OpKind::Concatenate,
            Primitive::Convolution => OpKind::Convolution,
            Primitive::Copy => OpKind::Copy,
            Primitive::Cos => OpKind::Cos,
            Primitive::Cosh => OpKind::Cosh,
            Primitive::CustomVJP => OpKind::CustomVJP,
            Primitive::Depends => OpKind::Depends,
            Primitive::Divide => OpKind::Divide,
            Primitive::DivMod => OpKind::DivMod,
            Primitive::Remainder => OpKind::Remainder,
            Primitive::Equal => OpKind::Equal,
            Primitive::Erf => OpKind::Erf,
            Primitive::ErfInv => OpKind::ErfInv,
            Primitive::Exp => OpKind::Exp,
            Primitive::FFT => OpKind::FFT,
            Primitive::Floor => OpKind::Floor,
            Primitive::Full => OpKind::Full,
            Primitive::Gather { .. } => OpKind::Gather,
            Primitive::Greater => OpKind::Greater,
            Primitive::GreaterEqual => OpKind::GreaterEqual,
            Primitive::Less => OpKind::Less,
            Primitive::LessEqual => OpKind::LessEqual,
            Primitive::Load => OpKind::Load,
            Primitive::Log { .. } => OpKind::Log,
            Primitive::Log1p => OpKind::Log1p,
            Primitive::LogicalNot => OpKind::LogicalNot,
            Primitive::LogicalAnd => OpKind::LogicalAnd,
            Primitive::LogicalOr => OpKind::LogicalOr,
            Primitive::LogAddExp => OpKind::LogAddExp,
            Primitive::Matmul => OpKind::Matmul,
            Primitive::Maximum => OpKind::Maximum,
            Primitive::Minimum => OpKind::Minimum,
            Primitive::Multiply => OpKind::Multiply,
            Primitive::Negative => OpKind::Negative,
            Primitive::NotEqual => OpKind::NotEqual,
            Primitive::Pad { .. } => OpKind::Pad,
            Primitive::Partition { .. } => OpKind::Partition,
            Primitive::Power => OpKind::Power,
            Primitive::QRF => OpKind::QRF,
            Primitive::QuantizedMatmul => OpKind::QuantizedMatmul,
            Primitive::RandomBits { .. } => OpKind::RandomBits,
            Primitive::Reduce { .. } => OpKind::Reduce,
            Primitive::Reshape => OpKind::Reshape,
            Primitive::Round => OpKind::Round,
            Primitive::Scan { .. } => OpKind::Scan,
            Primitive::Scatter { .. } => OpKind::Scatter,
            Primitive::Sigmoid => OpKind::Sigmoid,
            Primitive::Sign => OpKind::Sign,
            Primitive::Sin => OpKind::Sin,
            Primitive::Sinh => OpKind::Sinh,
            Primitive::Slice { .. } => OpKind::Slice,
            Primitive::Softmax => OpKind::Softmax,
            Primitive::Sort { .. } => OpKind::Sort,
            Primitive::Split { .. } => OpKind::Split,
            Primitive::Square => OpKind::Square,
            Primitive::Sqrt { .. } => OpKind::Sqrt,
            Primitive::StopGradient => OpKind::StopGradient,
            Primitive::Subtract => OpKind::Subtract,
            Primitive::Tan => OpKind::Tan,
            Primitive::Tanh => OpKind::Tanh,
            Primitive::Transpose { .. } => OpKind::Transpose,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Whether this operation produces more than one output.
    pub fn is_multi_output(&self) -> bool {
        matches!(
            self,
            Primitive::Split { .. }
                | Primitive::DivMod
                | Primitive::Compiled
                | Primitive::CustomVJP
                | Primitive::Depends
                | Primitive::QRF
        )
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(Primitive::Abs.name(), "Abs");
        assert_eq!(Primitive::Sqrt { recip: true }.name(), "Sqrt");
        assert_eq!(Primitive::AddMM { alpha: 1.0, beta: 0.0 }.name(), "AddMM");
        assert_eq!(OpKind::QuantizedMatmul.to_string(), "QuantizedMatmul");
    }

    #[test]
    fn test_all_kinds_unique() {
        let mut names: Vec<_> = OpKind::ALL.iter().map(|k| k.name()).collect();
        let before = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), before);
        assert_eq!(before, 79);
    }

    #[test]
    fn test_multi_output() {
        assert!(Primitive::DivMod.is_multi_output());
        assert!(Primitive::Split { indices: vec![1], axis: 0 }.is_multi_output());
        assert!(!Primitive::Add.is_multi_output());
    }
}
