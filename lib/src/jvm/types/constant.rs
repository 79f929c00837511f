use crate::jvm::types::{FieldType, RefType, RenderDescriptor};
use crate::jvm::BinaryName;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Value that can live in the constant pool and be pushed with `ldc` (or be the initial value of
/// a static field)
#[derive(Clone, Debug)]
pub enum ConstantValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Class(RefType<BinaryName>),
}

impl ConstantValue {
    /// Type of the value once pushed on the stack
    pub fn field_type(&self) -> FieldType<BinaryName> {
        match self {
            ConstantValue::Int(_) => FieldType::int(),
            ConstantValue::Long(_) => FieldType::long(),
            ConstantValue::Float(_) => FieldType::float(),
            ConstantValue::Double(_) => FieldType::double(),
            ConstantValue::String(_) => FieldType::object(BinaryName::STRING),
            ConstantValue::Class(_) => FieldType::object(BinaryName::CLASS),
        }
    }

    /// `long` and `double` need `ldc2_w`
    pub fn is_wide(&self) -> bool {
        matches!(self, ConstantValue::Long(_) | ConstantValue::Double(_))
    }

    /// Can this be the `ConstantValue` attribute of a field of the given type?
    pub fn fits_field(&self, field_type: &FieldType<BinaryName>) -> bool {
        use crate::jvm::types::BaseType::*;
        match (self, field_type) {
            (ConstantValue::Int(_), FieldType::Base(Int | Short | Char | Byte | Boolean)) => true,
            (ConstantValue::Long(_), FieldType::Base(Long)) => true,
            (ConstantValue::Float(_), FieldType::Base(Float)) => true,
            (ConstantValue::Double(_), FieldType::Base(Double)) => true,
            (ConstantValue::String(_), FieldType::Ref(RefType::Object(name))) => {
                name == &BinaryName::STRING
            }
            _ => false,
        }
    }
}

impl From<&str> for ConstantValue {
    fn from(string: &str) -> ConstantValue {
        ConstantValue::String(string.to_owned())
    }
}

impl From<i32> for ConstantValue {
    fn from(int: i32) -> ConstantValue {
        ConstantValue::Int(int)
    }
}

impl From<i64> for ConstantValue {
    fn from(long: i64) -> ConstantValue {
        ConstantValue::Long(long)
    }
}

impl From<f32> for ConstantValue {
    fn from(float: f32) -> ConstantValue {
        ConstantValue::Float(float)
    }
}

impl From<f64> for ConstantValue {
    fn from(double: f64) -> ConstantValue {
        ConstantValue::Double(double)
    }
}

/// Floats compare by bit pattern, so that `NaN` constants are deduplicated like any other
impl PartialEq for ConstantValue {
    fn eq(&self, other: &ConstantValue) -> bool {
        match (self, other) {
            (ConstantValue::Int(a), ConstantValue::Int(b)) => a == b,
            (ConstantValue::Long(a), ConstantValue::Long(b)) => a == b,
            (ConstantValue::Float(a), ConstantValue::Float(b)) => a.to_bits() == b.to_bits(),
            (ConstantValue::Double(a), ConstantValue::Double(b)) => a.to_bits() == b.to_bits(),
            (ConstantValue::String(a), ConstantValue::String(b)) => a == b,
            (ConstantValue::Class(a), ConstantValue::Class(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ConstantValue {}

impl Hash for ConstantValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ConstantValue::Int(i) => i.hash(state),
            ConstantValue::Long(l) => l.hash(state),
            ConstantValue::Float(f) => f.to_bits().hash(state),
            ConstantValue::Double(d) => d.to_bits().hash(state),
            ConstantValue::String(s) => s.hash(state),
            ConstantValue::Class(c) => c.hash(state),
        }
    }
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Int(i) => write!(f, "{}", i),
            ConstantValue::Long(l) => write!(f, "{}l", l),
            ConstantValue::Float(x) => write!(f, "{}f", x),
            ConstantValue::Double(d) => write!(f, "{}d", d),
            ConstantValue::String(s) => write!(f, "{:?}", s),
            ConstantValue::Class(RefType::Object(name)) => write!(f, "{}.class", name),
            ConstantValue::Class(other) => write!(f, "{}.class", other.render()),
        }
    }
}
