//! Core data types: element types, tagged values, dimensions and attributes

use crate::error::{NcError, Result};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// External element types of a netCDF-style file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DataType {
    /// Signed 8-bit integer
    Byte = 1,
    /// 8-bit text character
    Char = 2,
    /// Signed 16-bit integer
    Short = 3,
    /// Signed 32-bit integer
    Int = 4,
    /// 32-bit floating point
    Float = 5,
    /// 64-bit floating point
    Double = 6,
    /// Unsigned 8-bit integer
    UByte = 7,
    /// Unsigned 16-bit integer
    UShort = 8,
    /// Unsigned 32-bit integer
    UInt = 9,
    /// Signed 64-bit integer
    Int64 = 10,
    /// Unsigned 64-bit integer
    UInt64 = 11,
}

impl DataType {
    /// Size in bytes of one element
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DataType::Byte | DataType::Char | DataType::UByte => 1,
            DataType::Short | DataType::UShort => 2,
            DataType::Int | DataType::UInt | DataType::Float => 4,
            DataType::Double | DataType::Int64 | DataType::UInt64 => 8,
        }
    }

    /// Native type code used by the file engine
    pub fn code(&self) -> i32 {
        *self as i32
    }

    /// Convert from a native type code
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(DataType::Byte),
            2 => Some(DataType::Char),
            3 => Some(DataType::Short),
            4 => Some(DataType::Int),
            5 => Some(DataType::Float),
            6 => Some(DataType::Double),
            7 => Some(DataType::UByte),
            8 => Some(DataType::UShort),
            9 => Some(DataType::UInt),
            10 => Some(DataType::Int64),
            11 => Some(DataType::UInt64),
            _ => None,
        }
    }

    /// CDL name of the type
    pub fn type_name(&self) -> &'static str {
        match self {
            DataType::Byte => "byte",
            DataType::Char => "char",
            DataType::Short => "short",
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::UByte => "ubyte",
            DataType::UShort => "ushort",
            DataType::UInt => "uint",
            DataType::Int64 => "int64",
            DataType::UInt64 => "uint64",
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, DataType::Char)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DataType::Float | DataType::Double)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A single decoded element
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Byte(i8),
    Char(u8),
    Short(i16),
    Int(i32),
    Float(f32),
    Double(f64),
    UByte(u8),
    UShort(u16),
    UInt(u32),
    Int64(i64),
    UInt64(u64),
}

impl Value {
    /// Decode one native-endian element of `data_type` from `bytes`
    pub fn decode(data_type: DataType, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != data_type.size_in_bytes() {
            return Err(NcError::ShapeMismatch {
                expected: data_type.size_in_bytes(),
                actual: bytes.len(),
            });
        }

        Ok(match data_type {
            DataType::Byte => Value::Byte(i8::from_ne_slice(bytes)),
            DataType::Char => Value::Char(bytes[0]),
            DataType::Short => Value::Short(i16::from_ne_slice(bytes)),
            DataType::Int => Value::Int(i32::from_ne_slice(bytes)),
            DataType::Float => Value::Float(f32::from_ne_slice(bytes)),
            DataType::Double => Value::Double(f64::from_ne_slice(bytes)),
            DataType::UByte => Value::UByte(bytes[0]),
            DataType::UShort => Value::UShort(u16::from_ne_slice(bytes)),
            DataType::UInt => Value::UInt(u32::from_ne_slice(bytes)),
            DataType::Int64 => Value::Int64(i64::from_ne_slice(bytes)),
            DataType::UInt64 => Value::UInt64(u64::from_ne_slice(bytes)),
        })
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Value::Byte(_) => DataType::Byte,
            Value::Char(_) => DataType::Char,
            Value::Short(_) => DataType::Short,
            Value::Int(_) => DataType::Int,
            Value::Float(_) => DataType::Float,
            Value::Double(_) => DataType::Double,
            Value::UByte(_) => DataType::UByte,
            Value::UShort(_) => DataType::UShort,
            Value::UInt(_) => DataType::UInt,
            Value::Int64(_) => DataType::Int64,
            Value::UInt64(_) => DataType::UInt64,
        }
    }

    /// Numeric value widened to f64; text characters yield their code point
    pub fn to_f64(&self) -> Option<f64> {
        match *self {
            Value::Byte(v) => v.to_f64(),
            Value::Char(v) => v.to_f64(),
            Value::Short(v) => v.to_f64(),
            Value::Int(v) => v.to_f64(),
            Value::Float(v) => v.to_f64(),
            Value::Double(v) => Some(v),
            Value::UByte(v) => v.to_f64(),
            Value::UShort(v) => v.to_f64(),
            Value::UInt(v) => v.to_f64(),
            Value::Int64(v) => v.to_f64(),
            Value::UInt64(v) => v.to_f64(),
        }
    }

    /// Encode as native-endian bytes
    pub fn to_ne_bytes(&self) -> Vec<u8> {
        match *self {
            Value::Byte(v) => v.to_ne_bytes().to_vec(),
            Value::Char(v) | Value::UByte(v) => vec![v],
            Value::Short(v) => v.to_ne_bytes().to_vec(),
            Value::Int(v) => v.to_ne_bytes().to_vec(),
            Value::Float(v) => v.to_ne_bytes().to_vec(),
            Value::Double(v) => v.to_ne_bytes().to_vec(),
            Value::UShort(v) => v.to_ne_bytes().to_vec(),
            Value::UInt(v) => v.to_ne_bytes().to_vec(),
            Value::Int64(v) => v.to_ne_bytes().to_vec(),
            Value::UInt64(v) => v.to_ne_bytes().to_vec(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Byte(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "{}", *v as char),
            Value::Short(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::UByte(v) => write!(f, "{}", v),
            Value::UShort(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::UInt64(v) => write!(f, "{}", v),
        }
    }
}

/// Fixed-width Rust scalars that can be viewed out of a byte buffer
pub trait Element: Copy + Default + Send + Sync + 'static {
    /// Element types whose bytes this scalar reads
    const DATA_TYPES: &'static [DataType];

    /// Read one value from a native-endian slice of exactly `size_of::<Self>()` bytes
    fn from_ne_slice(bytes: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($t:ty, [$($dt:expr),+]) => {
        impl Element for $t {
            const DATA_TYPES: &'static [DataType] = &[$($dt),+];

            fn from_ne_slice(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(bytes);
                <$t>::from_ne_bytes(raw)
            }
        }
    };
}

impl_element!(i8, [DataType::Byte]);
impl_element!(u8, [DataType::UByte, DataType::Char]);
impl_element!(i16, [DataType::Short]);
impl_element!(u16, [DataType::UShort]);
impl_element!(i32, [DataType::Int]);
impl_element!(u32, [DataType::UInt]);
impl_element!(i64, [DataType::Int64]);
impl_element!(u64, [DataType::UInt64]);
impl_element!(f32, [DataType::Float]);
impl_element!(f64, [DataType::Double]);

/// Decode a whole native-endian buffer into typed values
pub fn decode_elements<T: Element>(data_type: DataType, bytes: &[u8]) -> Result<Vec<T>> {
    if !T::DATA_TYPES.contains(&data_type) {
        return Err(NcError::Unsupported(format!(
            "cannot view {} data as {}",
            data_type,
            std::any::type_name::<T>()
        )));
    }

    let width = data_type.size_in_bytes();
    if bytes.len() % width != 0 {
        return Err(NcError::InvalidFormat(
            "Byte length not aligned with data type size".to_string(),
        ));
    }

    Ok(bytes.chunks_exact(width).map(T::from_ne_slice).collect())
}

/// One axis of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    /// Dimension name, unique within a file
    pub name: String,
    /// Number of elements along the axis
    pub length: usize,
    /// Whether the axis is the growable (unlimited) one
    pub growable: bool,
}

impl Dimension {
    pub fn new(name: impl Into<String>, length: usize) -> Self {
        Self {
            name: name.into(),
            length,
            growable: false,
        }
    }

    pub fn growable(name: impl Into<String>, length: usize) -> Self {
        Self {
            name: name.into(),
            length,
            growable: true,
        }
    }
}

/// Attribute payload: a text string or a list of numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValues {
    Text(String),
    Numbers(Vec<Value>),
}

/// Named metadata attached to a file or a variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub values: AttributeValues,
}

impl Attribute {
    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: AttributeValues::Text(text.into()),
        }
    }

    pub fn numbers(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values: AttributeValues::Numbers(values),
        }
    }

    /// Element type of the attribute; empty number lists report `Double`
    pub fn data_type(&self) -> DataType {
        match &self.values {
            AttributeValues::Text(_) => DataType::Char,
            AttributeValues::Numbers(values) => values
                .first()
                .map(Value::data_type)
                .unwrap_or(DataType::Double),
        }
    }
}

/// Per-file description of a variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSchema {
    pub name: String,
    pub data_type: DataType,
    /// Dimension names in significance order (axis 0 first)
    pub dimension_names: Vec<String>,
    pub attributes: Vec<Attribute>,
}

impl VariableSchema {
    pub fn new(
        name: impl Into<String>,
        data_type: DataType,
        dimension_names: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            data_type,
            dimension_names: dimension_names.iter().map(|d| d.to_string()).collect(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Resolve the per-axis lengths against a file's dimensions
    pub fn shape(&self, dimensions: &[Dimension]) -> Option<Vec<usize>> {
        self.dimension_names
            .iter()
            .map(|name| dimensions.iter().find(|d| &d.name == name).map(|d| d.length))
            .collect()
    }
}
