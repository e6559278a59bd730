//! Field and method descriptors.
//!
//! [`JType`] is the static type model shared by the whole pipeline: every AST node resolves to
//! one. Descriptors are parsed from their class-file string form (`I`, `[Ljava/lang/String;`,
//! `(IJ)V`) and reproduced verbatim by [`JType::descriptor`].
//!
//! # Examples
//!
//! ```rust
//! use jreify::model::{JType, MethodDescriptor};
//!
//! let desc = MethodDescriptor::parse("(IJ[Ljava/lang/String;)D")?;
//! assert_eq!(desc.params.len(), 3);
//! assert_eq!(desc.param_slots(), 4);
//! assert_eq!(desc.ret, JType::Double);
//! # Ok::<(), jreify::Error>(())
//! ```

use std::fmt;

use crate::{Error, Result};

/// Internal name of the root class.
pub const OBJECT_CLASS: &str = "java/lang/Object";
/// Internal name of the string class.
pub const STRING_CLASS: &str = "java/lang/String";
/// Internal name of the class-literal class.
pub const CLASS_CLASS: &str = "java/lang/Class";

/// A static type as seen by the reifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JType {
    /// Method return type `V`
    Void,
    /// `Z`
    Boolean,
    /// `B`
    Byte,
    /// `C`
    Char,
    /// `S`
    Short,
    /// `I`
    Int,
    /// `J`, occupies two slots
    Long,
    /// `F`
    Float,
    /// `D`, occupies two slots
    Double,
    /// A class or interface, by internal name
    Reference(String),
    /// An array with the given component type
    Array(Box<JType>),
    /// The type of the `null` literal, assignable to every reference type
    Null,
}

impl JType {
    /// Parses a single field descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidDescriptor`] if `desc` is not exactly one field descriptor.
    pub fn parse(desc: &str) -> Result<JType> {
        let mut pos = 0;
        let ty = parse_prefix(desc, &mut pos)?;
        if pos != desc.len() || ty == JType::Void {
            return Err(Error::InvalidDescriptor(desc.to_string()));
        }
        Ok(ty)
    }

    /// Shorthand for a reference to the given internal class name.
    #[must_use]
    pub fn object(class: &str) -> JType {
        JType::Reference(class.to_string())
    }

    /// Number of local or stack slots a value of this type occupies.
    #[must_use]
    pub fn slots(&self) -> usize {
        match self {
            JType::Void => 0,
            JType::Long | JType::Double => 2,
            _ => 1,
        }
    }

    /// Returns `true` for 64-bit primitives.
    #[must_use]
    pub fn is_wide(&self) -> bool {
        self.slots() == 2
    }

    /// Returns `true` for class, array and null types.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(self, JType::Reference(_) | JType::Array(_) | JType::Null)
    }

    /// Returns `true` for primitive value types (not `void`).
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        !self.is_reference() && *self != JType::Void
    }

    /// The type the operand stack uses for this type.
    ///
    /// Sub-int primitives widen to `int` on the stack.
    #[must_use]
    pub fn stack_type(&self) -> JType {
        match self {
            JType::Boolean | JType::Byte | JType::Char | JType::Short => JType::Int,
            other => other.clone(),
        }
    }

    /// Component type of an array, or `None` for non-array types.
    #[must_use]
    pub fn element(&self) -> Option<&JType> {
        match self {
            JType::Array(inner) => Some(inner),
            _ => None,
        }
    }

    /// Internal class name of a class type.
    #[must_use]
    pub fn class_name(&self) -> Option<&str> {
        match self {
            JType::Reference(name) => Some(name),
            _ => None,
        }
    }

    /// Encodes the type back into descriptor form.
    #[must_use]
    pub fn descriptor(&self) -> String {
        match self {
            JType::Void => "V".to_string(),
            JType::Boolean => "Z".to_string(),
            JType::Byte => "B".to_string(),
            JType::Char => "C".to_string(),
            JType::Short => "S".to_string(),
            JType::Int => "I".to_string(),
            JType::Long => "J".to_string(),
            JType::Float => "F".to_string(),
            JType::Double => "D".to_string(),
            JType::Reference(name) => format!("L{name};"),
            JType::Array(inner) => format!("[{}", inner.descriptor()),
            JType::Null => format!("L{OBJECT_CLASS};"),
        }
    }

    /// Parses the class operand of `checkcast`, `instanceof`, `anewarray` and friends.
    ///
    /// Those operands name classes by internal name but arrays by descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidDescriptor`] for a malformed array descriptor.
    pub fn from_class_operand(name: &str) -> Result<JType> {
        if name.starts_with('[') {
            JType::parse(name)
        } else {
            Ok(JType::object(name))
        }
    }
}

impl fmt::Display for JType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JType::Void => write!(f, "void"),
            JType::Boolean => write!(f, "boolean"),
            JType::Byte => write!(f, "byte"),
            JType::Char => write!(f, "char"),
            JType::Short => write!(f, "short"),
            JType::Int => write!(f, "int"),
            JType::Long => write!(f, "long"),
            JType::Float => write!(f, "float"),
            JType::Double => write!(f, "double"),
            JType::Reference(name) => write!(f, "{}", name.replace('/', ".")),
            JType::Array(inner) => write!(f, "{inner}[]"),
            JType::Null => write!(f, "null"),
        }
    }
}

fn parse_prefix(desc: &str, pos: &mut usize) -> Result<JType> {
    let invalid = || Error::InvalidDescriptor(desc.to_string());
    let bytes = desc.as_bytes();
    let Some(&tag) = bytes.get(*pos) else {
        return Err(invalid());
    };
    *pos += 1;

    let ty = match tag {
        b'V' => JType::Void,
        b'Z' => JType::Boolean,
        b'B' => JType::Byte,
        b'C' => JType::Char,
        b'S' => JType::Short,
        b'I' => JType::Int,
        b'J' => JType::Long,
        b'F' => JType::Float,
        b'D' => JType::Double,
        b'L' => {
            let start = *pos;
            let Some(len) = desc[start..].find(';') else {
                return Err(invalid());
            };
            if len == 0 {
                return Err(invalid());
            }
            *pos = start + len + 1;
            JType::Reference(desc[start..start + len].to_string())
        }
        b'[' => {
            let inner = parse_prefix(desc, pos)?;
            if inner == JType::Void {
                return Err(invalid());
            }
            JType::Array(Box::new(inner))
        }
        _ => return Err(invalid()),
    };
    Ok(ty)
}

/// A parsed method descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    /// Declared parameter types, receiver excluded
    pub params: Vec<JType>,
    /// Declared return type
    pub ret: JType,
}

impl MethodDescriptor {
    /// Parses a method descriptor such as `(ILjava/lang/String;)V`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidDescriptor`] if the string is malformed.
    pub fn parse(desc: &str) -> Result<MethodDescriptor> {
        let invalid = || Error::InvalidDescriptor(desc.to_string());
        if !desc.starts_with('(') {
            return Err(invalid());
        }

        let mut pos = 1;
        let mut params = Vec::new();
        loop {
            match desc.as_bytes().get(pos) {
                Some(b')') => {
                    pos += 1;
                    break;
                }
                Some(_) => {
                    let param = parse_prefix(desc, &mut pos)?;
                    if param == JType::Void {
                        return Err(invalid());
                    }
                    params.push(param);
                }
                None => return Err(invalid()),
            }
        }

        let ret = parse_prefix(desc, &mut pos)?;
        if pos != desc.len() {
            return Err(invalid());
        }

        Ok(MethodDescriptor { params, ret })
    }

    /// Total slots taken by the declared parameters.
    #[must_use]
    pub fn param_slots(&self) -> usize {
        self.params.iter().map(JType::slots).sum()
    }

    /// Encodes the descriptor back into string form.
    #[must_use]
    pub fn descriptor(&self) -> String {
        let params: String = self.params.iter().map(JType::descriptor).collect();
        format!("({params}){}", self.ret.descriptor())
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_field_descriptors() {
        assert_eq!(JType::parse("I").unwrap(), JType::Int);
        assert_eq!(
            JType::parse("[[Ljava/lang/String;").unwrap(),
            JType::Array(Box::new(JType::Array(Box::new(JType::object(STRING_CLASS)))))
        );
        assert!(JType::parse("V").is_err());
        assert!(JType::parse("L;").is_err());
        assert!(JType::parse("Ljava/lang/Object").is_err());
        assert!(JType::parse("II").is_err());
    }

    #[test]
    fn method_descriptor_slots() {
        let desc = MethodDescriptor::parse("(JDI)V").unwrap();
        assert_eq!(desc.param_slots(), 5);
        assert_eq!(desc.ret, JType::Void);
        assert_eq!(desc.descriptor(), "(JDI)V");
    }

    #[test]
    fn method_descriptor_rejects_garbage() {
        assert!(MethodDescriptor::parse("I)V").is_err());
        assert!(MethodDescriptor::parse("(I").is_err());
        assert!(MethodDescriptor::parse("(V)V").is_err());
        assert!(MethodDescriptor::parse("()VV").is_err());
    }

    #[test]
    fn class_operands() {
        assert_eq!(
            JType::from_class_operand("demo/A").unwrap(),
            JType::object("demo/A")
        );
        assert_eq!(
            JType::from_class_operand("[I").unwrap(),
            JType::Array(Box::new(JType::Int))
        );
    }

    #[test]
    fn display_is_source_like() {
        let ty = JType::Array(Box::new(JType::object("demo/Point")));
        assert_eq!(ty.to_string(), "demo.Point[]");
        assert_eq!(JType::Short.stack_type(), JType::Int);
    }
}
