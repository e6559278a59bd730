use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! bad_stream {
    ($offset:expr, $fmt:expr $(, $arg:expr)* $(,)?) => {
        crate::Error::BadInstructionStream {
            offset: $offset,
            message: format!($fmt $(, $arg)*),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every failure in the reification pipeline is fatal for the current session: errors unwind
/// through the tracer (which wraps them into [`Error::Trace`] with the method being traced) and
/// are handed to the embedding driver. There is no local recovery or retry.
///
/// # Error Categories
///
/// ## Malformed input
/// - [`Error::BadInstructionStream`] - Abstract stack became inconsistent at a byte offset
/// - [`Error::UnsupportedInstruction`] - Instruction outside the supported subset (`jsr`/`ret`)
/// - [`Error::Malformed`] - Structurally invalid bytecode or constant pool
/// - [`Error::OutOfBounds`] - Read beyond the end of the instruction stream
/// - [`Error::InvalidDescriptor`] - Field or method descriptor could not be parsed
///
/// ## Configuration
/// - [`Error::ClassNotFound`], [`Error::MethodNotFound`], [`Error::FieldNotFound`]
/// - [`Error::MissingMetaclass`], [`Error::AmbiguousMetaclass`], [`Error::MetaclassInstantiation`]
///
/// ## Policy violations
/// - [`Error::AnnotationMisuse`] - An annotation was attached to a method that can't carry it
///
/// ## Bounds
/// - [`Error::RecursionLimit`] - Call graph exploration nested deeper than configured
///
/// # Examples
///
/// ```rust
/// use jreify::Error;
///
/// let err = Error::ClassNotFound("demo/Missing".to_string());
/// match err {
///     Error::BadInstructionStream { offset, .. } => eprintln!("bad stream at {offset}"),
///     Error::ClassNotFound(name) => eprintln!("class {name} is unknown"),
///     other => eprintln!("{other}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The abstract operand stack was accessed out of bounds while interpreting an instruction.
    ///
    /// Raised on stack underflow, on pushes beyond the declared maximum stack depth and when a
    /// 64-bit value is split across slots in an impossible way. `offset` is the byte offset of
    /// the offending instruction.
    #[error("Bad instruction stream at offset {offset}: {message}")]
    BadInstructionStream {
        /// Byte offset of the instruction that failed
        offset: usize,
        /// Description of the inconsistency
        message: String,
    },

    /// The instruction is valid bytecode but not supported by the reifier.
    ///
    /// Legacy subroutines (`jsr`, `jsr_w`, `ret`) are deliberately unsupported.
    #[error("Unsupported instruction '{mnemonic}' (0x{opcode:02X}) at offset {offset}")]
    UnsupportedInstruction {
        /// Byte offset of the instruction
        offset: usize,
        /// Raw opcode byte
        opcode: u8,
        /// Mnemonic of the opcode
        mnemonic: &'static str,
    },

    /// The bytecode or one of its side tables is damaged.
    ///
    /// The error includes the source location where the malformation was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while reading the instruction stream.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// A type or method descriptor string could not be parsed.
    #[error("Invalid descriptor '{0}'")]
    InvalidDescriptor(String),

    /// The class oracle does not know the requested class.
    #[error("Class not found - {0}")]
    ClassNotFound(String),

    /// No method with the given name and descriptor exists in the class hierarchy.
    #[error("Method not found - {class}.{name}{descriptor}")]
    MethodNotFound {
        /// Class where the lookup started
        class: String,
        /// Method name
        name: String,
        /// Method descriptor
        descriptor: String,
    },

    /// No field with the given name exists in the class hierarchy.
    #[error("Field not found - {class}.{name}")]
    FieldNotFound {
        /// Class where the lookup started
        class: String,
        /// Field name
        name: String,
    },

    /// An intrinsic method refers to a metaclass that is not registered with the session.
    #[error("Missing metaclass '{metaclass}' required by {method}")]
    MissingMetaclass {
        /// Name of the metaclass
        metaclass: String,
        /// Fully qualified method requiring it
        method: String,
    },

    /// The supertypes of a class carry more than one distinct metaclass hint.
    #[error("Ambiguous metaclass for {class}: {candidates:?}")]
    AmbiguousMetaclass {
        /// Class whose metaclass was being resolved
        class: String,
        /// All candidates that were found
        candidates: Vec<String>,
    },

    /// A registered metaclass refused to handle a method.
    #[error("Metaclass '{metaclass}' failed: {message}")]
    MetaclassInstantiation {
        /// Name of the metaclass
        metaclass: String,
        /// Reason reported by the metaclass
        message: String,
    },

    /// An annotation is attached to a method that violates its usage rules.
    ///
    /// For example a `Foreign` method that is not static, or an `Intrinsic` method that is
    /// not public.
    #[error("Annotation misuse on {method}: {message}")]
    AnnotationMisuse {
        /// Fully qualified method
        method: String,
        /// Violated rule
        message: String,
    },

    /// Recursion limit reached.
    ///
    /// The associated value shows the recursion limit that was reached.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// An error raised while tracing a specific method.
    ///
    /// Errors are wrapped once per traced method they unwind through, so the chain of
    /// `source()` calls mirrors the call path from the entry method.
    #[error("While tracing {method}: {source}")]
    Trace {
        /// Fully qualified method being traced
        method: String,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wraps the error with the method it unwound through.
    #[must_use]
    pub fn in_method(self, method: impl Into<String>) -> Self {
        Error::Trace {
            method: method.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping all [`Error::Trace`] wrappers.
    #[must_use]
    pub fn root_cause(&self) -> &Error {
        let mut current = self;
        while let Error::Trace { source, .. } = current {
            current = source;
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_cause_skips_trace_wrappers() {
        let err = Error::OutOfBounds
            .in_method("demo/A.f()V")
            .in_method("demo/A.main()V");

        assert!(matches!(err.root_cause(), Error::OutOfBounds));
        assert!(err.to_string().starts_with("While tracing demo/A.main()V"));
    }

    #[test]
    fn malformed_macro_records_location() {
        let err = malformed_error!("bad constant {}", 7);
        match err {
            Error::Malformed { message, file, .. } => {
                assert_eq!(message, "bad constant 7");
                assert!(file.ends_with("error.rs"));
            }
            _ => panic!("unexpected variant"),
        }
    }
}
