//! The class oracle: read-only access to the host's class metadata.
//!
//! The reifier never loads class files itself. Everything it needs to know about classes,
//! their members, the inheritance graph and the objects living in the host's static heap is
//! obtained through the [`ClassOracle`] trait. The trait's provided methods implement member
//! resolution and subtype queries on top of the two required lookups, so an oracle only has to
//! hand out descriptors.
//!
//! Two implementations ship with the crate:
//! - [`ClassPath`] - an in-memory class table preloaded with the minimal runtime classes
//! - [`Overlay`] - layers classes synthesized during a session over another oracle
//!
//! # Examples
//!
//! ```rust
//! use jreify::model::{ClassBuilder, ClassOracle, ClassPath, JType};
//!
//! let mut classes = ClassPath::new();
//! classes.add(ClassBuilder::new("demo/Shape").build()?);
//! classes.add(ClassBuilder::new("demo/Circle").extends("demo/Shape").build()?);
//!
//! assert!(classes.is_subtype("demo/Circle", "demo/Shape"));
//! assert!(classes.is_assignable(&JType::Null, &JType::object("demo/Circle")));
//! # Ok::<(), jreify::Error>(())
//! ```

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    model::{
        builder::{ClassBuilder, MethodBuilder},
        AccessFlags, ClassInfo, ClassRc, FieldInfo, HeapObject, HeapRef, JType, MethodInfo,
        OBJECT_CLASS,
    },
    Error, Result,
};

/// Boxed numeric and character wrapper classes.
pub const WRAPPER_CLASSES: [&str; 8] = [
    "java/lang/Integer",
    "java/lang/Long",
    "java/lang/Float",
    "java/lang/Double",
    "java/lang/Short",
    "java/lang/Byte",
    "java/lang/Character",
    "java/lang/Boolean",
];

/// Returns `true` if `class` is one of the boxed primitive wrappers.
#[must_use]
pub fn is_wrapper_class(class: &str) -> bool {
    WRAPPER_CLASSES.contains(&class)
}

/// A method found by walking the class hierarchy.
#[derive(Debug, Clone)]
pub struct ResolvedMethod {
    /// Class declaring the method
    pub class: ClassRc,
    index: usize,
}

impl ResolvedMethod {
    /// The resolved method descriptor.
    #[must_use]
    pub fn method(&self) -> &MethodInfo {
        &self.class.methods[self.index]
    }
}

/// A field found by walking the class hierarchy.
#[derive(Debug, Clone)]
pub struct ResolvedField {
    /// Class declaring the field
    pub class: ClassRc,
    index: usize,
}

impl ResolvedField {
    /// The resolved field descriptor.
    #[must_use]
    pub fn field(&self) -> &FieldInfo {
        &self.class.fields[self.index]
    }
}

/// Read-only access to class metadata and the host's static heap.
///
/// Implementations must be consistent and side-effect free for the duration of a session.
pub trait ClassOracle {
    /// Looks up a class by internal name.
    fn class(&self, name: &str) -> Option<ClassRc>;

    /// Looks up an object of the host's static heap.
    fn heap_object(&self, object: HeapRef) -> Option<&HeapObject>;

    /// Looks up a class, failing if it is unknown.
    ///
    /// # Errors
    /// Returns [`crate::Error::ClassNotFound`] if the oracle doesn't know `name`.
    fn require(&self, name: &str) -> Result<ClassRc> {
        self.class(name)
            .ok_or_else(|| Error::ClassNotFound(name.to_string()))
    }

    /// Direct supertypes of a class: superclass first, then interfaces.
    fn supertypes(&self, name: &str) -> Vec<String> {
        match self.class(name) {
            Some(class) => class
                .super_class
                .iter()
                .chain(class.interfaces.iter())
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// All transitive supertypes of a class in breadth-first order, the class itself excluded.
    fn ancestors(&self, name: &str) -> Vec<String> {
        let mut seen = FxHashSet::default();
        let mut order = Vec::new();
        let mut queue: VecDeque<String> = self.supertypes(name).into();
        while let Some(next) = queue.pop_front() {
            if seen.insert(next.clone()) {
                queue.extend(self.supertypes(&next));
                order.push(next);
            }
        }
        order
    }

    /// Returns `true` if `sub` equals `sup` or transitively extends or implements it.
    fn is_subtype(&self, sub: &str, sup: &str) -> bool {
        sub == sup || sup == OBJECT_CLASS || self.ancestors(sub).iter().any(|a| a == sup)
    }

    /// Returns `true` if a value of type `from` can be stored in a location of type `to`.
    fn is_assignable(&self, from: &JType, to: &JType) -> bool {
        match (from, to) {
            _ if from == to => true,
            (JType::Null, to) => to.is_reference(),
            (JType::Reference(sub), JType::Reference(sup)) => self.is_subtype(sub, sup),
            (JType::Array(_), JType::Reference(sup)) => sup == OBJECT_CLASS,
            (JType::Array(a), JType::Array(b)) => {
                a.is_reference() && b.is_reference() && self.is_assignable(a, b)
            }
            (from, to) if from.is_primitive() && to.is_primitive() => {
                from.stack_type() == to.stack_type()
            }
            _ => false,
        }
    }

    /// Resolves a method by walking superclasses first and then all superinterfaces.
    ///
    /// # Errors
    /// Returns [`crate::Error::ClassNotFound`] if `class` is unknown and
    /// [`crate::Error::MethodNotFound`] if no class in the hierarchy declares the method.
    fn resolve_method(&self, class: &str, name: &str, descriptor: &str) -> Result<ResolvedMethod> {
        let start = self.require(class)?;
        let mut current = Some(start.clone());
        while let Some(info) = current {
            if let Some(index) = info
                .methods
                .iter()
                .position(|m| m.name == name && m.descriptor == descriptor)
            {
                return Ok(ResolvedMethod { class: info, index });
            }
            current = info.super_class.as_deref().and_then(|s| self.class(s));
        }

        for ancestor in self.ancestors(class) {
            if let Some(info) = self.class(&ancestor) {
                if let Some(index) = info.methods.iter().position(|m| {
                    m.name == name && m.descriptor == descriptor && !m.is_abstract()
                }) {
                    return Ok(ResolvedMethod { class: info, index });
                }
            }
        }
        for ancestor in self.ancestors(class) {
            if let Some(info) = self.class(&ancestor) {
                if let Some(index) = info
                    .methods
                    .iter()
                    .position(|m| m.name == name && m.descriptor == descriptor)
                {
                    return Ok(ResolvedMethod { class: info, index });
                }
            }
        }

        Err(Error::MethodNotFound {
            class: class.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        })
    }

    /// Resolves a field in the class or any of its ancestors.
    ///
    /// # Errors
    /// Returns [`crate::Error::ClassNotFound`] if `class` is unknown and
    /// [`crate::Error::FieldNotFound`] if no class in the hierarchy declares the field.
    fn resolve_field(&self, class: &str, name: &str) -> Result<ResolvedField> {
        let start = self.require(class)?;
        let candidates = std::iter::once(start).chain(
            self.ancestors(class)
                .into_iter()
                .filter_map(|a| self.class(&a)),
        );
        for info in candidates {
            if let Some(index) = info.fields.iter().position(|f| f.name == name) {
                return Ok(ResolvedField { class: info, index });
            }
        }
        Err(Error::FieldNotFound {
            class: class.to_string(),
            name: name.to_string(),
        })
    }
}

/// In-memory class table.
///
/// A fresh class path already contains `java/lang/Object`, `java/lang/String`,
/// `java/lang/Class`, `java/lang/Number` and the boxed primitive wrappers, so test programs only
/// need to add their own classes.
pub struct ClassPath {
    classes: FxHashMap<String, ClassRc>,
    heap: Vec<HeapObject>,
}

impl ClassPath {
    /// Creates a class path holding only the minimal runtime classes.
    #[must_use]
    pub fn new() -> Self {
        let mut path = ClassPath {
            classes: FxHashMap::default(),
            heap: Vec::new(),
        };
        for class in runtime_classes().unwrap_or_default() {
            path.add(class);
        }
        path
    }

    /// Adds or replaces a class.
    pub fn add(&mut self, class: ClassInfo) {
        self.classes.insert(class.name.clone(), ClassRc::new(class));
    }

    /// Adds an object to the static heap and returns its handle.
    pub fn add_heap_object(&mut self, object: HeapObject) -> HeapRef {
        let handle = HeapRef(u32::try_from(self.heap.len()).unwrap_or(u32::MAX));
        self.heap.push(object);
        handle
    }

    /// Number of known classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns `true` if no class is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

fn runtime_classes() -> Result<Vec<ClassInfo>> {
    let mut classes = vec![
        ClassBuilder::new(OBJECT_CLASS)
            .root()
            .method(MethodBuilder::new("<init>", "()V").body(1, 1, vec![0xB1]))
            .build()?,
        ClassBuilder::new("java/lang/Number")
            .flags(AccessFlags::PUBLIC | AccessFlags::ABSTRACT)
            .build()?,
    ];
    for name in ["java/lang/String", "java/lang/Class"] {
        classes.push(
            ClassBuilder::new(name)
                .flags(AccessFlags::PUBLIC | AccessFlags::FINAL)
                .build()?,
        );
    }

    let primitives = ["I", "J", "F", "D", "S", "B", "C", "Z"];
    for (wrapper, primitive) in WRAPPER_CLASSES.iter().zip(primitives) {
        let super_class = match primitive {
            "C" | "Z" => OBJECT_CLASS,
            _ => "java/lang/Number",
        };
        classes.push(
            ClassBuilder::new(wrapper)
                .extends(super_class)
                .flags(AccessFlags::PUBLIC | AccessFlags::FINAL)
                .field(
                    "value",
                    JType::parse(primitive)?,
                    AccessFlags::PRIVATE | AccessFlags::FINAL,
                )
                .method(
                    MethodBuilder::new("valueOf", &format!("({primitive})L{wrapper};"))
                        .flags(AccessFlags::PUBLIC | AccessFlags::STATIC | AccessFlags::NATIVE),
                )
                .build()?,
        );
    }
    Ok(classes)
}

impl Default for ClassPath {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassOracle for ClassPath {
    fn class(&self, name: &str) -> Option<ClassRc> {
        self.classes.get(name).cloned()
    }

    fn heap_object(&self, object: HeapRef) -> Option<&HeapObject> {
        self.heap.get(object.0 as usize)
    }
}

/// Layers classes synthesized during a session over a host oracle.
///
/// Synthesized classes shadow host classes of the same name.
pub struct Overlay<'a> {
    base: &'a dyn ClassOracle,
    synthetic: FxHashMap<String, ClassRc>,
}

impl<'a> Overlay<'a> {
    /// Creates an empty overlay over `base`.
    #[must_use]
    pub fn new(base: &'a dyn ClassOracle) -> Self {
        Overlay {
            base,
            synthetic: FxHashMap::default(),
        }
    }

    /// Registers a synthesized class.
    pub fn insert(&mut self, class: ClassInfo) {
        self.synthetic
            .insert(class.name.clone(), ClassRc::new(class));
    }

    /// Returns `true` if `name` was synthesized in this session.
    #[must_use]
    pub fn is_synthetic(&self, name: &str) -> bool {
        self.synthetic.contains_key(name)
    }
}

impl ClassOracle for Overlay<'_> {
    fn class(&self, name: &str) -> Option<ClassRc> {
        self.synthetic
            .get(name)
            .cloned()
            .or_else(|| self.base.class(name))
    }

    fn heap_object(&self, object: HeapRef) -> Option<&HeapObject> {
        self.base.heap_object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hierarchy() -> ClassPath {
        let mut classes = ClassPath::new();
        classes.add(
            ClassBuilder::new("demo/Named")
                .flags(AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT)
                .method(
                    MethodBuilder::new("name", "()Ljava/lang/String;")
                        .flags(AccessFlags::PUBLIC | AccessFlags::ABSTRACT),
                )
                .build()
                .unwrap(),
        );
        classes.add(
            ClassBuilder::new("demo/Base")
                .implements("demo/Named")
                .field("count", JType::Int, AccessFlags::PROTECTED)
                .method(
                    MethodBuilder::new("size", "()I")
                        .flags(AccessFlags::PUBLIC)
                        .body(1, 1, vec![0x03, 0xAC]),
                )
                .build()
                .unwrap(),
        );
        classes.add(
            ClassBuilder::new("demo/Leaf")
                .extends("demo/Base")
                .build()
                .unwrap(),
        );
        classes
    }

    #[test]
    fn subtype_queries() {
        let classes = hierarchy();
        assert!(classes.is_subtype("demo/Leaf", "demo/Base"));
        assert!(classes.is_subtype("demo/Leaf", "demo/Named"));
        assert!(!classes.is_subtype("demo/Base", "demo/Leaf"));
        assert!(classes.is_subtype("java/lang/Integer", "java/lang/Number"));
    }

    #[test]
    fn assignability() {
        let classes = hierarchy();
        let leaf = JType::object("demo/Leaf");
        let base = JType::object("demo/Base");
        assert!(classes.is_assignable(&leaf, &base));
        assert!(!classes.is_assignable(&base, &leaf));
        assert!(classes.is_assignable(
            &JType::Array(Box::new(leaf.clone())),
            &JType::Array(Box::new(base))
        ));
        assert!(classes.is_assignable(&JType::Byte, &JType::Int));
        assert!(!classes.is_assignable(&JType::Long, &JType::Int));
    }

    #[test]
    fn member_resolution_walks_hierarchy() {
        let classes = hierarchy();
        let size = classes.resolve_method("demo/Leaf", "size", "()I").unwrap();
        assert_eq!(size.class.name, "demo/Base");

        let name = classes
            .resolve_method("demo/Leaf", "name", "()Ljava/lang/String;")
            .unwrap();
        assert_eq!(name.class.name, "demo/Named");

        let count = classes.resolve_field("demo/Leaf", "count").unwrap();
        assert_eq!(count.field().ty, JType::Int);

        assert!(matches!(
            classes.resolve_method("demo/Leaf", "missing", "()V"),
            Err(Error::MethodNotFound { .. })
        ));
        assert!(matches!(
            classes.resolve_field("demo/Nope", "x"),
            Err(Error::ClassNotFound(_))
        ));
    }

    #[test]
    fn overlay_shadows_base() {
        let classes = hierarchy();
        let mut overlay = Overlay::new(&classes);
        overlay.insert(ClassBuilder::new("demo/Leaf$$Lambda$0").build().unwrap());

        assert!(overlay.class("demo/Leaf$$Lambda$0").is_some());
        assert!(overlay.is_synthetic("demo/Leaf$$Lambda$0"));
        assert!(overlay.class("demo/Base").is_some());
        assert!(!overlay.is_synthetic("demo/Base"));
    }
}
