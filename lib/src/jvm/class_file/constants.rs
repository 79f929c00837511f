use crate::jvm::class_file::{Attribute, AttributeLike, Serialize};
use crate::jvm::decls::{FieldRef, MethodRef};
use crate::jvm::types::{self, FieldType, MethodDescriptor, RefType, RenderDescriptor};
use crate::jvm::{BinaryName, Error, Name, UnqualifiedName};
use crate::util::{Offset, OffsetVec, Width};
use byteorder::WriteBytesExt;
use std::borrow::{Borrow, Cow};
use std::collections::{HashMap, HashSet};
use std::result::Result;

/// Class file constants pool builder
///
/// Every class being built owns one of these. Constants are deduplicated as they are inserted, so
/// asking twice for the same string, class, or member yields the same index. Once the class is
/// finished, the pool is consumed into the [`OffsetVec`] that gets written out.
#[derive(Debug, Clone)]
pub struct ConstantsPool {
    constants: OffsetVec<Constant>,

    classes: HashMap<RefType<BinaryName>, ClassConstantIndex>,
    fieldrefs: HashMap<MemberKey<FieldType<BinaryName>>, FieldRefConstantIndex>,
    methodrefs: HashMap<(MemberKey<MethodDescriptor<BinaryName>>, bool), MethodRefConstantIndex>,
    strings: HashMap<Utf8ConstantIndex, StringConstantIndex>,
    integers: HashMap<i32, ConstantIndex>,
    floats: HashMap<u32, ConstantIndex>,
    longs: HashMap<i64, ConstantIndex>,
    doubles: HashMap<u64, ConstantIndex>,
    name_and_types: HashMap<(Utf8ConstantIndex, Utf8ConstantIndex), NameAndTypeConstantIndex>,
    utf8s: HashMap<String, Utf8ConstantIndex>,
}

/// Owner, name, and erased type of a field or method
type MemberKey<D> = (BinaryName, UnqualifiedName, D);

impl ConstantsPool {
    /// Make a fresh empty constants pool
    pub fn new() -> ConstantsPool {
        ConstantsPool {
            constants: OffsetVec::new_starting_at(Offset(1)),
            classes: HashMap::new(),
            fieldrefs: HashMap::new(),
            methodrefs: HashMap::new(),
            strings: HashMap::new(),
            integers: HashMap::new(),
            floats: HashMap::new(),
            longs: HashMap::new(),
            doubles: HashMap::new(),
            name_and_types: HashMap::new(),
            utf8s: HashMap::new(),
        }
    }

    /// Number of slots used so far (including the unusable slot 0)
    pub fn slots_used(&self) -> usize {
        self.constants.offset_len().0
    }

    /// Every class mentioned by a `CONSTANT_Class_info`, including array element classes
    pub fn referenced_classes(&self) -> impl Iterator<Item = &BinaryName> + '_ {
        self.classes.keys().filter_map(|class| match class {
            RefType::Object(name) => Some(name),
            RefType::ObjectArray(arr) => Some(&arr.element_type),
            RefType::PrimitiveArray(_) => None,
        })
    }

    /// Look up a constant by its index
    pub fn get(&self, index: ConstantIndex) -> Option<&Constant> {
        self.constants.get_offset(Offset(index.0 as usize)).ok()
    }

    /// Push a constant into the constant pool, provided there is space for it
    ///
    /// Note: the largest valid index is 65535, indexing starts at 1, and some constants take two
    /// spaces.
    fn push_constant(&mut self, constant: Constant) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let offset = self.constants.offset_len().0;
        if offset + constant.width() > u16::MAX as usize {
            return Err(ConstantPoolOverflow {
                constant,
                offset: offset.min(u16::MAX as usize) as u16,
            });
        }

        self.constants.push(constant);
        Ok(ConstantIndex(offset as u16))
    }

    /// Consume the pool and return the final vector of constants
    pub fn into_offset_vec(self) -> OffsetVec<Constant> {
        self.constants
    }

    /// Get or insert a utf8 constant from the constant pool
    pub fn get_utf8<'a, S: Into<Cow<'a, str>>>(
        &mut self,
        utf8: S,
    ) -> Result<Utf8ConstantIndex, ConstantPoolOverflow> {
        let cow = utf8.into();

        if let Some(idx) = self.utf8s.get::<str>(cow.borrow()) {
            return Ok(*idx);
        }
        let owned = cow.into_owned();
        let idx = Utf8ConstantIndex(self.push_constant(Constant::Utf8(owned.clone()))?);
        self.utf8s.insert(owned, idx);
        Ok(idx)
    }

    /// Get or insert a string constant from the constant pool
    pub fn get_string(&mut self, string: &str) -> Result<StringConstantIndex, ConstantPoolOverflow> {
        let utf8 = self.get_utf8(string)?;
        if let Some(idx) = self.strings.get(&utf8) {
            return Ok(*idx);
        }
        let idx = StringConstantIndex(self.push_constant(Constant::String(utf8))?);
        self.strings.insert(utf8, idx);
        Ok(idx)
    }

    /// Get or insert a name & type constant from the constant pool
    pub fn get_name_and_type(
        &mut self,
        name: &str,
        descriptor: &str,
    ) -> Result<NameAndTypeConstantIndex, ConstantPoolOverflow> {
        let name = self.get_utf8(name)?;
        let descriptor = self.get_utf8(descriptor)?;
        if let Some(idx) = self.name_and_types.get(&(name, descriptor)) {
            return Ok(*idx);
        }
        let constant = Constant::NameAndType { name, descriptor };
        let idx = NameAndTypeConstantIndex(self.push_constant(constant)?);
        self.name_and_types.insert((name, descriptor), idx);
        Ok(idx)
    }

    /// Get or insert a `CONSTANT_Methodref_info` or `CONSTANT_InterfaceMethodref_info`
    pub fn get_method_ref(
        &mut self,
        class: &BinaryName,
        name: &UnqualifiedName,
        descriptor: &MethodDescriptor<BinaryName>,
        is_interface: bool,
    ) -> Result<MethodRefConstantIndex, ConstantPoolOverflow> {
        let key = ((class.clone(), name.clone(), descriptor.clone()), is_interface);
        if let Some(idx) = self.methodrefs.get(&key) {
            return Ok(*idx);
        }
        let class = class.constant_index(self)?;
        let name_and_type = self.get_name_and_type(name.as_str(), &descriptor.render())?;
        let constant = Constant::MethodRef {
            class,
            name_and_type,
            is_interface,
        };
        let idx = MethodRefConstantIndex(self.push_constant(constant)?);
        self.methodrefs.insert(key, idx);
        Ok(idx)
    }

    /// Get or insert a `CONSTANT_Fieldref_info`
    pub fn get_field_ref(
        &mut self,
        class: &BinaryName,
        name: &UnqualifiedName,
        descriptor: &FieldType<BinaryName>,
    ) -> Result<FieldRefConstantIndex, ConstantPoolOverflow> {
        let key = (class.clone(), name.clone(), descriptor.clone());
        if let Some(idx) = self.fieldrefs.get(&key) {
            return Ok(*idx);
        }
        let class = class.constant_index(self)?;
        let name_and_type = self.get_name_and_type(name.as_str(), &descriptor.render())?;
        let idx = FieldRefConstantIndex(self.push_constant(Constant::FieldRef(class, name_and_type))?);
        self.fieldrefs.insert(key, idx);
        Ok(idx)
    }

    /// Drop every constant which can't be reached from `roots`, renumbering the rest
    ///
    /// Surviving constants keep their relative order, so indices only ever go down. Returns the
    /// new index of every survivor, or `None` if nothing was dropped (and nothing moved).
    pub fn retain_reachable(
        &mut self,
        roots: impl IntoIterator<Item = ConstantIndex>,
    ) -> Option<HashMap<ConstantIndex, ConstantIndex>> {
        let mut reachable: HashSet<ConstantIndex> = HashSet::new();
        let mut pending: Vec<ConstantIndex> = roots.into_iter().collect();
        while let Some(index) = pending.pop() {
            if reachable.insert(index) {
                if let Some(constant) = self.get(index) {
                    pending.extend(constant.dependencies());
                }
            }
        }
        if reachable.len() == self.constants.len() {
            return None;
        }

        let mut renumbered: HashMap<ConstantIndex, ConstantIndex> = HashMap::new();
        let mut constants = OffsetVec::new_starting_at(Offset(1));
        for (offset, _, constant) in &self.constants {
            let old_index = ConstantIndex(offset.0 as u16);
            if reachable.contains(&old_index) {
                // Dependencies always come before the constants using them
                let constant = constant.renumber(&renumbered);
                let new_index = ConstantIndex(constants.push(constant).0 as u16);
                renumbered.insert(old_index, new_index);
            }
        }
        let dropped = self.constants.len() - constants.len();
        self.constants = constants;

        fn renumber_values<K: Eq + std::hash::Hash, I: Copy>(
            map: &mut HashMap<K, I>,
            renumbered: &HashMap<ConstantIndex, ConstantIndex>,
            wrap: impl Fn(ConstantIndex) -> I,
            unwrap: impl Fn(I) -> ConstantIndex,
        ) {
            let old = std::mem::take(map);
            map.extend(old.into_iter().filter_map(|(key, index)| {
                renumbered
                    .get(&unwrap(index))
                    .map(|new_index| (key, wrap(*new_index)))
            }));
        }
        renumber_values(&mut self.classes, &renumbered, ClassConstantIndex, |i| i.0);
        renumber_values(&mut self.fieldrefs, &renumbered, FieldRefConstantIndex, |i| i.0);
        renumber_values(&mut self.methodrefs, &renumbered, MethodRefConstantIndex, |i| i.0);
        renumber_values(&mut self.integers, &renumbered, |i| i, |i| i);
        renumber_values(&mut self.floats, &renumbered, |i| i, |i| i);
        renumber_values(&mut self.longs, &renumbered, |i| i, |i| i);
        renumber_values(&mut self.doubles, &renumbered, |i| i, |i| i);
        renumber_values(&mut self.utf8s, &renumbered, Utf8ConstantIndex, |i| i.0);

        // These are also keyed by indices
        let utf8 = |index: Utf8ConstantIndex| renumbered.get(&index.0).map(|i| Utf8ConstantIndex(*i));
        self.strings = std::mem::take(&mut self.strings)
            .into_iter()
            .filter_map(|(key, index)| {
                let new_index = renumbered.get(&index.0)?;
                Some((utf8(key)?, StringConstantIndex(*new_index)))
            })
            .collect();
        self.name_and_types = std::mem::take(&mut self.name_and_types)
            .into_iter()
            .filter_map(|((name, descriptor), index)| {
                let new_index = renumbered.get(&index.0)?;
                let key = (utf8(name)?, utf8(descriptor)?);
                Some((key, NameAndTypeConstantIndex(*new_index)))
            })
            .collect();

        log::debug!("Dropped {} unreachable constants", dropped);
        Some(renumbered)
    }

    /// Add an attribute to the constant pool
    pub fn get_attribute<A: AttributeLike>(&mut self, attribute: A) -> Result<Attribute, Error> {
        let name_index = self.get_utf8(A::NAME)?;
        let info = attribute.to_bytes()?;
        Ok(Attribute { name_index, info })
    }

    fn get_numeric<K: std::hash::Hash + Eq>(
        &mut self,
        key: K,
        constant: Constant,
        select: impl Fn(&mut ConstantsPool) -> &mut HashMap<K, ConstantIndex>,
    ) -> Result<ConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = select(self).get(&key) {
            return Ok(*idx);
        }
        let idx = self.push_constant(constant)?;
        select(self).insert(key, idx);
        Ok(idx)
    }
}

impl Default for ConstantsPool {
    fn default() -> ConstantsPool {
        ConstantsPool::new()
    }
}

#[derive(Debug)]
pub struct ConstantPoolOverflow {
    pub constant: Constant,
    pub offset: u16,
}

/// Constants as in the constant pool
///
/// Only the constants which the code builder can emit are modelled (no method handles, method
/// types, or dynamic call sites).
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.4
#[derive(Debug, Clone)]
pub enum Constant {
    /// Class or an interface
    Class(Utf8ConstantIndex),

    /// Field
    FieldRef(ClassConstantIndex, NameAndTypeConstantIndex),

    /// Method (this combines `Methodref` and `InterfaceMethodref`)
    MethodRef {
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
        is_interface: bool,
    },

    /// Constant object of type `java.lang.String`
    String(Utf8ConstantIndex),

    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),

    /// Name and a type (eg. for a field or a method)
    NameAndType {
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    },

    /// Constant UTF-8 encoded raw string value
    ///
    /// Despite the name, the encoding is not quite UTF-8 (the encoding of the
    /// null character `\u{0000}` and the encoding of supplementary characters
    /// is different).
    Utf8(String),
}

impl Constant {
    /// Tag byte which precedes the constant in the class file
    pub fn tag(&self) -> u8 {
        match self {
            Constant::Utf8(_) => 1,
            Constant::Integer(_) => 3,
            Constant::Float(_) => 4,
            Constant::Long(_) => 5,
            Constant::Double(_) => 6,
            Constant::Class(_) => 7,
            Constant::String(_) => 8,
            Constant::FieldRef(_, _) => 9,
            Constant::MethodRef {
                is_interface: false,
                ..
            } => 10,
            Constant::MethodRef {
                is_interface: true, ..
            } => 11,
            Constant::NameAndType { .. } => 12,
        }
    }
}

impl Constant {
    /// Other constants this one points to
    fn dependencies(&self) -> Vec<ConstantIndex> {
        match self {
            Constant::Class(name) | Constant::String(name) => vec![name.0],
            Constant::FieldRef(class, name_and_type)
            | Constant::MethodRef {
                class,
                name_and_type,
                ..
            } => vec![class.0, name_and_type.0],
            Constant::NameAndType { name, descriptor } => vec![name.0, descriptor.0],
            Constant::Integer(_)
            | Constant::Float(_)
            | Constant::Long(_)
            | Constant::Double(_)
            | Constant::Utf8(_) => vec![],
        }
    }

    /// Copy of the constant pointing at renumbered dependencies
    fn renumber(&self, renumbered: &HashMap<ConstantIndex, ConstantIndex>) -> Constant {
        let get = |index: ConstantIndex| renumbered.get(&index).copied().unwrap_or(index);
        match self {
            Constant::Class(name) => Constant::Class(Utf8ConstantIndex(get(name.0))),
            Constant::String(utf8) => Constant::String(Utf8ConstantIndex(get(utf8.0))),
            Constant::FieldRef(class, name_and_type) => Constant::FieldRef(
                ClassConstantIndex(get(class.0)),
                NameAndTypeConstantIndex(get(name_and_type.0)),
            ),
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => Constant::MethodRef {
                class: ClassConstantIndex(get(class.0)),
                name_and_type: NameAndTypeConstantIndex(get(name_and_type.0)),
                is_interface: *is_interface,
            },
            Constant::NameAndType { name, descriptor } => Constant::NameAndType {
                name: Utf8ConstantIndex(get(name.0)),
                descriptor: Utf8ConstantIndex(get(descriptor.0)),
            },
            other => other.clone(),
        }
    }
}

impl Serialize for Constant {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.tag().serialize(writer)?;
        match self {
            Constant::Utf8(string) => {
                let buffer: Vec<u8> = encode_modified_utf8(string);
                (buffer.len() as u16).serialize(writer)?;
                writer.write_all(&buffer)?;
            }
            Constant::Integer(integer) => integer.serialize(writer)?,
            Constant::Float(float) => float.serialize(writer)?,
            Constant::Long(long) => long.serialize(writer)?,
            Constant::Double(double) => double.serialize(writer)?,
            Constant::Class(name) => name.serialize(writer)?,
            Constant::String(utf8) => utf8.serialize(writer)?,
            Constant::FieldRef(class, name_and_type)
            | Constant::MethodRef {
                class,
                name_and_type,
                ..
            } => {
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::NameAndType { name, descriptor } => {
                name.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
        };
        Ok(())
    }
}

/// Modified UTF-8 format used in class files.
///
/// See [this `DataInput` section for details][0]. Quoting from that section:
///
/// > The differences between this format and the standard UTF-8 format are the following:
/// >
/// >  * The null byte `\u0000` is encoded in 2-byte format rather than 1-byte, so that the encoded
/// >    strings never have embedded nulls.
/// >  * Only the 1-byte, 2-byte, and 3-byte formats are used.
/// >  * Supplementary characters are represented in the form of surrogate pairs.
///
/// [0]: https://docs.oracle.com/en/java/javase/17/docs/api/java.base/java/io/DataInput.html#modified-utf-8
pub fn encode_modified_utf8(string: &str) -> Vec<u8> {
    let mut buffer: Vec<u8> = vec![];
    for c in string.chars() {
        let len: usize = if c == '\u{0000}' { 2 } else { c.len_utf8() };
        let code: u32 = c as u32;

        match len {
            1 => buffer.push(code as u8),
            2 => {
                buffer.push((code >> 6 & 0x1F) as u8 | 0b1100_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }
            3 => {
                buffer.push((code >> 12 & 0x0F) as u8 | 0b1110_0000);
                buffer.push((code >> 6 & 0x3F) as u8 | 0b1000_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }

            // Supplementary characters become a surrogate pair, each encoded in 3 bytes
            _ => {
                buffer.push(0b1110_1101);
                buffer.push(((code >> 16 & 0x0F) as u8).wrapping_sub(1) & 0x0F | 0b1010_0000);
                buffer.push((code >> 10 & 0x3F) as u8 | 0b1000_0000);

                buffer.push(0b1110_1101);
                buffer.push(((code >> 6 & 0x1F) as u8) | 0b1011_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }
        }
    }
    buffer
}

/// `long` and `double` constants take up two slots (the second one is unusable)
impl Width for Constant {
    fn width(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct ConstantIndex(pub u16);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct Utf8ConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct StringConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct NameAndTypeConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct ClassConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct FieldRefConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct MethodRefConstantIndex(pub ConstantIndex);

macro_rules! constant_index {
    ($($index:ident),*) => {
        $(
            impl From<$index> for ConstantIndex {
                fn from(index: $index) -> ConstantIndex {
                    index.0
                }
            }

            impl Serialize for $index {
                fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
                    self.0.serialize(writer)
                }
            }
        )*
    };
}

constant_index!(
    Utf8ConstantIndex,
    StringConstantIndex,
    NameAndTypeConstantIndex,
    ClassConstantIndex,
    FieldRefConstantIndex,
    MethodRefConstantIndex
);

impl Serialize for ConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

pub trait ConstantsWriter<Index = ConstantIndex> {
    /// Get or insert a constant into the constant pool and return the associated index
    fn constant_index(
        &self,
        constants_pool: &mut ConstantsPool,
    ) -> Result<Index, ConstantPoolOverflow>;
}

/// When making a `CONSTANT_Class_info`, reference types are almost always objects. However,
/// there are a handful of places where an array type needs to be fit in (eg. for a `checkcast`
/// to an array type). See [this section of the JVM spec][0] for more.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.4.1
impl ConstantsWriter<ClassConstantIndex> for RefType<BinaryName> {
    fn constant_index(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<ClassConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = constants.classes.get(self) {
            return Ok(*idx);
        }
        let name = match self {
            RefType::Object(class) => constants.get_utf8(class.as_str())?,
            other => constants.get_utf8(other.render())?,
        };
        let idx = ClassConstantIndex(constants.push_constant(Constant::Class(name))?);
        constants.classes.insert(self.clone(), idx);
        Ok(idx)
    }
}

impl ConstantsWriter<ClassConstantIndex> for BinaryName {
    fn constant_index(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<ClassConstantIndex, ConstantPoolOverflow> {
        RefType::Object(self.clone()).constant_index(constants)
    }
}

/// Uses the interface flag carried by the owner reference
impl ConstantsWriter<MethodRefConstantIndex> for MethodRef {
    fn constant_index(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<MethodRefConstantIndex, ConstantPoolOverflow> {
        constants.get_method_ref(
            &self.owner.name,
            &self.name,
            &self.descriptor,
            self.owner.is_interface,
        )
    }
}

impl ConstantsWriter<FieldRefConstantIndex> for FieldRef {
    fn constant_index(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<FieldRefConstantIndex, ConstantPoolOverflow> {
        constants.get_field_ref(&self.owner.name, &self.name, &self.descriptor)
    }
}

/// Write a constant which can be loaded up using `ldc`, `ldc_w`, or `ldc2_w`
impl ConstantsWriter<ConstantIndex> for types::ConstantValue {
    fn constant_index(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<ConstantIndex, ConstantPoolOverflow> {
        match self {
            types::ConstantValue::String(string) => Ok(constants.get_string(string)?.into()),
            types::ConstantValue::Class(class) => Ok(class.constant_index(constants)?.into()),
            types::ConstantValue::Int(integer) => {
                constants.get_numeric(*integer, Constant::Integer(*integer), |c| &mut c.integers)
            }
            types::ConstantValue::Long(long) => {
                constants.get_numeric(*long, Constant::Long(*long), |c| &mut c.longs)
            }
            types::ConstantValue::Float(float) => {
                constants.get_numeric(float.to_bits(), Constant::Float(*float), |c| &mut c.floats)
            }
            types::ConstantValue::Double(double) => constants.get_numeric(
                double.to_bits(),
                Constant::Double(*double),
                |c| &mut c.doubles,
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::types::ConstantValue;

    #[test]
    fn deduplicates_constants() {
        let mut pool = ConstantsPool::new();
        let first = pool.get_string("Hello, World!").unwrap();
        let second = pool.get_string("Hello, World!").unwrap();
        assert_eq!(first, second);

        // utf8 at 1, string at 2
        assert_eq!(first.0, ConstantIndex(2));
        assert_eq!(pool.slots_used(), 3);

        let class = BinaryName::STRING.constant_index(&mut pool).unwrap();
        let class_again = RefType::Object(BinaryName::STRING)
            .constant_index(&mut pool)
            .unwrap();
        assert_eq!(class, class_again);
        assert_eq!(
            pool.referenced_classes().collect::<Vec<_>>(),
            vec![&BinaryName::STRING]
        );
    }

    #[test]
    fn wide_constants() {
        let mut pool = ConstantsPool::new();
        let long = ConstantValue::Long(1).constant_index(&mut pool).unwrap();
        let int = ConstantValue::Int(1).constant_index(&mut pool).unwrap();
        assert_eq!(long, ConstantIndex(1));
        assert_eq!(int, ConstantIndex(3));
        assert!(matches!(pool.get(int), Some(Constant::Integer(1))));

        // Negative zero is a different constant
        let zero = ConstantValue::Double(0.0).constant_index(&mut pool).unwrap();
        let neg_zero = ConstantValue::Double(-0.0).constant_index(&mut pool).unwrap();
        assert_ne!(zero, neg_zero);
    }

    #[test]
    fn member_refs() {
        let mut pool = ConstantsPool::new();
        let println = MethodDescriptor {
            parameters: vec![FieldType::object(BinaryName::STRING)],
            return_type: None,
        };
        let idx = pool
            .get_method_ref(
                &BinaryName::PRINTSTREAM,
                &UnqualifiedName::PRINTLN,
                &println,
                false,
            )
            .unwrap();
        assert_eq!(pool.get(idx.0).map(Constant::tag), Some(10));

        let iface = pool
            .get_method_ref(
                &BinaryName::CHARSEQUENCE,
                &UnqualifiedName::LENGTH,
                &MethodDescriptor {
                    parameters: vec![],
                    return_type: Some(FieldType::int()),
                },
                true,
            )
            .unwrap();
        assert_eq!(pool.get(iface.0).map(Constant::tag), Some(11));

        let out = pool
            .get_field_ref(
                &BinaryName::SYSTEM,
                &UnqualifiedName::OUT,
                &FieldType::object(BinaryName::PRINTSTREAM),
            )
            .unwrap();
        assert_eq!(pool.get(out.0).map(Constant::tag), Some(9));
    }

    #[test]
    fn unreachable_constants_are_dropped() {
        let mut pool = ConstantsPool::new();
        let dropped = pool.get_string("dropped").unwrap();
        let kept = pool.get_string("kept").unwrap();
        let gone = BinaryName::from_string(String::from("examples/Gone")).unwrap();
        gone.constant_index(&mut pool).unwrap();
        let out = pool
            .get_field_ref(
                &BinaryName::SYSTEM,
                &UnqualifiedName::OUT,
                &FieldType::object(BinaryName::PRINTSTREAM),
            )
            .unwrap();

        let renumbered = pool.retain_reachable(vec![kept.0, out.0]).unwrap();
        assert!(!renumbered.contains_key(&dropped.0));
        assert_eq!(renumbered[&kept.0], ConstantIndex(2));
        assert_eq!(
            pool.referenced_classes().collect::<Vec<_>>(),
            vec![&BinaryName::SYSTEM]
        );

        // Survivors are found again at their new indices
        assert_eq!(pool.get_string("kept").unwrap().0, ConstantIndex(2));
        let new_out = renumbered[&out.0];
        match pool.get(new_out) {
            Some(Constant::FieldRef(class, _)) => {
                assert!(matches!(pool.get(class.0), Some(Constant::Class(_))))
            }
            other => panic!("expected a field reference, found {:?}", other),
        }
        let utf8s: Vec<&str> = pool
            .constants
            .values()
            .filter_map(|constant| match constant {
                Constant::Utf8(utf8) => Some(utf8.as_str()),
                _ => None,
            })
            .collect();
        assert!(!utf8s.contains(&"dropped"));
        assert!(!utf8s.contains(&"examples/Gone"));

        // Nothing left to drop
        assert!(pool.retain_reachable(vec![ConstantIndex(2), new_out]).is_none());
    }

    #[test]
    fn utf8_serialization() {
        let bytes = Constant::Utf8(String::from("a\x00")).to_bytes().unwrap();
        assert_eq!(bytes, vec![1, 0, 3, 97, 192, 128]);
    }
}

#[cfg(test)]
mod encode_modified_utf8_tests {
    use super::*;

    #[test]
    fn containing_null_byte() {
        assert_eq!(encode_modified_utf8("a\x00a"), vec![97, 192, 128, 97]);
    }

    #[test]
    fn simple_ascii() {
        assert_eq!(encode_modified_utf8("foo"), vec![102, 111, 111]);
    }

    #[test]
    fn two_and_three_byte_encodings() {
        assert_eq!(encode_modified_utf8("Ą"), vec![196, 132]);
        assert_eq!(encode_modified_utf8("ऄ"), vec![224, 164, 132]);
    }

    #[test]
    fn supplementary_characters() {
        assert_eq!(
            encode_modified_utf8("\u{10000}\u{10FFFF}"),
            vec![237, 160, 128, 237, 176, 128, 237, 175, 191, 237, 191, 191]
        );
    }
}
