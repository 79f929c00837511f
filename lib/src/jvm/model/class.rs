use crate::jvm::class_file::{
    self, ClassConstantIndex, ClassFile, ConstantsPool, ConstantsWriter, InnerClass, InnerClasses,
    NestHost, NestMembers,
};
use crate::jvm::decls::ClassDecl;
use crate::jvm::model::{Field, Method};
use crate::jvm::{BinaryName, ClassModifiers, Error, Name, Settings};
use std::collections::HashSet;

/// Semantic representation of a class
///
/// This is what a closed class builder leaves behind: declarations, verified method bodies, and
/// the constant pool those bodies already index into.
#[derive(Clone, Debug)]
pub struct Class {
    pub decl: ClassDecl,
    pub modifiers: ClassModifiers,

    /// Fields, in declaration order
    pub fields: Vec<Field>,

    /// Methods, in declaration order
    pub methods: Vec<Method>,

    /// Constants referenced by the method bodies
    pub constants_pool: ConstantsPool,
}

/// Shape of a class of the module, as needed by the other classes' nest and inner class
/// attributes
#[derive(Clone, Debug)]
pub struct ClassSummary {
    pub decl: ClassDecl,
    pub modifiers: ClassModifiers,
}

impl Class {
    pub fn name(&self) -> &BinaryName {
        self.decl.binary_name()
    }

    pub fn summary(&self) -> ClassSummary {
        ClassSummary {
            decl: self.decl.clone(),
            modifiers: self.modifiers,
        }
    }

    /// Serialize the class into a class file
    ///
    /// This handles settings several attributes:
    ///
    ///   - [`class_file::Signature`] if the class is generic and generic signatures are enabled
    ///   - [`NestHost`] based on the outer class chain (if any)
    ///   - [`NestMembers`] based on all of the module classes nested inside this one
    ///   - [`InnerClasses`] based on all the module classes that show up in the constant pool and
    ///     which are nested, along with their enclosing classes
    ///
    /// `module_classes` must include this class.
    pub fn serialize(
        &self,
        settings: &Settings,
        module_classes: &[ClassSummary],
    ) -> Result<ClassFile, Error> {
        let mut constants_pool = self.constants_pool.clone();

        let this_class = self.decl.binary_name().constant_index(&mut constants_pool)?;
        let super_class = self.decl.superclass.name.constant_index(&mut constants_pool)?;
        let interfaces: Vec<ClassConstantIndex> = self
            .decl
            .interfaces
            .iter()
            .map(|interface| interface.name.constant_index(&mut constants_pool))
            .collect::<Result<_, _>>()?;
        let mut attributes = vec![];

        // Serialize fields and methods
        let fields: Vec<class_file::Field> = self
            .fields
            .iter()
            .map(|field| field.serialize_field(&mut constants_pool, settings))
            .collect::<Result<_, Error>>()?;
        let methods: Vec<class_file::Method> = self
            .methods
            .iter()
            .map(|method| method.serialize_method(&mut constants_pool, settings))
            .collect::<Result<_, Error>>()?;

        // `Signature` attribute
        if settings.emit_generic_signatures && self.decl.is_generic() {
            let signature = constants_pool.get_utf8(self.decl.signature())?;
            attributes.push(constants_pool.get_attribute(class_file::Signature(signature))?);
        }

        // `NestHost`/`NestMember` attributes
        if settings.class_version.supports_nestmates() {
            let host = self.decl.nest_host().binary_name();
            if host != self.name() {
                let nest_host_class = host.constant_index(&mut constants_pool)?;
                attributes.push(constants_pool.get_attribute(NestHost(nest_host_class))?);
            } else {
                let mut members: Vec<&BinaryName> = module_classes
                    .iter()
                    .filter(|summary| {
                        summary.decl.binary_name() != host
                            && summary.decl.nest_host().binary_name() == host
                    })
                    .map(|summary| summary.decl.binary_name())
                    .collect();
                members.sort();
                if !members.is_empty() {
                    let nest_members = members
                        .into_iter()
                        .map(|member| member.constant_index(&mut constants_pool))
                        .collect::<Result<Vec<_>, _>>()?;
                    attributes.push(constants_pool.get_attribute(NestMembers(nest_members))?);
                }
            }
        }

        // `InnerClasses` attribute
        //
        // Adding an entry can pull the enclosing class into the pool, so keep going until no new
        // classes show up.
        let mut visited: HashSet<BinaryName> = HashSet::new();
        let mut inner_classes: Vec<InnerClass> = vec![];
        loop {
            let mut pending: Vec<BinaryName> = constants_pool
                .referenced_classes()
                .filter(|name| !visited.contains(*name))
                .cloned()
                .collect();
            if pending.is_empty() {
                break;
            }
            pending.sort();

            for name in pending {
                let summary = module_classes
                    .iter()
                    .find(|summary| summary.decl.binary_name() == &name);
                if let Some(ClassSummary { decl, modifiers }) = summary {
                    if let Some(outer) = decl.outer() {
                        let inner_class = name.constant_index(&mut constants_pool)?;
                        let outer_class = outer.binary_name().constant_index(&mut constants_pool)?;
                        let inner_name = constants_pool.get_utf8(decl.name.as_str())?;
                        let access_flags =
                            modifiers.inner_class_access_flags(decl.is_interface, decl.nesting());
                        inner_classes.push(InnerClass {
                            inner_class,
                            outer_class,
                            inner_name,
                            access_flags,
                        });
                    }
                }
                visited.insert(name);
            }
        }
        if !inner_classes.is_empty() {
            attributes.push(constants_pool.get_attribute(InnerClasses(inner_classes))?);
        }

        Ok(ClassFile {
            version: settings.class_version,
            constants: constants_pool.into_offset_vec(),
            access_flags: self.modifiers.class_access_flags(self.decl.is_interface),
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }
}
