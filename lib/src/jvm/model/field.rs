use crate::jvm::class_file::{self, ConstantsPool, ConstantsWriter};
use crate::jvm::decls::FieldDecl;
use crate::jvm::types::{RenderDescriptor, RenderSignature};
use crate::jvm::{Error, Name, Settings};

/// In-memory representation of a field
#[derive(Clone, Debug)]
pub struct Field {
    pub decl: FieldDecl,
}

impl Field {
    pub fn new(decl: FieldDecl) -> Field {
        Field { decl }
    }

    /// Serialize the field, along with its `ConstantValue` and `Signature` attributes
    pub fn serialize_field(
        &self,
        constants_pool: &mut ConstantsPool,
        settings: &Settings,
    ) -> Result<class_file::Field, Error> {
        let name_index = constants_pool.get_utf8(self.decl.name.as_str())?;
        let descriptor_index = constants_pool.get_utf8(self.decl.descriptor().render())?;
        let mut attributes = vec![];

        if let Some(constant) = &self.decl.constant {
            let constant = class_file::ConstantValue(constant.constant_index(constants_pool)?);
            attributes.push(constants_pool.get_attribute(constant)?);
        }

        if settings.emit_generic_signatures && self.decl.ty.is_generic() {
            let signature = constants_pool.get_utf8(self.decl.ty.render_signature())?;
            attributes.push(constants_pool.get_attribute(class_file::Signature(signature))?);
        }

        Ok(class_file::Field {
            access_flags: self.decl.modifiers,
            name_index,
            descriptor_index,
            attributes,
        })
    }
}
