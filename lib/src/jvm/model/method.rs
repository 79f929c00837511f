use crate::jvm::class_file::{self, ConstantsPool, ConstantsWriter};
use crate::jvm::code::Code;
use crate::jvm::decls::MethodDecl;
use crate::jvm::types::{FieldType, RenderDescriptor, RenderSignature};
use crate::jvm::{Error, Name, Settings};

/// Semantic representation of a method
#[derive(Clone, Debug)]
pub struct Method {
    pub decl: MethodDecl,

    /// Method code implementation (`None` for abstract and native methods)
    pub code_impl: Option<Code>,
}

impl Method {
    pub fn new(decl: MethodDecl, code_impl: Option<Code>) -> Method {
        Method { decl, code_impl }
    }

    /// Serialize the method
    pub fn serialize_method(
        &self,
        constants_pool: &mut ConstantsPool,
        settings: &Settings,
    ) -> Result<class_file::Method, Error> {
        let name_index = constants_pool.get_utf8(self.decl.name.as_str())?;
        let descriptor_index = constants_pool.get_utf8(self.decl.descriptor().render())?;

        let mut attributes = vec![];

        // `Code` attribute
        if let Some(code) = &self.code_impl {
            let code = code.serialize_code(constants_pool, settings)?;
            attributes.push(constants_pool.get_attribute(code)?);
        }

        // `Exceptions` attribute
        let signature = &self.decl.signature;
        if !signature.throws.is_empty() {
            let env = self.decl.type_env();
            let mut exceptions = vec![];
            for thrown in &signature.throws {
                match env.erase(thrown)? {
                    FieldType::Ref(ref_type) => {
                        exceptions.push(ref_type.constant_index(constants_pool)?)
                    }
                    FieldType::Base(base) => {
                        return Err(Error::InvalidName(format!(
                            "{} cannot be thrown from {}",
                            base.keyword(),
                            self.decl
                        )))
                    }
                }
            }
            let exceptions = class_file::Exceptions(exceptions);
            attributes.push(constants_pool.get_attribute(exceptions)?);
        }

        // `Signature` attribute
        if settings.emit_generic_signatures && signature.is_generic() {
            let signature = constants_pool.get_utf8(signature.render_signature())?;
            attributes.push(constants_pool.get_attribute(class_file::Signature(signature))?);
        }

        Ok(class_file::Method {
            access_flags: self.decl.modifiers,
            name_index,
            descriptor_index,
            attributes,
        })
    }
}
