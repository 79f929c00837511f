use crate::jvm::decls::ClassRef;
use crate::jvm::types::{FieldType, JvmType, TypeArg, TypeEnv, TypeVar, TypeVarScope};
use crate::jvm::{BinaryName, Error};

/// What a use site knows about the class type variables of a member it accesses
///
/// Member types are written in terms of the declaring class's type parameters. Accessing the
/// member through a receiver typed `C<? super CharSequence>` binds those parameters to the
/// receiver's type arguments, which live in the caller's scope.
pub struct Instantiation<'a> {
    receiver: &'a ClassRef,
}

enum Binding<'a> {
    /// Bound to a type argument of the receiver
    Arg(&'a TypeArg),

    /// Receiver is raw (or doesn't mention the variable's class)
    Raw,
}

/// Constraint on an argument passed for a parameter of a generic member
#[derive(Debug, PartialEq, Eq)]
pub enum ParameterCheck {
    /// The erased descriptor type is all there is to check
    Erased,

    /// The argument must be assignable to every one of these
    AssignableToAll(Vec<FieldType<BinaryName>>),

    /// Only `null` can be passed (the parameter's type is only known through `? extends` or `?`)
    NullOnly,
}

impl<'a> Instantiation<'a> {
    pub fn of(receiver: &'a ClassRef) -> Instantiation<'a> {
        Instantiation { receiver }
    }

    fn binding(&self, var: &TypeVar) -> Binding<'a> {
        let class = match &var.scope {
            TypeVarScope::Class(class) => class,
            TypeVarScope::Method => return Binding::Raw,
        };
        let mut next = Some(self.receiver);
        while let Some(receiver) = next {
            if &receiver.name == class {
                let index = receiver.type_params.iter().position(|p| p.name == var.name);
                return match index.and_then(|idx| receiver.type_args.get(idx)) {
                    Some(arg) => Binding::Arg(arg),
                    None => Binding::Raw,
                };
            }
            next = receiver.enclosing.as_deref();
        }
        Binding::Raw
    }

    /// What an argument for a parameter of type `param` must satisfy
    ///
    /// `member_env` resolves the member's own (method and class) type variables, `caller_env`
    /// resolves the variables appearing in the receiver's type arguments.
    pub fn parameter_check(
        &self,
        param: &JvmType,
        member_env: &TypeEnv,
        caller_env: &TypeEnv,
    ) -> Result<ParameterCheck, Error> {
        let var = match param {
            JvmType::TypeVar(var) => var,
            _ => return Ok(ParameterCheck::Erased),
        };
        match &var.scope {
            TypeVarScope::Method => {
                let bounds = member_env.erase_bounds(member_env.resolve(var)?)?;
                if bounds.is_empty() {
                    Ok(ParameterCheck::Erased)
                } else {
                    Ok(ParameterCheck::AssignableToAll(bounds))
                }
            }
            TypeVarScope::Class(_) => match self.binding(var) {
                Binding::Raw => Ok(ParameterCheck::Erased),
                Binding::Arg(TypeArg::Invariant(ty) | TypeArg::Super(ty)) => {
                    Ok(ParameterCheck::AssignableToAll(vec![caller_env.erase(ty)?]))
                }
                Binding::Arg(TypeArg::Extends(_) | TypeArg::Wildcard) => {
                    Ok(ParameterCheck::NullOnly)
                }
            },
        }
    }

    /// Erased type of a value of type `ty` read out of the member
    ///
    /// This is at least as specific as the erasure in the member's descriptor.
    pub fn yielded_type(
        &self,
        ty: &JvmType,
        member_env: &TypeEnv,
        caller_env: &TypeEnv,
    ) -> Result<FieldType<BinaryName>, Error> {
        match ty {
            JvmType::Array(elem) => Ok(FieldType::array(
                self.yielded_type(elem, member_env, caller_env)?,
            )),
            JvmType::TypeVar(var) if matches!(var.scope, TypeVarScope::Class(_)) => {
                match self.binding(var) {
                    Binding::Arg(TypeArg::Invariant(arg) | TypeArg::Extends(arg)) => {
                        caller_env.erase(arg)
                    }
                    _ => member_env.erase(ty),
                }
            }
            other => member_env.erase(other),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::types::TypeParam;
    use crate::jvm::Name;

    fn generic_class() -> ClassRef {
        let mut class = ClassRef::raw(BinaryName::from_str("examples/C").unwrap());
        class.type_params = vec![TypeParam::new("R").unwrap()];
        class
    }

    fn class_var() -> JvmType {
        TypeVar::class(&BinaryName::from_str("examples/C").unwrap(), "R")
            .unwrap()
            .into()
    }

    #[test]
    fn super_wildcard_accepts_and_yields_bound() {
        let receiver = generic_class().with_type_args(vec![TypeArg::Super(JvmType::object(
            BinaryName::CHARSEQUENCE,
        ))]);
        let inst = Instantiation::of(&receiver);
        let env = TypeEnv::new().with_class_params(&receiver.name, &receiver.type_params);
        let caller = TypeEnv::new();

        assert_eq!(
            inst.parameter_check(&class_var(), &env, &caller).unwrap(),
            ParameterCheck::AssignableToAll(vec![FieldType::object(BinaryName::CHARSEQUENCE)])
        );
        assert_eq!(
            inst.yielded_type(&class_var(), &env, &caller).unwrap(),
            FieldType::object(BinaryName::OBJECT)
        );
    }

    #[test]
    fn extends_wildcard_only_accepts_null() {
        let receiver = generic_class()
            .with_type_args(vec![TypeArg::Extends(JvmType::object(BinaryName::NUMBER))]);
        let inst = Instantiation::of(&receiver);
        let env = TypeEnv::new().with_class_params(&receiver.name, &receiver.type_params);
        let caller = TypeEnv::new();

        assert_eq!(
            inst.parameter_check(&class_var(), &env, &caller).unwrap(),
            ParameterCheck::NullOnly
        );
        assert_eq!(
            inst.yielded_type(&class_var(), &env, &caller).unwrap(),
            FieldType::object(BinaryName::NUMBER)
        );
    }

    #[test]
    fn method_variables_ignore_receiver() {
        let receiver = generic_class().with_type_args(vec![TypeArg::Wildcard]);
        let inst = Instantiation::of(&receiver);
        let method_params = vec![TypeParam::new("T")
            .unwrap()
            .extends(JvmType::object(BinaryName::NUMBER))];
        let env = TypeEnv::new()
            .with_method_params(&method_params)
            .with_class_params(&receiver.name, &receiver.type_params);
        let caller = TypeEnv::new();

        let method_var: JvmType = TypeVar::method("T").unwrap().into();
        assert_eq!(
            inst.parameter_check(&method_var, &env, &caller).unwrap(),
            ParameterCheck::AssignableToAll(vec![FieldType::object(BinaryName::NUMBER)])
        );
    }

    #[test]
    fn raw_receiver_is_erased() {
        let receiver = generic_class();
        let inst = Instantiation::of(&receiver);
        let env = TypeEnv::new().with_class_params(&receiver.name, &receiver.type_params);
        assert_eq!(
            inst.parameter_check(&class_var(), &env, &TypeEnv::new()).unwrap(),
            ParameterCheck::Erased
        );
    }
}
