use crate::jvm::builder::{ClassBuilder, ClassSlot, SlotState};
use crate::jvm::class_file::{ClassFile, Serialize};
use crate::jvm::class_graph::ClassGraph;
use crate::jvm::decls::ClassDecl;
use crate::jvm::loader::ClassLoader;
use crate::jvm::model::{Class, ClassSummary};
use crate::jvm::verifier::check_class;
use crate::jvm::{BinaryName, ClassModifiers, DeclarationKind, Error, Settings};
use log::{debug, warn};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Root of the builder hierarchy: a set of classes generated (and verified) together
///
/// Classes of the same module can refer to each other freely. They are declared in the class
/// graph as soon as they are created, so code emitted in one class can already use another class
/// whose body is still being built.
pub struct ModuleBuilder<'g> {
    settings: Settings,
    class_graph: &'g ClassGraph<'g>,
    pub(super) classes: RefCell<Vec<ClassSlot<'g>>>,
    closed: Cell<bool>,
}

impl<'g> ModuleBuilder<'g> {
    pub fn new(class_graph: &'g ClassGraph<'g>) -> ModuleBuilder<'g> {
        ModuleBuilder::with_settings(class_graph, Settings::new())
    }

    pub fn with_settings(class_graph: &'g ClassGraph<'g>, settings: Settings) -> ModuleBuilder<'g> {
        ModuleBuilder {
            settings,
            class_graph,
            classes: RefCell::new(vec![]),
            closed: Cell::new(false),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn class_graph(&self) -> &'g ClassGraph<'g> {
        self.class_graph
    }

    fn check_open(&self) -> Result<(), Error> {
        if self.closed.get() {
            Err(Error::UseAfterClose {
                resource: String::from("module"),
            })
        } else {
            Ok(())
        }
    }

    /// Start building a new class
    ///
    /// The superclass and interfaces of the class must already be known to the class graph
    /// (either library classes or classes created earlier in the module). A class that was
    /// abandoned can be created again, but only with the same supertypes and kind.
    pub fn create_class<'m>(
        &'m self,
        decl: ClassDecl,
        modifiers: ClassModifiers,
    ) -> Result<ClassBuilder<'m, 'g>, Error> {
        self.check_open()?;
        let mut classes = self.classes.borrow_mut();

        let name = decl.binary_name();
        let mut abandoned_before = false;
        for slot in classes.iter().filter(|slot| slot.decl.binary_name() == name) {
            if slot.state != SlotState::Abandoned {
                return Err(Error::DuplicateDeclaration {
                    kind: DeclarationKind::Class,
                    name: name.to_string(),
                });
            }
            abandoned_before = true;
        }

        // The class graph is append-only, so an abandoned attempt leaves its entry behind
        if !abandoned_before {
            self.class_graph.declare_class(&decl)?;
        } else if !self.class_graph.matches_declaration(&decl) {
            return Err(Error::DuplicateDeclaration {
                kind: DeclarationKind::Class,
                name: format!("{} (abandoned with a different declaration)", name),
            });
        }

        debug!("Created class {}", name);
        classes.push(ClassSlot {
            decl,
            modifiers,
            state: SlotState::Open,
            constants_pool: Default::default(),
            fields: vec![],
            methods: vec![],
            built: None,
        });
        Ok(ClassBuilder {
            module: self,
            class: classes.len() - 1,
        })
    }

    /// Close the module, verifying and serializing all of its classes
    ///
    /// Classes are verified independently: one class failing does not stop the others from being
    /// written. Abandoned classes are left out entirely.
    pub fn close(&self) -> Result<CompiledModule, Error> {
        self.check_open()?;
        let classes = self.classes.borrow();

        let open_children: Vec<String> = classes
            .iter()
            .filter(|slot| slot.state == SlotState::Open)
            .map(|slot| slot.decl.binary_name().to_string())
            .collect();
        if !open_children.is_empty() {
            return Err(Error::UnclosedChildResource {
                resource: String::from("module"),
                open_children,
            });
        }

        let built: Vec<&Class> = classes
            .iter()
            .filter(|slot| slot.state == SlotState::Closed)
            .filter_map(|slot| slot.built.as_ref())
            .collect();
        let summaries: Vec<ClassSummary> = built.iter().map(|class| class.summary()).collect();
        let emitted: HashSet<&BinaryName> = built.iter().map(|class| class.name()).collect();
        let abandoned: HashSet<&BinaryName> = classes
            .iter()
            .filter(|slot| slot.state == SlotState::Abandoned)
            .map(|slot| slot.decl.binary_name())
            .filter(|name| !emitted.contains(name))
            .collect();

        let mut compiled = vec![];
        let mut rejected = vec![];
        for class in built {
            let mut errors = check_class(class, self.class_graph);

            // Abandoned classes are still in the class graph, but they won't be written out
            let mut missing: Vec<&BinaryName> = class
                .constants_pool
                .referenced_classes()
                .filter(|name| abandoned.contains(name))
                .collect();
            missing.sort();
            for name in missing {
                errors.push(Error::UnresolvedReference(format!(
                    "{} (abandoned, but used in {})",
                    name,
                    class.name()
                )));
            }

            if errors.is_empty() {
                match class.serialize(&self.settings, &summaries) {
                    Ok(class_file) => {
                        compiled.push(CompiledClass::new(class.name().clone(), class_file, true));
                        continue;
                    }
                    Err(err) => errors.push(err),
                }
            }

            warn!("Rejected class {}", class.name());
            for error in &errors {
                warn!("  {}", error);
            }
            rejected.push((class.name().clone(), errors));
        }

        self.closed.set(true);
        debug!(
            "Closed module ({} classes written, {} rejected)",
            compiled.len(),
            rejected.len()
        );
        Ok(CompiledModule {
            classes: compiled,
            rejected,
        })
    }
}

/// Output of closing a [`ModuleBuilder`]
#[derive(Debug)]
pub struct CompiledModule {
    classes: Vec<CompiledClass>,
    rejected: Vec<(BinaryName, Vec<Error>)>,
}

impl CompiledModule {
    /// Classes which passed verification
    pub fn classes(&self) -> &[CompiledClass] {
        &self.classes
    }

    pub fn class(&self, name: &BinaryName) -> Option<&CompiledClass> {
        self.classes.iter().find(|class| class.name() == name)
    }

    /// Classes which failed verification, along with every problem found in them
    pub fn rejected(&self) -> impl Iterator<Item = (&BinaryName, &[Error])> {
        self.rejected
            .iter()
            .map(|(name, errors)| (name, errors.as_slice()))
    }

    pub fn is_verified(&self) -> bool {
        self.rejected.is_empty()
    }

    /// Get the classes, unless any class was rejected
    pub fn check(self) -> Result<Vec<CompiledClass>, Error> {
        if self.rejected.is_empty() {
            Ok(self.classes)
        } else {
            let errors = self
                .rejected
                .into_iter()
                .flat_map(|(_, errors)| errors)
                .collect();
            Err(Error::VerificationError(errors))
        }
    }

    /// Write out every verified class into a directory tree matching the class names
    pub fn save_to_directory(&self, directory: impl AsRef<Path>) -> Result<Vec<PathBuf>, Error> {
        self.classes
            .iter()
            .map(|class| class.save_to_directory(directory.as_ref()))
            .collect()
    }
}

/// Serialized class
#[derive(Clone, Debug)]
pub struct CompiledClass {
    name: BinaryName,
    class_file: ClassFile,
    verified: bool,
}

impl CompiledClass {
    pub(super) fn new(name: BinaryName, class_file: ClassFile, verified: bool) -> CompiledClass {
        CompiledClass {
            name,
            class_file,
            verified,
        }
    }

    pub fn name(&self) -> &BinaryName {
        &self.name
    }

    /// Did this class go through module verification?
    ///
    /// Classes built one at a time with [`ClassBuilder::build`] are not verified.
    pub fn is_verified(&self) -> bool {
        self.verified
    }

    pub fn class_file(&self) -> &ClassFile {
        &self.class_file
    }

    pub fn bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(self.class_file.to_bytes()?)
    }

    /// Write the class to `<directory>/<binary name>.class`, creating package directories
    pub fn save_to_directory(&self, directory: &Path) -> Result<PathBuf, Error> {
        let path = directory.join(format!("{}.class", self.name));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, self.bytes()?)?;
        debug!("Wrote {}", path.display());
        Ok(path)
    }

    /// Hand the class bytes to a loader
    ///
    /// Only verified classes can be loaded.
    pub fn load<L: ClassLoader>(&self, loader: &mut L) -> Result<L::Handle, Error> {
        if !self.verified {
            return Err(Error::LoaderError(format!(
                "{} has not been verified",
                self.name
            )));
        }
        loader.load(&self.bytes()?, &self.name)
    }
}
