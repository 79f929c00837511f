use super::{ClassData, ClassGraph};
use crate::jvm::{BinaryName, Error};
use elsa::FrozenVec;

/// Classes inside `java.*` which are always in the graph
pub struct JavaClasses<'g> {
    pub lang: LangClasses<'g>,
    pub io: IoClasses<'g>,
}

/// Classes inside `java.lang.*`
pub struct LangClasses<'g> {
    pub object: &'g ClassData<'g>,
    pub char_sequence: &'g ClassData<'g>,
    pub comparable: &'g ClassData<'g>,
    pub string: &'g ClassData<'g>,
    pub class: &'g ClassData<'g>,
    pub number: &'g ClassData<'g>,
    pub integer: &'g ClassData<'g>,
    pub long: &'g ClassData<'g>,
    pub float: &'g ClassData<'g>,
    pub double: &'g ClassData<'g>,
    pub boolean: &'g ClassData<'g>,
    pub character: &'g ClassData<'g>,
    pub math: &'g ClassData<'g>,
    pub system: &'g ClassData<'g>,
    pub string_builder: &'g ClassData<'g>,
    pub iterable: &'g ClassData<'g>,
    pub runnable: &'g ClassData<'g>,
    pub cloneable: &'g ClassData<'g>,
    pub throwable: &'g ClassData<'g>,
    pub error: &'g ClassData<'g>,
    pub exception: &'g ClassData<'g>,
    pub runtime_exception: &'g ClassData<'g>,
    pub illegal_argument_exception: &'g ClassData<'g>,
    pub illegal_state_exception: &'g ClassData<'g>,
}

/// Classes inside `java.io.*`
pub struct IoClasses<'g> {
    pub serializable: &'g ClassData<'g>,
    pub print_stream: &'g ClassData<'g>,
}

impl<'g> JavaClasses<'g> {
    pub fn add_to_graph(class_graph: &ClassGraph<'g>) -> Result<JavaClasses<'g>, Error> {
        let object = class_graph.add_class(ClassData {
            name: BinaryName::OBJECT,
            superclass: None,
            interfaces: FrozenVec::new(),
            is_interface: false,
        })?;
        let io = IoClasses::add_to_graph(class_graph, object)?;
        let lang = LangClasses::add_to_graph(class_graph, object, &io)?;
        Ok(JavaClasses { lang, io })
    }
}

impl<'g> IoClasses<'g> {
    fn add_to_graph(
        class_graph: &ClassGraph<'g>,
        object: &'g ClassData<'g>,
    ) -> Result<IoClasses<'g>, Error> {
        let serializable =
            class_graph.add_class(ClassData::new(BinaryName::SERIALIZABLE, object, true))?;
        let print_stream =
            class_graph.add_class(ClassData::new(BinaryName::PRINTSTREAM, object, false))?;
        Ok(IoClasses {
            serializable,
            print_stream,
        })
    }
}

impl<'g> LangClasses<'g> {
    fn add_to_graph(
        class_graph: &ClassGraph<'g>,
        object: &'g ClassData<'g>,
        io: &IoClasses<'g>,
    ) -> Result<LangClasses<'g>, Error> {
        let class = |name: BinaryName, superclass: &'g ClassData<'g>| {
            class_graph.add_class(ClassData::new(name, superclass, false))
        };
        let interface = |name: BinaryName| class_graph.add_class(ClassData::new(name, object, true));

        let char_sequence = interface(BinaryName::CHARSEQUENCE)?;
        let comparable = interface(BinaryName::COMPARABLE)?;
        let iterable = interface(BinaryName::ITERABLE)?;
        let runnable = interface(BinaryName::RUNNABLE)?;
        let cloneable = interface(BinaryName::CLONEABLE)?;

        let string = class(BinaryName::STRING, object)?;
        let class_class = class(BinaryName::CLASS, object)?;
        let number = class(BinaryName::NUMBER, object)?;
        let integer = class(BinaryName::INTEGER, number)?;
        let long = class(BinaryName::LONG, number)?;
        let float = class(BinaryName::FLOAT, number)?;
        let double = class(BinaryName::DOUBLE, number)?;
        let boolean = class(BinaryName::BOOLEAN, object)?;
        let character = class(BinaryName::CHARACTER, object)?;
        let math = class(BinaryName::MATH, object)?;
        let system = class(BinaryName::SYSTEM, object)?;
        let string_builder = class(BinaryName::STRINGBUILDER, object)?;
        let throwable = class(BinaryName::THROWABLE, object)?;
        let error = class(BinaryName::ERROR, throwable)?;
        let exception = class(BinaryName::EXCEPTION, throwable)?;
        let runtime_exception = class(BinaryName::RUNTIMEEXCEPTION, exception)?;
        let illegal_argument_exception =
            class(BinaryName::ILLEGALARGUMENTEXCEPTION, runtime_exception)?;
        let illegal_state_exception = class(BinaryName::ILLEGALSTATEEXCEPTION, runtime_exception)?;

        for serializable in [string, class_class, number, boolean, character, throwable] {
            serializable.interfaces.push(io.serializable);
        }
        for comparable_class in [string, integer, long, float, double, boolean, character] {
            comparable_class.interfaces.push(comparable);
        }
        string.interfaces.push(char_sequence);
        string_builder.interfaces.push(char_sequence);
        string_builder.interfaces.push(io.serializable);

        Ok(LangClasses {
            object,
            char_sequence,
            comparable,
            string,
            class: class_class,
            number,
            integer,
            long,
            float,
            double,
            boolean,
            character,
            math,
            system,
            string_builder,
            iterable,
            runnable,
            cloneable,
            throwable,
            error,
            exception,
            runtime_exception,
            illegal_argument_exception,
            illegal_state_exception,
        })
    }
}
