//! Extraction of every type a single class refers to.
//!
//! Scanning is a pure function from class bytes to an ordered list of
//! dot-separated type names. Duplicates are kept: the list feeds counting.

use crate::classfile::{
    Annotation, Attribute, ClassFile, ClassFormatError, Code, Constant, ElementValue, Handle,
    Member, VerificationType,
    code::{self, Operand},
};
use crate::descriptor::{self, dotted};

/// Bootstrap methods may take dynamic constants as arguments, which in turn
/// name bootstrap methods; deeper chains are treated as malformed.
const MAX_BOOTSTRAP_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassReferences {
    /// Dotted name of the scanned class.
    pub class_name: String,
    pub major_version: u16,
    pub references: Vec<String>,
}

/// Parses `bytes` as a class file and lists every type it references.
pub fn scan_class(bytes: &[u8]) -> Result<ClassReferences, ClassFormatError> {
    let class = ClassFile::parse(bytes)?;
    let references = class_references(&class)?;
    Ok(ClassReferences {
        class_name: dotted(&class.this_class),
        major_version: class.major_version,
        references,
    })
}

pub fn class_references(class: &ClassFile) -> Result<Vec<String>, ClassFormatError> {
    let mut collector = Collector {
        class,
        out: Vec::new(),
    };
    collector.header()?;
    collector.annotations(&class.attributes)?;
    for field in &class.fields {
        collector.field(field)?;
    }
    for method in &class.methods {
        collector.method(method)?;
    }
    Ok(collector.out)
}

struct Collector<'a> {
    class: &'a ClassFile,
    out: Vec<String>,
}

impl Collector<'_> {
    fn internal_name(&mut self, name: &str) -> Result<(), ClassFormatError> {
        descriptor::class_constant_types(name, &mut self.out)
    }

    fn field_descriptor(&mut self, desc: &str) -> Result<(), ClassFormatError> {
        descriptor::parse_field_descriptor(desc)?.referenced_types(&mut self.out);
        Ok(())
    }

    fn method_descriptor(&mut self, desc: &str) -> Result<(), ClassFormatError> {
        descriptor::parse_method_descriptor(desc)?.referenced_types(&mut self.out);
        Ok(())
    }

    /// The generic signature implies the superclass and interfaces, so the
    /// raw names are only used when it is absent.
    fn header(&mut self) -> Result<(), ClassFormatError> {
        let class = self.class;
        if let Some(signature) = class.signature() {
            descriptor::parse_class_signature(signature)?.referenced_types(&mut self.out);
            return Ok(());
        }
        if let Some(super_class) = &class.super_class {
            self.internal_name(super_class)?;
        }
        for interface in &class.interfaces {
            self.internal_name(interface)?;
        }
        Ok(())
    }

    fn field(&mut self, field: &Member) -> Result<(), ClassFormatError> {
        match field.signature() {
            Some(signature) => {
                descriptor::parse_field_signature(signature)?.referenced_types(&mut self.out)
            }
            None => self.field_descriptor(&field.descriptor)?,
        }
        for attribute in &field.attributes {
            if let Attribute::ConstantValue(index) = attribute {
                self.loadable(*index, 0)?;
            }
        }
        self.annotations(&field.attributes)
    }

    /// Checked exceptions always come from the `Exceptions` attribute, never
    /// from the signature's `throws` clause.
    fn method(&mut self, method: &Member) -> Result<(), ClassFormatError> {
        match method.signature() {
            Some(signature) => descriptor::parse_method_signature(signature)?
                .referenced_types_except_throws(&mut self.out),
            None => self.method_descriptor(&method.descriptor)?,
        }
        for attribute in &method.attributes {
            if let Attribute::Exceptions(names) = attribute {
                for name in names {
                    self.internal_name(name)?;
                }
            }
        }
        self.annotations(&method.attributes)?;
        for attribute in &method.attributes {
            if let Attribute::Code(code) = attribute {
                self.code(code)?;
            }
        }
        Ok(())
    }

    fn annotations(&mut self, attributes: &[Attribute]) -> Result<(), ClassFormatError> {
        for attribute in attributes {
            match attribute {
                Attribute::Annotations { annotations, .. } => {
                    for annotation in annotations {
                        self.annotation(annotation)?;
                    }
                }
                Attribute::ParameterAnnotations { parameters, .. } => {
                    for annotation in parameters.iter().flatten() {
                        self.annotation(annotation)?;
                    }
                }
                Attribute::TypeAnnotations { annotations, .. } => {
                    for type_annotation in annotations {
                        self.annotation(&type_annotation.annotation)?;
                    }
                }
                Attribute::AnnotationDefault(value) => self.element_value(value)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn annotation(&mut self, annotation: &Annotation) -> Result<(), ClassFormatError> {
        self.field_descriptor(&annotation.type_descriptor)?;
        for (_, value) in &annotation.elements {
            self.element_value(value)?;
        }
        Ok(())
    }

    fn element_value(&mut self, value: &ElementValue) -> Result<(), ClassFormatError> {
        match value {
            ElementValue::Const { .. } => {}
            ElementValue::Enum {
                type_descriptor, ..
            } => self.field_descriptor(type_descriptor)?,
            ElementValue::Class(desc) => {
                if let Some(ty) = descriptor::parse_return_descriptor(desc)? {
                    ty.referenced_types(&mut self.out);
                }
            }
            ElementValue::Annotation(nested) => self.annotation(nested)?,
            ElementValue::Array(values) => {
                for v in values {
                    self.element_value(v)?;
                }
            }
        }
        Ok(())
    }

    fn code(&mut self, code: &Code) -> Result<(), ClassFormatError> {
        let class = self.class;
        let cp = &class.constant_pool;

        for instruction in code::instructions(&code.bytecode) {
            match instruction?.operand {
                Operand::None => {}
                Operand::Constant(index) => self.loadable(index, 0)?,
                Operand::Class(index) | Operand::MultiANewArray { class: index, .. } => {
                    self.internal_name(cp.class_name(index)?)?
                }
                // Only the field's type; its owner is not recorded.
                Operand::Field(index) => self.field_descriptor(cp.member_ref(index)?.descriptor)?,
                Operand::Method(index) => {
                    let member = cp.member_ref(index)?;
                    self.internal_name(member.owner)?;
                    self.method_descriptor(member.descriptor)?;
                }
                Operand::InvokeDynamic(index) => match cp.get(index)? {
                    Constant::InvokeDynamic {
                        bootstrap_index,
                        name_and_type_index,
                    } => {
                        let (_, desc) = cp.name_and_type(*name_and_type_index)?;
                        self.method_descriptor(desc)?;
                        self.bootstrap(*bootstrap_index, 0)?;
                    }
                    _ => {
                        return Err(ClassFormatError::UnexpectedConstant {
                            index,
                            expected: "InvokeDynamic",
                        });
                    }
                },
            }
        }

        for handler in &code.exception_table {
            if let Some(catch_type) = &handler.catch_type {
                self.internal_name(catch_type)?;
            }
        }

        for attribute in &code.attributes {
            if let Attribute::StackMapTable(frames) = attribute {
                for frame in frames {
                    for ty in frame.locals.iter().chain(&frame.stack) {
                        if let VerificationType::Object(name) = ty {
                            self.internal_name(name)?;
                        }
                    }
                }
            }
        }
        self.annotations(&code.attributes)
    }

    /// A loadable constant names a type when it is a class, method type,
    /// method handle or dynamically-computed constant.
    fn loadable(&mut self, index: u16, depth: usize) -> Result<(), ClassFormatError> {
        let class = self.class;
        let cp = &class.constant_pool;
        match cp.get(index)? {
            Constant::Class { name_index } => self.internal_name(cp.utf8(*name_index)?)?,
            Constant::MethodType { descriptor_index } => {
                self.method_descriptor(cp.utf8(*descriptor_index)?)?
            }
            Constant::MethodHandle { .. } => self.handle(cp.handle(index)?)?,
            Constant::Dynamic {
                bootstrap_index,
                name_and_type_index,
            } => {
                let (_, desc) = cp.name_and_type(*name_and_type_index)?;
                self.field_descriptor(desc)?;
                self.bootstrap(*bootstrap_index, depth + 1)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn handle(&mut self, handle: Handle<'_>) -> Result<(), ClassFormatError> {
        self.internal_name(handle.member.owner)?;
        if handle.is_field() {
            self.field_descriptor(handle.member.descriptor)
        } else {
            self.method_descriptor(handle.member.descriptor)
        }
    }

    fn bootstrap(&mut self, index: u16, depth: usize) -> Result<(), ClassFormatError> {
        if depth > MAX_BOOTSTRAP_DEPTH {
            return Err(ClassFormatError::NestingTooDeep);
        }
        let class = self.class;
        let method = class
            .bootstrap_methods()
            .get(usize::from(index))
            .ok_or(ClassFormatError::MissingBootstrapMethod(index))?;
        self.handle(class.constant_pool.handle(method.method_handle)?)?;
        for argument in &method.arguments {
            self.loadable(*argument, depth)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::fixture::ClassBuilder;
    use crate::namespace::Namespace;
    use crate::usage::Usage;

    fn scan(b: &ClassBuilder) -> ClassReferences {
        scan_class(&b.build()).unwrap()
    }

    fn usage(b: &ClassBuilder) -> Usage {
        let refs = scan(b);
        Usage::from_references(refs.references.iter().map(String::as_str))
    }

    fn tracked_total(u: &Usage) -> u64 {
        u.javax() + u.jakarta()
    }

    #[test]
    fn parameter_type_counts_once() {
        let mut b = ClassBuilder::new("com/acme/Client", Some("java/lang/Object"));
        b.method(0x0401, "bind", "(Ljavax/ejb/SessionBean;)V", Vec::new());

        let refs = scan(&b);
        assert_eq!(refs.class_name, "com.acme.Client");
        assert_eq!(refs.references, vec!["java.lang.Object", "javax.ejb.SessionBean"]);

        let u = usage(&b);
        assert_eq!(u.get(Namespace::JavaxEjb), 1);
        assert_eq!(tracked_total(&u), 1);
    }

    #[test]
    fn annotation_processing_is_not_counted() {
        let mut b = ClassBuilder::new(
            "com/acme/Processor",
            Some("javax/annotation/processing/AbstractProcessor"),
        );
        let generated = b.annotation("Ljavax/annotation/Generated;", Vec::new());
        let attr = b.annotations(true, vec![generated]);
        b.class_attribute(attr);

        let u = usage(&b);
        assert_eq!(u.get(Namespace::JavaxAnnotation), 1);
        assert_eq!(tracked_total(&u), 1);
    }

    #[test]
    fn type_annotation_on_type_argument_counts_once() {
        let mut b = ClassBuilder::new("com/acme/Ids", Some("java/lang/Object"));
        let ann = b.annotation("Ljavax/persistence/Id;", Vec::new());
        let ta = b.type_annotation(&[0x13], &[(3, 0)], ann);
        let tas = b.type_annotations(true, vec![ta]);
        let sig = b.signature("Ljava/util/Set<Ljava/lang/Long;>;");
        b.field(0x0002, "ids", "Ljava/util/Set;", vec![sig, tas]);

        let refs = scan(&b);
        assert_eq!(
            refs.references
                .iter()
                .filter(|r| r.as_str() == "java.util.Set")
                .count(),
            1
        );
        let u = usage(&b);
        assert_eq!(u.get(Namespace::JavaxPersistence), 1);
        assert_eq!(tracked_total(&u), 1);
    }

    #[test]
    fn class_signature_replaces_raw_supertypes() {
        let mut b = ClassBuilder::new("com/acme/Web", Some("javax/servlet/GenericServlet"));
        b.interface("javax/servlet/Servlet");
        let sig = b.signature("Ljavax/servlet/GenericServlet;Ljavax/servlet/Servlet;");
        b.class_attribute(sig);
        assert_eq!(usage(&b).get(Namespace::JavaxServlet), 2);

        let mut raw = ClassBuilder::new("com/acme/Web", Some("javax/servlet/GenericServlet"));
        raw.interface("javax/servlet/Servlet");
        assert_eq!(usage(&raw).get(Namespace::JavaxServlet), 2);
    }

    #[test]
    fn exceptions_come_from_attribute_not_signature() {
        let mut b = ClassBuilder::new("com/acme/Home", Some("java/lang/Object"));
        let sig = b.signature("<E:Ljava/lang/Exception;>()V^Ljavax/ejb/CreateException;");
        let exceptions = b.exceptions(&["javax/ejb/CreateException"]);
        b.method(0x0401, "create", "()V", vec![sig, exceptions]);

        let u = usage(&b);
        assert_eq!(u.get(Namespace::JavaxEjb), 1);

        let mut no_sig = ClassBuilder::new("com/acme/Home", Some("java/lang/Object"));
        let exceptions = no_sig.exceptions(&["javax/ejb/RemoveException"]);
        no_sig.method(0x0401, "remove", "()V", vec![exceptions]);
        assert_eq!(usage(&no_sig).get(Namespace::JavaxEjb), 1);
    }

    #[test]
    fn annotation_members_are_walked() {
        let mut b = ClassBuilder::new("com/acme/Bean", Some("java/lang/Object"));
        let tx_type = b.enum_value("Ljavax/ejb/TransactionAttributeType;", "REQUIRED");
        let tx = b.annotation("Ljavax/ejb/TransactionAttribute;", vec![("value", tx_type)]);
        let queue = b.class_value("Ljavax/jms/Queue;");
        let void = b.class_value("V");
        let name = b.string_value("javax.mail.Session");
        let weight = b.int_value(3);
        let stateless = b.annotation(
            "Ljavax/ejb/Stateless;",
            vec![
                ("name", name),
                ("weight", weight),
                ("tx", ClassBuilder::annotation_value(tx)),
                ("types", ClassBuilder::array_value(vec![queue, void])),
            ],
        );
        let class_anns = b.annotations(false, vec![stateless]);
        b.class_attribute(class_anns);

        let named = b.annotation("Ljavax/inject/Named;", Vec::new());
        let params = b.parameter_annotations(true, vec![vec![named]]);
        let faces = b.class_value("Ljavax/faces/component/UIComponent;");
        let default = b.annotation_default(faces);
        b.method(0x0401, "component", "(I)Ljava/lang/Class;", vec![params, default]);

        let u = usage(&b);
        assert_eq!(u.get(Namespace::JavaxEjb), 3);
        assert_eq!(u.get(Namespace::JavaxJms), 1);
        assert_eq!(u.get(Namespace::JavaxInject), 1);
        assert_eq!(u.get(Namespace::JavaxFaces), 1);
        assert_eq!(u.get(Namespace::JavaxMail), 0);
    }

    #[test]
    fn method_bodies_contribute_operand_types() {
        let mut b = ClassBuilder::new("com/acme/Worker", Some("java/lang/Object"));
        let session = b.class("javax/mail/Session");
        let queues = b.class("[Ljavax/jms/Queue;");
        let field = b.field_ref("javax/faces/Holder", "provider", "Ljavax/inject/Provider;");
        let get_attribute = b.interface_method_ref(
            "javax/servlet/ServletRequest",
            "getAttribute",
            "(Ljava/lang/String;)Ljava/lang/Object;",
        );
        let get = b.class("javax/ws/rs/GET");
        let text = b.string("javax.batch.api.Batchlet");
        let validators = b.class("[[Ljavax/validation/Validator;");

        let metafactory = b.method_ref(
            "java/lang/invoke/LambdaMetafactory",
            "metafactory",
            "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodHandle;Ljava/lang/invoke/MethodType;)Ljava/lang/invoke/CallSite;",
        );
        let bsm = b.method_handle(6, metafactory);
        let erased = b.method_type("(Ljava/lang/Object;)V");
        let body = b.method_ref("com/acme/Worker", "lambda$0", "(Ljavax/websocket/Session;)V");
        let body_handle = b.method_handle(6, body);
        let instantiated = b.method_type("(Ljavax/websocket/Session;)V");
        let indy = b.invoke_dynamic(0, "accept", "()Ljava/util/function/Consumer;");
        let bootstraps = b.bootstrap_methods(&[(bsm, vec![erased, body_handle, instantiated])]);
        b.class_attribute(bootstraps);

        let failure = b.class("javax/persistence/PersistenceException");
        let context = b.class("javax/el/ELContext");

        let [s_hi, s_lo] = session.to_be_bytes();
        let [q_hi, q_lo] = queues.to_be_bytes();
        let [f_hi, f_lo] = field.to_be_bytes();
        let [m_hi, m_lo] = get_attribute.to_be_bytes();
        let [g_hi, g_lo] = get.to_be_bytes();
        let [t_hi, t_lo] = text.to_be_bytes();
        let [v_hi, v_lo] = validators.to_be_bytes();
        let [i_hi, i_lo] = indy.to_be_bytes();
        let [c_hi, c_lo] = context.to_be_bytes();
        let bytecode = [
            0xbb, s_hi, s_lo, // new
            0xc0, q_hi, q_lo, // checkcast
            0xb4, f_hi, f_lo, // getfield
            0xb9, m_hi, m_lo, 0x02, 0x00, // invokeinterface
            0x13, g_hi, g_lo, // ldc_w class
            0x13, t_hi, t_lo, // ldc_w string
            0xc5, v_hi, v_lo, 0x02, // multianewarray
            0xba, i_hi, i_lo, 0x00, 0x00, // invokedynamic
            0xb1, // return
        ];

        let frame = vec![255, 0, 29, 0, 1, 7, c_hi, c_lo, 0, 0];
        let stack_map = b.stack_map(&[frame]);
        let nonnull = b.annotation("Ljavax/annotation/Nonnull;", Vec::new());
        let local = b.type_annotation(&[0x40, 0, 1, 0, 0, 0, 29, 0, 1], &[], nonnull);
        let code_annotations = b.type_annotations(false, vec![local]);
        let code = b.code(
            &bytecode,
            &[(0, 29, 29, failure), (0, 29, 29, 0)],
            vec![stack_map, code_annotations],
        );
        b.method(0x0001, "work", "()V", vec![code]);

        let u = usage(&b);
        assert_eq!(u.get(Namespace::JavaxMail), 1);
        assert_eq!(u.get(Namespace::JavaxJms), 1);
        assert_eq!(u.get(Namespace::JavaxInject), 1);
        assert_eq!(u.get(Namespace::JavaxFaces), 0);
        assert_eq!(u.get(Namespace::JavaxServlet), 1);
        assert_eq!(u.get(Namespace::JavaxWsRs), 1);
        assert_eq!(u.get(Namespace::JavaxBatch), 0);
        assert_eq!(u.get(Namespace::JavaxValidation), 1);
        assert_eq!(u.get(Namespace::JavaxWebsocket), 2);
        assert_eq!(u.get(Namespace::JavaxPersistence), 1);
        assert_eq!(u.get(Namespace::JavaxEl), 1);
        assert_eq!(u.get(Namespace::JavaxAnnotation), 1);
        assert_eq!(tracked_total(&u), 11);
    }

    #[test]
    fn dynamic_constants_are_unpacked() {
        let mut b = ClassBuilder::new("com/acme/Condy", Some("java/lang/Object"));
        let factory = b.method_ref(
            "com/acme/Bootstraps",
            "make",
            "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/Class;Ljavax/mail/Address;)Ljavax/json/JsonObject;",
        );
        let bsm = b.method_handle(6, factory);
        let address = b.class("jakarta/mail/Address");
        let constant = b.dynamic(0, "json", "Ljavax/json/JsonObject;");
        let bootstraps = b.bootstrap_methods(&[(bsm, vec![address])]);
        b.class_attribute(bootstraps);
        let [hi, lo] = constant.to_be_bytes();
        let code = b.code(&[0x13, hi, lo, 0x57, 0xb1], &[], Vec::new());
        b.method(0x0009, "load", "()V", vec![code]);

        let u = usage(&b);
        // descriptor once, bootstrap return type once
        assert_eq!(u.get(Namespace::JavaxJson), 2);
        assert_eq!(u.get(Namespace::JavaxMail), 1);
        assert_eq!(u.get(Namespace::JakartaMail), 1);
    }

    #[test]
    fn field_handles_use_field_descriptors() {
        let mut b = ClassBuilder::new("com/acme/Handles", Some("java/lang/Object"));
        let field = b.field_ref("com/acme/Config", "queue", "Ljakarta/jms/Queue;");
        let handle = b.method_handle(1, field);
        let [hi, lo] = handle.to_be_bytes();
        let code = b.code(&[0x13, hi, lo, 0x57, 0xb1], &[], Vec::new());
        b.method(0x0009, "load", "()V", vec![code]);
        assert_eq!(usage(&b).get(Namespace::JakartaJms), 1);
    }

    #[test]
    fn malformed_signature_rejects_the_class() {
        let mut b = ClassBuilder::new("com/acme/Broken", Some("java/lang/Object"));
        let sig = b.signature("(Ljava/lang/String");
        b.method(0x0401, "broken", "(Ljava/lang/String;)V", vec![sig]);
        assert!(matches!(
            scan_class(&b.build()),
            Err(ClassFormatError::BadSignature { .. })
        ));
    }

    #[test]
    fn missing_bootstrap_method_rejects_the_class() {
        let mut b = ClassBuilder::new("com/acme/Indy", Some("java/lang/Object"));
        let indy = b.invoke_dynamic(3, "run", "()Ljava/lang/Runnable;");
        let [hi, lo] = indy.to_be_bytes();
        let code = b.code(&[0xba, hi, lo, 0, 0, 0xb1], &[], Vec::new());
        b.method(0x0009, "run", "()V", vec![code]);
        assert_eq!(
            scan_class(&b.build()),
            Err(ClassFormatError::MissingBootstrapMethod(3))
        );
    }

    #[test]
    fn records_major_version() {
        let mut b = ClassBuilder::new("com/acme/Old", Some("java/lang/Object"));
        b.version(49);
        assert_eq!(scan(&b).major_version, 49);
    }
}
