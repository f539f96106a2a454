#![allow(dead_code)]
//! Assembles class-file bytes for tests.

use std::collections::HashMap;

pub struct ClassBuilder {
    pool: Vec<u8>,
    next_index: u16,
    utf8s: HashMap<String, u16>,
    classes: HashMap<String, u16>,
    major: u16,
    access: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<Vec<u8>>,
    methods: Vec<Vec<u8>>,
    attributes: Vec<Vec<u8>>,
}

fn u16be(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn u32be(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

impl ClassBuilder {
    pub fn new(name: &str, super_name: Option<&str>) -> Self {
        let mut b = Self {
            pool: Vec::new(),
            next_index: 1,
            utf8s: HashMap::new(),
            classes: HashMap::new(),
            major: 52,
            access: 0x0021,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        };
        b.this_class = b.class(name);
        let super_class = match super_name {
            Some(s) => b.class(s),
            None => 0,
        };
        b.super_class = super_class;
        b
    }

    pub fn version(&mut self, major: u16) -> &mut Self {
        self.major = major;
        self
    }

    fn push_entry(&mut self, bytes: &[u8], slots: u16) -> u16 {
        let index = self.next_index;
        self.pool.extend_from_slice(bytes);
        self.next_index += slots;
        index
    }

    pub fn utf8(&mut self, s: &str) -> u16 {
        if let Some(index) = self.utf8s.get(s) {
            return *index;
        }
        let mut e = vec![1];
        u16be(&mut e, s.len() as u16);
        e.extend_from_slice(s.as_bytes());
        let index = self.push_entry(&e, 1);
        self.utf8s.insert(s.to_string(), index);
        index
    }

    pub fn class(&mut self, name: &str) -> u16 {
        if let Some(index) = self.classes.get(name) {
            return *index;
        }
        let name_index = self.utf8(name);
        let mut e = vec![7];
        u16be(&mut e, name_index);
        let index = self.push_entry(&e, 1);
        self.classes.insert(name.to_string(), index);
        index
    }

    pub fn string(&mut self, s: &str) -> u16 {
        let utf8 = self.utf8(s);
        let mut e = vec![8];
        u16be(&mut e, utf8);
        self.push_entry(&e, 1)
    }

    pub fn integer(&mut self, v: i32) -> u16 {
        let mut e = vec![3];
        e.extend_from_slice(&v.to_be_bytes());
        self.push_entry(&e, 1)
    }

    pub fn long(&mut self, v: i64) -> u16 {
        let mut e = vec![5];
        e.extend_from_slice(&v.to_be_bytes());
        self.push_entry(&e, 2)
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let n = self.utf8(name);
        let d = self.utf8(descriptor);
        let mut e = vec![12];
        u16be(&mut e, n);
        u16be(&mut e, d);
        self.push_entry(&e, 1)
    }

    fn member_ref(&mut self, tag: u8, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.class(owner);
        let nat = self.name_and_type(name, descriptor);
        let mut e = vec![tag];
        u16be(&mut e, class);
        u16be(&mut e, nat);
        self.push_entry(&e, 1)
    }

    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(9, owner, name, descriptor)
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(10, owner, name, descriptor)
    }

    pub fn interface_method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(11, owner, name, descriptor)
    }

    pub fn method_handle(&mut self, kind: u8, reference: u16) -> u16 {
        let mut e = vec![15, kind];
        u16be(&mut e, reference);
        self.push_entry(&e, 1)
    }

    pub fn method_type(&mut self, descriptor: &str) -> u16 {
        let d = self.utf8(descriptor);
        let mut e = vec![16];
        u16be(&mut e, d);
        self.push_entry(&e, 1)
    }

    pub fn dynamic(&mut self, bootstrap: u16, name: &str, descriptor: &str) -> u16 {
        let nat = self.name_and_type(name, descriptor);
        let mut e = vec![17];
        u16be(&mut e, bootstrap);
        u16be(&mut e, nat);
        self.push_entry(&e, 1)
    }

    pub fn invoke_dynamic(&mut self, bootstrap: u16, name: &str, descriptor: &str) -> u16 {
        let nat = self.name_and_type(name, descriptor);
        let mut e = vec![18];
        u16be(&mut e, bootstrap);
        u16be(&mut e, nat);
        self.push_entry(&e, 1)
    }

    pub fn interface(&mut self, name: &str) -> &mut Self {
        let index = self.class(name);
        self.interfaces.push(index);
        self
    }

    fn member(&mut self, access: u16, name: &str, descriptor: &str, attributes: Vec<Vec<u8>>) -> Vec<u8> {
        let mut m = Vec::new();
        u16be(&mut m, access);
        let n = self.utf8(name);
        let d = self.utf8(descriptor);
        u16be(&mut m, n);
        u16be(&mut m, d);
        u16be(&mut m, attributes.len() as u16);
        for a in attributes {
            m.extend_from_slice(&a);
        }
        m
    }

    pub fn field(&mut self, access: u16, name: &str, descriptor: &str, attributes: Vec<Vec<u8>>) -> &mut Self {
        let f = self.member(access, name, descriptor, attributes);
        self.fields.push(f);
        self
    }

    pub fn method(&mut self, access: u16, name: &str, descriptor: &str, attributes: Vec<Vec<u8>>) -> &mut Self {
        let m = self.member(access, name, descriptor, attributes);
        self.methods.push(m);
        self
    }

    pub fn class_attribute(&mut self, attribute: Vec<u8>) -> &mut Self {
        self.attributes.push(attribute);
        self
    }

    pub fn attribute(&mut self, name: &str, body: &[u8]) -> Vec<u8> {
        let mut a = Vec::new();
        let n = self.utf8(name);
        u16be(&mut a, n);
        u32be(&mut a, body.len() as u32);
        a.extend_from_slice(body);
        a
    }

    pub fn signature(&mut self, signature: &str) -> Vec<u8> {
        let s = self.utf8(signature);
        self.attribute("Signature", &s.to_be_bytes())
    }

    pub fn constant_value(&mut self, index: u16) -> Vec<u8> {
        self.attribute("ConstantValue", &index.to_be_bytes())
    }

    pub fn exceptions(&mut self, names: &[&str]) -> Vec<u8> {
        let mut body = Vec::new();
        u16be(&mut body, names.len() as u16);
        for name in names {
            let c = self.class(name);
            u16be(&mut body, c);
        }
        self.attribute("Exceptions", &body)
    }

    pub fn annotation(&mut self, descriptor: &str, elements: Vec<(&str, Vec<u8>)>) -> Vec<u8> {
        let mut a = Vec::new();
        let d = self.utf8(descriptor);
        u16be(&mut a, d);
        u16be(&mut a, elements.len() as u16);
        for (name, value) in elements {
            let n = self.utf8(name);
            u16be(&mut a, n);
            a.extend_from_slice(&value);
        }
        a
    }

    pub fn annotations(&mut self, visible: bool, annotations: Vec<Vec<u8>>) -> Vec<u8> {
        let mut body = Vec::new();
        u16be(&mut body, annotations.len() as u16);
        for a in annotations {
            body.extend_from_slice(&a);
        }
        let name = if visible {
            "RuntimeVisibleAnnotations"
        } else {
            "RuntimeInvisibleAnnotations"
        };
        self.attribute(name, &body)
    }

    pub fn parameter_annotations(&mut self, visible: bool, parameters: Vec<Vec<Vec<u8>>>) -> Vec<u8> {
        let mut body = vec![parameters.len() as u8];
        for annotations in parameters {
            u16be(&mut body, annotations.len() as u16);
            for a in annotations {
                body.extend_from_slice(&a);
            }
        }
        let name = if visible {
            "RuntimeVisibleParameterAnnotations"
        } else {
            "RuntimeInvisibleParameterAnnotations"
        };
        self.attribute(name, &body)
    }

    /// `target` holds the target_type byte followed by its target_info.
    pub fn type_annotation(&mut self, target: &[u8], path: &[(u8, u8)], annotation: Vec<u8>) -> Vec<u8> {
        let mut t = target.to_vec();
        t.push(path.len() as u8);
        for (kind, arg) in path {
            t.push(*kind);
            t.push(*arg);
        }
        t.extend_from_slice(&annotation);
        t
    }

    pub fn type_annotations(&mut self, visible: bool, annotations: Vec<Vec<u8>>) -> Vec<u8> {
        let mut body = Vec::new();
        u16be(&mut body, annotations.len() as u16);
        for a in annotations {
            body.extend_from_slice(&a);
        }
        let name = if visible {
            "RuntimeVisibleTypeAnnotations"
        } else {
            "RuntimeInvisibleTypeAnnotations"
        };
        self.attribute(name, &body)
    }

    pub fn annotation_default(&mut self, value: Vec<u8>) -> Vec<u8> {
        self.attribute("AnnotationDefault", &value)
    }

    pub fn enum_value(&mut self, descriptor: &str, constant: &str) -> Vec<u8> {
        let mut v = vec![b'e'];
        let d = self.utf8(descriptor);
        let c = self.utf8(constant);
        u16be(&mut v, d);
        u16be(&mut v, c);
        v
    }

    pub fn class_value(&mut self, descriptor: &str) -> Vec<u8> {
        let mut v = vec![b'c'];
        let d = self.utf8(descriptor);
        u16be(&mut v, d);
        v
    }

    pub fn string_value(&mut self, s: &str) -> Vec<u8> {
        let mut v = vec![b's'];
        let u = self.utf8(s);
        u16be(&mut v, u);
        v
    }

    pub fn int_value(&mut self, value: i32) -> Vec<u8> {
        let mut v = vec![b'I'];
        let i = self.integer(value);
        u16be(&mut v, i);
        v
    }

    pub fn annotation_value(annotation: Vec<u8>) -> Vec<u8> {
        let mut v = vec![b'@'];
        v.extend_from_slice(&annotation);
        v
    }

    pub fn array_value(values: Vec<Vec<u8>>) -> Vec<u8> {
        let mut v = vec![b'['];
        u16be(&mut v, values.len() as u16);
        for value in values {
            v.extend_from_slice(&value);
        }
        v
    }

    pub fn bootstrap_methods(&mut self, methods: &[(u16, Vec<u16>)]) -> Vec<u8> {
        let mut body = Vec::new();
        u16be(&mut body, methods.len() as u16);
        for (handle, args) in methods {
            u16be(&mut body, *handle);
            u16be(&mut body, args.len() as u16);
            for arg in args {
                u16be(&mut body, *arg);
            }
        }
        self.attribute("BootstrapMethods", &body)
    }

    /// Each frame is given as raw `stack_map_frame` bytes.
    pub fn stack_map(&mut self, frames: &[Vec<u8>]) -> Vec<u8> {
        let mut body = Vec::new();
        u16be(&mut body, frames.len() as u16);
        for frame in frames {
            body.extend_from_slice(frame);
        }
        self.attribute("StackMapTable", &body)
    }

    /// Handlers are `(start_pc, end_pc, handler_pc, catch_type_index)`.
    pub fn code(
        &mut self,
        bytecode: &[u8],
        handlers: &[(u16, u16, u16, u16)],
        attributes: Vec<Vec<u8>>,
    ) -> Vec<u8> {
        let mut body = Vec::new();
        u16be(&mut body, 8);
        u16be(&mut body, 8);
        u32be(&mut body, bytecode.len() as u32);
        body.extend_from_slice(bytecode);
        u16be(&mut body, handlers.len() as u16);
        for (start, end, handler, catch_type) in handlers {
            u16be(&mut body, *start);
            u16be(&mut body, *end);
            u16be(&mut body, *handler);
            u16be(&mut body, *catch_type);
        }
        u16be(&mut body, attributes.len() as u16);
        for a in attributes {
            body.extend_from_slice(&a);
        }
        self.attribute("Code", &body)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        u32be(&mut out, 0xCAFE_BABE);
        u16be(&mut out, 0);
        u16be(&mut out, self.major);
        u16be(&mut out, self.next_index);
        out.extend_from_slice(&self.pool);
        u16be(&mut out, self.access);
        u16be(&mut out, self.this_class);
        u16be(&mut out, self.super_class);
        u16be(&mut out, self.interfaces.len() as u16);
        for i in &self.interfaces {
            u16be(&mut out, *i);
        }
        for members in [&self.fields, &self.methods] {
            u16be(&mut out, members.len() as u16);
            for m in members.iter() {
                out.extend_from_slice(m);
            }
        }
        u16be(&mut out, self.attributes.len() as u16);
        for a in &self.attributes {
            out.extend_from_slice(a);
        }
        out
    }
}
