//! Minimal SPIR-V interpreter for compiled shaders.
//!
//! Runs the entry point of a module on a single invocation. It covers exactly the instruction
//! subset the compiler emits. Image sampling returns a fixed color and derivatives are zero.

use std::collections::HashMap;

use rspirv::dr::{self, Instruction, Operand};
use rspirv::spirv::{self, Op, Word};

const STEP_LIMIT: usize = 1_000_000;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Float(f32),
    Int(u32),
    Bool(bool),
    Composite(Vec<Value>),
    Pointer { var: Word, path: Vec<usize> },
    /// Opaque image or sampled image handle.
    Handle(Word),
    /// Contents of a private or output variable declared without an initializer and not yet
    /// stored. Loading it fails the test, since drivers may hand back anything.
    Undef,
}

impl Value {
    pub fn as_f32(&self) -> f32 {
        match self {
            Value::Float(v) => *v,
            other => panic!("expected float, got {other:?}"),
        }
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            Value::Int(v) => *v as i32,
            other => panic!("expected int, got {other:?}"),
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(v) => *v,
            other => panic!("expected bool, got {other:?}"),
        }
    }

    pub fn components(&self) -> &[Value] {
        match self {
            Value::Composite(c) => c,
            other => std::slice::from_ref(other),
        }
    }

    pub fn to_vec4(&self) -> [f32; 4] {
        let c = self.components();
        std::array::from_fn(|i| c.get(i).map_or(0.0, Value::as_f32))
    }

    pub fn to_ivec4(&self) -> [i32; 4] {
        let c = self.components();
        std::array::from_fn(|i| c.get(i).map_or(0, Value::as_i32))
    }

    fn contains_undef(&self) -> bool {
        match self {
            Value::Undef => true,
            Value::Composite(c) => c.iter().any(Value::contains_undef),
            _ => false,
        }
    }

    fn navigate(&self, path: &[usize]) -> &Value {
        path.iter().fold(self, |v, &i| match v {
            Value::Composite(c) => &c[i],
            other => panic!("cannot index {other:?}"),
        })
    }

    fn navigate_mut(&mut self, path: &[usize]) -> &mut Value {
        path.iter().fold(self, |v, &i| match v {
            Value::Composite(c) => &mut c[i],
            other => panic!("cannot index {other:?}"),
        })
    }
}

#[derive(Debug, Clone)]
enum Type {
    Void,
    Bool,
    Int,
    Float,
    Vector(Word, u32),
    Array(Word, u32),
    Struct(Vec<Word>),
    Pointer(Word),
    Opaque,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Returned,
    Killed,
}

enum Flow {
    Return,
    Kill,
}

pub struct Evaluator {
    module: dr::Module,
    types: HashMap<Word, Type>,
    constants: HashMap<Word, Value>,
    memory: HashMap<Word, Value>,
    names: HashMap<String, Word>,
    spec_ids: HashMap<u32, Word>,
    values: HashMap<Word, Value>,
    pub sample_result: [f32; 4],
    pub front_facing: bool,
    steps: usize,
}

fn id_ref(operand: &Operand) -> Word {
    match operand {
        Operand::IdRef(id) => *id,
        other => panic!("expected id, got {other:?}"),
    }
}

fn literal(operand: &Operand) -> u32 {
    match operand {
        Operand::LiteralBit32(v) | Operand::LiteralExtInstInteger(v) => *v,
        other => panic!("expected literal, got {other:?}"),
    }
}

impl Evaluator {
    pub fn new(words: &[u32]) -> Self {
        let module = dr::load_words(words).expect("module must parse");
        let mut eval = Self {
            module,
            types: HashMap::new(),
            constants: HashMap::new(),
            memory: HashMap::new(),
            names: HashMap::new(),
            spec_ids: HashMap::new(),
            values: HashMap::new(),
            sample_result: [0.25, 0.5, 0.75, 1.0],
            front_facing: true,
            steps: 0,
        };
        eval.load_globals();
        eval
    }

    fn load_globals(&mut self) {
        for inst in &self.module.debug_names {
            if inst.class.opcode == Op::Name {
                if let Operand::LiteralString(name) = &inst.operands[1] {
                    self.names.entry(name.clone()).or_insert(id_ref(&inst.operands[0]));
                }
            }
        }
        for inst in &self.module.annotations {
            if inst.class.opcode == Op::Decorate
                && matches!(
                    inst.operands[1],
                    Operand::Decoration(spirv::Decoration::SpecId)
                )
            {
                self.spec_ids
                    .insert(literal(&inst.operands[2]), id_ref(&inst.operands[0]));
            }
        }

        let globals = self.module.types_global_values.clone();
        for inst in &globals {
            let result = inst.result_id;
            match inst.class.opcode {
                Op::TypeVoid | Op::TypeFunction => {
                    self.types.insert(result.unwrap(), Type::Void);
                }
                Op::TypeBool => {
                    self.types.insert(result.unwrap(), Type::Bool);
                }
                Op::TypeInt => {
                    self.types.insert(result.unwrap(), Type::Int);
                }
                Op::TypeFloat => {
                    self.types.insert(result.unwrap(), Type::Float);
                }
                Op::TypeVector => {
                    let ty = Type::Vector(id_ref(&inst.operands[0]), literal(&inst.operands[1]));
                    self.types.insert(result.unwrap(), ty);
                }
                Op::TypeArray => {
                    let length = self.constants[&id_ref(&inst.operands[1])].as_i32() as u32;
                    let ty = Type::Array(id_ref(&inst.operands[0]), length);
                    self.types.insert(result.unwrap(), ty);
                }
                Op::TypeStruct => {
                    let members = inst.operands.iter().map(id_ref).collect();
                    self.types.insert(result.unwrap(), Type::Struct(members));
                }
                Op::TypePointer => {
                    let ty = Type::Pointer(id_ref(&inst.operands[1]));
                    self.types.insert(result.unwrap(), ty);
                }
                Op::TypeImage | Op::TypeSampledImage | Op::TypeSampler => {
                    self.types.insert(result.unwrap(), Type::Opaque);
                }
                Op::Constant | Op::SpecConstant => {
                    let bits = literal(&inst.operands[0]);
                    let value = match self.types[&inst.result_type.unwrap()] {
                        Type::Float => Value::Float(f32::from_bits(bits)),
                        _ => Value::Int(bits),
                    };
                    self.constants.insert(result.unwrap(), value);
                }
                Op::ConstantTrue | Op::SpecConstantTrue => {
                    self.constants.insert(result.unwrap(), Value::Bool(true));
                }
                Op::ConstantFalse | Op::SpecConstantFalse => {
                    self.constants.insert(result.unwrap(), Value::Bool(false));
                }
                Op::ConstantComposite => {
                    let parts = inst
                        .operands
                        .iter()
                        .map(|op| self.constants[&id_ref(op)].clone())
                        .collect();
                    self.constants.insert(result.unwrap(), Value::Composite(parts));
                }
                Op::ConstantNull => {
                    let value = self.zero(inst.result_type.unwrap());
                    self.constants.insert(result.unwrap(), value);
                }
                Op::Variable => {
                    let pointee = match self.types[&inst.result_type.unwrap()] {
                        Type::Pointer(pointee) => pointee,
                        ref other => panic!("variable of non-pointer type {other:?}"),
                    };
                    let value = match (&inst.operands[0], inst.operands.get(1)) {
                        (_, Some(init)) => self.constants[&id_ref(init)].clone(),
                        (
                            Operand::StorageClass(
                                spirv::StorageClass::Private
                                | spirv::StorageClass::Output
                                | spirv::StorageClass::Function,
                            ),
                            None,
                        ) => self.undef(pointee),
                        // Inputs and resources are filled in by the test before running.
                        (_, None) => self.zero(pointee),
                    };
                    let var = result.unwrap();
                    self.memory.insert(var, value);
                }
                _ => {}
            }
        }
    }

    fn zero(&self, ty: Word) -> Value {
        match &self.types[&ty] {
            Type::Bool => Value::Bool(false),
            Type::Int => Value::Int(0),
            Type::Float => Value::Float(0.0),
            Type::Vector(elem, n) | Type::Array(elem, n) => {
                Value::Composite((0..*n).map(|_| self.zero(*elem)).collect())
            }
            Type::Struct(members) => {
                Value::Composite(members.iter().map(|&m| self.zero(m)).collect())
            }
            Type::Opaque => Value::Handle(ty),
            Type::Void | Type::Pointer(_) => panic!("no zero value for type %{ty}"),
        }
    }

    fn undef(&self, ty: Word) -> Value {
        match &self.types[&ty] {
            Type::Vector(elem, n) | Type::Array(elem, n) => {
                Value::Composite((0..*n).map(|_| self.undef(*elem)).collect())
            }
            Type::Struct(members) => {
                Value::Composite(members.iter().map(|&m| self.undef(m)).collect())
            }
            Type::Opaque => Value::Handle(ty),
            _ => Value::Undef,
        }
    }

    pub fn var(&self, name: &str) -> Word {
        *self
            .names
            .get(name)
            .unwrap_or_else(|| panic!("no object named {name}"))
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn read(&self, name: &str) -> &Value {
        &self.memory[&self.var(name)]
    }

    pub fn write(&mut self, name: &str, value: Value) {
        let var = self.var(name);
        self.memory.insert(var, value);
    }

    /// Sets `c{index}` in the constant buffer.
    pub fn set_float_constant(&mut self, index: usize, value: [f32; 4]) {
        let var = self.var("c");
        let slot = self.memory.get_mut(&var).unwrap().navigate_mut(&[0, index]);
        *slot = Value::Composite(value.iter().map(|&v| Value::Float(v)).collect());
    }

    /// Sets `i{index}` in the constant buffer.
    pub fn set_int_constant(&mut self, index: usize, value: [i32; 4]) {
        let var = self.var("c");
        let slot = self.memory.get_mut(&var).unwrap().navigate_mut(&[1, index]);
        *slot = Value::Composite(value.iter().map(|&v| Value::Int(v as u32)).collect());
    }

    /// Sets the packed `b#` bits in the constant buffer.
    pub fn set_bool_constants(&mut self, bits: u32) {
        let var = self.var("c");
        *self.memory.get_mut(&var).unwrap().navigate_mut(&[2]) = Value::Int(bits);
    }

    pub fn set_spec_constant(&mut self, spec_id: u32, value: Value) {
        let id = self.spec_ids[&spec_id];
        self.constants.insert(id, value);
    }

    pub fn run(&mut self) -> Outcome {
        if let Some(&front_facing) = self.names.get("FrontFacing") {
            self.memory.insert(front_facing, Value::Bool(self.front_facing));
        }
        let entry = self.module.entry_points[0].operands[1].clone();
        match self.call(id_ref(&entry)) {
            Flow::Return => Outcome::Returned,
            Flow::Kill => Outcome::Killed,
        }
    }

    fn call(&mut self, function: Word) -> Flow {
        let index = self
            .module
            .functions
            .iter()
            .position(|f| f.def.as_ref().and_then(|d| d.result_id) == Some(function))
            .expect("called function must exist");
        let blocks: Vec<(Word, Vec<Instruction>)> = self.module.functions[index]
            .blocks
            .iter()
            .map(|b| {
                let label = b.label.as_ref().and_then(|l| l.result_id).unwrap();
                (label, b.instructions.clone())
            })
            .collect();
        let block_index: HashMap<Word, usize> = blocks
            .iter()
            .enumerate()
            .map(|(i, (label, _))| (*label, i))
            .collect();

        let mut current = 0;
        let mut previous: Option<Word> = None;
        loop {
            let (label, instructions) = &blocks[current];
            let mut next = None;
            for inst in instructions {
                self.steps += 1;
                assert!(self.steps < STEP_LIMIT, "step limit exceeded");
                match inst.class.opcode {
                    Op::Return => return Flow::Return,
                    Op::Kill => return Flow::Kill,
                    Op::Branch => next = Some(id_ref(&inst.operands[0])),
                    Op::BranchConditional => {
                        let taken = self.value(id_ref(&inst.operands[0])).as_bool();
                        next = Some(id_ref(&inst.operands[if taken { 1 } else { 2 }]));
                    }
                    Op::Switch => {
                        let selector = match self.value(id_ref(&inst.operands[0])) {
                            Value::Int(v) => v,
                            other => panic!("bad switch selector {other:?}"),
                        };
                        let mut target = id_ref(&inst.operands[1]);
                        for pair in inst.operands[2..].chunks(2) {
                            if literal(&pair[0]) == selector {
                                target = id_ref(&pair[1]);
                                break;
                            }
                        }
                        next = Some(target);
                    }
                    Op::Phi => {
                        let from = previous.expect("phi in entry block");
                        let incoming = inst
                            .operands
                            .chunks(2)
                            .find(|pair| id_ref(&pair[1]) == from)
                            .map(|pair| id_ref(&pair[0]))
                            .expect("phi has no entry for predecessor");
                        let value = self.value(incoming);
                        self.values.insert(inst.result_id.unwrap(), value);
                    }
                    Op::FunctionCall => {
                        if let Flow::Kill = self.call(id_ref(&inst.operands[0])) {
                            return Flow::Kill;
                        }
                    }
                    _ => self.execute(inst),
                }
                if next.is_some() {
                    break;
                }
            }
            let target = next.expect("block without terminator");
            previous = Some(*label);
            current = block_index[&target];
        }
    }

    fn value(&self, id: Word) -> Value {
        if let Some(v) = self.values.get(&id) {
            return v.clone();
        }
        if let Some(v) = self.constants.get(&id) {
            return v.clone();
        }
        if self.memory.contains_key(&id) {
            return Value::Pointer {
                var: id,
                path: Vec::new(),
            };
        }
        panic!("undefined id %{id}")
    }

    fn load(&self, pointer: &Value) -> Value {
        match pointer {
            Value::Pointer { var, path } => {
                let value = self.memory[var].navigate(path).clone();
                assert!(
                    !value.contains_undef(),
                    "load of uninitialised memory through %{var} {path:?}"
                );
                value
            }
            other => panic!("load through non-pointer {other:?}"),
        }
    }

    fn store(&mut self, pointer: &Value, value: Value) {
        match pointer {
            Value::Pointer { var, path } => {
                *self.memory.get_mut(var).unwrap().navigate_mut(path) = value;
            }
            other => panic!("store through non-pointer {other:?}"),
        }
    }

    fn arg(&self, inst: &Instruction, index: usize) -> Value {
        self.value(id_ref(&inst.operands[index]))
    }

    fn execute(&mut self, inst: &Instruction) {
        let result = match inst.class.opcode {
            Op::SelectionMerge | Op::LoopMerge | Op::Nop | Op::Line | Op::NoLine => return,
            Op::Store => {
                let ptr = self.arg(inst, 0);
                let value = self.arg(inst, 1);
                self.store(&ptr, value);
                return;
            }
            Op::Load => {
                let ptr = self.arg(inst, 0);
                self.load(&ptr)
            }
            Op::AccessChain => {
                let Value::Pointer { var, mut path } = self.arg(inst, 0) else {
                    panic!("access chain on non-pointer");
                };
                for op in &inst.operands[1..] {
                    path.push(self.value(id_ref(op)).as_i32() as usize);
                }
                Value::Pointer { var, path }
            }
            Op::CompositeExtract => {
                let base = self.arg(inst, 0);
                let path: Vec<usize> = inst.operands[1..]
                    .iter()
                    .map(|op| literal(op) as usize)
                    .collect();
                base.navigate(&path).clone()
            }
            Op::CompositeInsert => {
                let object = self.arg(inst, 0);
                let mut base = self.arg(inst, 1);
                let path: Vec<usize> = inst.operands[2..]
                    .iter()
                    .map(|op| literal(op) as usize)
                    .collect();
                *base.navigate_mut(&path) = object;
                base
            }
            Op::CompositeConstruct => {
                let mut parts = Vec::new();
                for op in &inst.operands {
                    match self.value(id_ref(op)) {
                        Value::Composite(c) => parts.extend(c),
                        scalar => parts.push(scalar),
                    }
                }
                Value::Composite(parts)
            }
            Op::VectorShuffle => {
                let a = self.arg(inst, 0);
                let b = self.arg(inst, 1);
                let mut all = a.components().to_vec();
                all.extend_from_slice(b.components());
                Value::Composite(
                    inst.operands[2..]
                        .iter()
                        .map(|op| all[literal(op) as usize].clone())
                        .collect(),
                )
            }

            Op::FAdd => self.binary_f(inst, |a, b| a + b),
            Op::FSub => self.binary_f(inst, |a, b| a - b),
            Op::FMul => self.binary_f(inst, |a, b| a * b),
            Op::FDiv => self.binary_f(inst, |a, b| a / b),
            Op::FNegate => map1(&self.arg(inst, 0), |v| Value::Float(-v.as_f32())),
            Op::IAdd => self.binary_i(inst, |a, b| a.wrapping_add(b)),
            Op::ISub => self.binary_i(inst, |a, b| a.wrapping_sub(b)),
            Op::SNegate => map1(&self.arg(inst, 0), |v| {
                Value::Int((v.as_i32().wrapping_neg()) as u32)
            }),
            Op::Not => map1(&self.arg(inst, 0), |v| Value::Int(!(v.as_i32() as u32))),
            Op::Dot => {
                let a = self.arg(inst, 0);
                let b = self.arg(inst, 1);
                Value::Float(
                    a.components()
                        .iter()
                        .zip(b.components())
                        .map(|(x, y)| x.as_f32() * y.as_f32())
                        .sum(),
                )
            }
            Op::VectorTimesScalar => {
                let scalar = self.arg(inst, 1).as_f32();
                map1(&self.arg(inst, 0), |v| Value::Float(v.as_f32() * scalar))
            }
            Op::Select => {
                let cond = self.arg(inst, 0);
                let a = self.arg(inst, 1);
                let b = self.arg(inst, 2);
                match cond {
                    Value::Bool(c) => {
                        if c {
                            a
                        } else {
                            b
                        }
                    }
                    Value::Composite(c) => Value::Composite(
                        c.iter()
                            .enumerate()
                            .map(|(i, c)| {
                                if c.as_bool() {
                                    a.components()[i].clone()
                                } else {
                                    b.components()[i].clone()
                                }
                            })
                            .collect(),
                    ),
                    other => panic!("bad select condition {other:?}"),
                }
            }

            Op::FOrdEqual => self.compare_f(inst, |a, b| a == b),
            Op::FOrdNotEqual => self.compare_f(inst, |a, b| a != b),
            Op::FOrdLessThan => self.compare_f(inst, |a, b| a < b),
            Op::FOrdGreaterThan => self.compare_f(inst, |a, b| a > b),
            Op::FOrdLessThanEqual => self.compare_f(inst, |a, b| a <= b),
            Op::FOrdGreaterThanEqual => self.compare_f(inst, |a, b| a >= b),
            Op::IEqual => self.compare_i(inst, |a, b| a == b),
            Op::INotEqual => self.compare_i(inst, |a, b| a != b),
            Op::LogicalAnd => self.binary_b(inst, |a, b| a && b),
            Op::LogicalOr => self.binary_b(inst, |a, b| a || b),
            Op::LogicalNot => map1(&self.arg(inst, 0), |v| Value::Bool(!v.as_bool())),
            Op::Any => Value::Bool(self.arg(inst, 0).components().iter().any(Value::as_bool)),
            Op::All => Value::Bool(self.arg(inst, 0).components().iter().all(Value::as_bool)),

            Op::ConvertFToS => map1(&self.arg(inst, 0), |v| Value::Int(v.as_f32() as i32 as u32)),
            Op::ConvertFToU => map1(&self.arg(inst, 0), |v| Value::Int(v.as_f32() as u32)),
            Op::ConvertSToF => map1(&self.arg(inst, 0), |v| Value::Float(v.as_i32() as f32)),
            Op::ConvertUToF => map1(&self.arg(inst, 0), |v| {
                Value::Float(v.as_i32() as u32 as f32)
            }),
            Op::Bitcast => {
                let float_result = self.is_float_type(inst.result_type.unwrap());
                map1(&self.arg(inst, 0), |v| match (v, float_result) {
                    (Value::Int(i), true) => Value::Float(f32::from_bits(*i)),
                    (Value::Float(f), false) => Value::Int(f.to_bits()),
                    (other, _) => other.clone(),
                })
            }
            Op::BitFieldUExtract => {
                let base = self.arg(inst, 0).as_i32() as u32;
                let offset = self.arg(inst, 1).as_i32() as u32;
                let count = self.arg(inst, 2).as_i32() as u32;
                let mask = if count >= 32 { u32::MAX } else { (1 << count) - 1 };
                Value::Int((base >> offset) & mask)
            }

            Op::ExtInst => self.ext_inst(inst),

            Op::DPdx | Op::DPdy | Op::DPdxFine | Op::DPdyFine | Op::DPdxCoarse | Op::DPdyCoarse => {
                map1(&self.arg(inst, 0), |_| Value::Float(0.0))
            }
            Op::ImageSampleImplicitLod | Op::ImageSampleExplicitLod => Value::Composite(
                self.sample_result.iter().map(|&v| Value::Float(v)).collect(),
            ),
            Op::GroupNonUniformBallot => {
                let lane = u32::from(self.arg(inst, 1).as_bool());
                Value::Composite(vec![
                    Value::Int(lane),
                    Value::Int(0),
                    Value::Int(0),
                    Value::Int(0),
                ])
            }
            other => panic!("unsupported instruction {other:?}"),
        };
        self.values.insert(inst.result_id.unwrap(), result);
    }

    fn is_float_type(&self, ty: Word) -> bool {
        match self.types[&ty] {
            Type::Float => true,
            Type::Vector(elem, _) => matches!(self.types[&elem], Type::Float),
            _ => false,
        }
    }

    fn binary_f(&self, inst: &Instruction, f: impl Fn(f32, f32) -> f32) -> Value {
        map2(&self.arg(inst, 0), &self.arg(inst, 1), |a, b| {
            Value::Float(f(a.as_f32(), b.as_f32()))
        })
    }

    fn binary_i(&self, inst: &Instruction, f: impl Fn(u32, u32) -> u32) -> Value {
        map2(&self.arg(inst, 0), &self.arg(inst, 1), |a, b| {
            Value::Int(f(a.as_i32() as u32, b.as_i32() as u32))
        })
    }

    fn binary_b(&self, inst: &Instruction, f: impl Fn(bool, bool) -> bool) -> Value {
        map2(&self.arg(inst, 0), &self.arg(inst, 1), |a, b| {
            Value::Bool(f(a.as_bool(), b.as_bool()))
        })
    }

    fn compare_f(&self, inst: &Instruction, f: impl Fn(f32, f32) -> bool) -> Value {
        map2(&self.arg(inst, 0), &self.arg(inst, 1), |a, b| {
            Value::Bool(f(a.as_f32(), b.as_f32()))
        })
    }

    fn compare_i(&self, inst: &Instruction, f: impl Fn(u32, u32) -> bool) -> Value {
        map2(&self.arg(inst, 0), &self.arg(inst, 1), |a, b| {
            Value::Bool(f(a.as_i32() as u32, b.as_i32() as u32))
        })
    }

    fn ext_inst(&self, inst: &Instruction) -> Value {
        use spirv::GLOp;

        const FABS: u32 = GLOp::FAbs as u32;
        const SABS: u32 = GLOp::SAbs as u32;
        const FRACT: u32 = GLOp::Fract as u32;
        const SIN: u32 = GLOp::Sin as u32;
        const COS: u32 = GLOp::Cos as u32;
        const POW: u32 = GLOp::Pow as u32;
        const EXP2: u32 = GLOp::Exp2 as u32;
        const LOG2: u32 = GLOp::Log2 as u32;
        const INVERSE_SQRT: u32 = GLOp::InverseSqrt as u32;
        const FMIN: u32 = GLOp::FMin as u32;
        const FMAX: u32 = GLOp::FMax as u32;
        const FCLAMP: u32 = GLOp::FClamp as u32;
        const FMA: u32 = GLOp::Fma as u32;

        let args: Vec<Value> = inst.operands[2..]
            .iter()
            .map(|op| self.value(id_ref(op)))
            .collect();
        let unary = |f: fn(f32) -> f32| map1(&args[0], |v| Value::Float(f(v.as_f32())));
        let binary = |f: fn(f32, f32) -> f32| {
            map2(&args[0], &args[1], |a, b| Value::Float(f(a.as_f32(), b.as_f32())))
        };
        let ternary = |f: fn(f32, f32, f32) -> f32| {
            let a = args[0].components();
            let b = args[1].components();
            let c = args[2].components();
            let out: Vec<Value> = (0..a.len())
                .map(|i| {
                    let pick = |v: &[Value]| v[i.min(v.len() - 1)].as_f32();
                    Value::Float(f(pick(a), pick(b), pick(c)))
                })
                .collect();
            match &args[0] {
                Value::Composite(_) => Value::Composite(out),
                _ => out.into_iter().next().unwrap(),
            }
        };

        match literal(&inst.operands[1]) {
            FABS => unary(f32::abs),
            SABS => map1(&args[0], |v| Value::Int(v.as_i32().wrapping_abs() as u32)),
            FRACT => unary(|v| v - v.floor()),
            SIN => unary(f32::sin),
            COS => unary(f32::cos),
            POW => binary(f32::powf),
            EXP2 => unary(f32::exp2),
            LOG2 => unary(f32::log2),
            INVERSE_SQRT => unary(|v| 1.0 / v.sqrt()),
            FMIN => binary(f32::min),
            FMAX => binary(f32::max),
            FCLAMP => ternary(|v, lo, hi| v.max(lo).min(hi)),
            FMA => ternary(|a, b, c| a * b + c),
            other => panic!("unsupported GLSL.std.450 op {other}"),
        }
    }
}

fn map1(v: &Value, f: impl Fn(&Value) -> Value) -> Value {
    match v {
        Value::Composite(c) => Value::Composite(c.iter().map(&f).collect()),
        scalar => f(scalar),
    }
}

fn map2(a: &Value, b: &Value, f: impl Fn(&Value, &Value) -> Value) -> Value {
    match (a, b) {
        (Value::Composite(x), Value::Composite(y)) => {
            Value::Composite(x.iter().zip(y).map(|(x, y)| f(x, y)).collect())
        }
        (x, y) => f(x, y),
    }
}

/// Counts instructions with opcode `op` across all functions.
pub fn count_ops(words: &[u32], op: Op) -> usize {
    let module = dr::load_words(words).expect("module must parse");
    module
        .functions
        .iter()
        .flat_map(|f| f.blocks.iter())
        .flat_map(|b| b.instructions.iter())
        .filter(|inst| inst.class.opcode == op)
        .count()
}

pub fn load(words: &[u32]) -> dr::Module {
    dr::load_words(words).expect("module must parse")
}

/// Initializer operand of the global variable named `name`, if it has one.
pub fn initializer_of(words: &[u32], name: &str) -> Option<Word> {
    let module = load(words);
    let var = module
        .debug_names
        .iter()
        .find_map(|inst| match (&inst.operands[0], &inst.operands[1]) {
            (Operand::IdRef(id), Operand::LiteralString(n)) if n == name => Some(*id),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no variable named {name}"));
    let inst = module
        .types_global_values
        .iter()
        .find(|inst| inst.class.opcode == Op::Variable && inst.result_id == Some(var))
        .unwrap_or_else(|| panic!("{name} is not a global variable"));
    inst.operands.get(1).map(id_ref)
}
