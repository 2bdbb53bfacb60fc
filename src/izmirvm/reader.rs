//! Reader for textual routine listings, as produced by
//! [`MutableProgram::listing`].
//!
//! ```text
//! # comment
//! .procedure NAME ARITY
//! $label:
//!     mnemonic operand, operand, ...
//! .main
//!     ...
//! ```
//!
//! Stack and register forms of an instruction share a mnemonic and are
//! told apart by their operands (`print` / `print %r0`).

use std::str::FromStr;

use phf::phf_map;

use crate::codegen::vm::{
    self, Condition, Label, Operand, Operation, Register, Slot, VMInstruction, Value,
};

use super::{
    error::{EditStatus, RoutineParseError},
    routine::{MutableProgram, MutableRoutine, RoutineName},
};

#[derive(Debug, Clone, Copy)]
enum Mnemonic {
    Branch,
    PushConstant,
    PushVariable,
    PopVariable,
    Input,
    Print,
    Drop,
    Call,
    Return,
    Move,
}

/// Mnemonics which are neither an operation nor a conditional branch.
static MNEMONICS: phf::Map<&'static str, Mnemonic> = phf_map! {
    "b" => Mnemonic::Branch,
    "pushconstant" => Mnemonic::PushConstant,
    "pushvariable" => Mnemonic::PushVariable,
    "popvariable" => Mnemonic::PopVariable,
    "input" => Mnemonic::Input,
    "print" => Mnemonic::Print,
    "drop" => Mnemonic::Drop,
    "call" => Mnemonic::Call,
    "return" => Mnemonic::Return,
    "mov" => Mnemonic::Move,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Parameter {
    Integer(Value),
    Slot(Slot),
    Register(Register),
    Label(Label),
    Name(String),
}

impl FromStr for Parameter {
    type Err = EditStatus;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let index = |digits: &str| digits.parse::<usize>().map_err(|_| EditStatus::InvalidParameter);

        if let Some(digits) = token.strip_prefix('@') {
            Ok(Self::Slot(Slot(index(digits)?)))
        } else if let Some(digits) = token.strip_prefix("%r") {
            Ok(Self::Register(Register(index(digits)?)))
        } else if let Some(name) = token.strip_prefix('$') {
            if is_name(name) {
                Ok(Self::Label(Label(name.to_owned())))
            } else {
                Err(EditStatus::InvalidParameter)
            }
        } else if let Ok(value) = token.parse::<Value>() {
            Ok(Self::Integer(value))
        } else if is_name(token) {
            Ok(Self::Name(token.to_owned()))
        } else {
            Err(EditStatus::InvalidParameter)
        }
    }
}

fn is_name(token: &str) -> bool {
    let mut chars = token.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Read a whole program listing.
pub fn read_program(file_name: &str, content: &str) -> Result<MutableProgram, RoutineParseError> {
    let mut procedures = Vec::new();
    let mut main: Option<MutableRoutine> = None;
    // index into `procedures`, or `None` for main
    let mut current: Option<Option<usize>> = None;

    for (index, raw_line) in content.lines().enumerate() {
        let line = raw_line
            .split_once('#')
            .map_or(raw_line, |(code, _comment)| code)
            .trim();
        if line.is_empty() {
            continue;
        }

        let error = |token: &str, status| RoutineParseError {
            file_name: file_name.to_owned(),
            line: index + 1,
            token: token.to_owned(),
            status,
        };

        if let Some(header) = line.strip_prefix('.') {
            let mut words = header.split_whitespace();
            match (words.next(), words.next(), words.next(), words.next()) {
                (Some("main"), None, None, None) => {
                    if main.is_some() {
                        return Err(error(line, EditStatus::MainDefinedTwice));
                    }
                    main = Some(MutableRoutine::main());
                    current = Some(None);
                }
                (Some("procedure"), Some(name), Some(arity), None) if is_name(name) => {
                    let arity = arity
                        .parse()
                        .map_err(|_| error(arity, EditStatus::InvalidRoutineHeader))?;
                    procedures.push(MutableRoutine::new(
                        RoutineName::Procedure(name.to_owned()),
                        arity,
                    ));
                    current = Some(Some(procedures.len() - 1));
                }
                _ => return Err(error(line, EditStatus::InvalidRoutineHeader)),
            }
            continue;
        }

        let routine = match current {
            Some(Some(procedure)) => &mut procedures[procedure],
            Some(None) => main
                .as_mut()
                .ok_or_else(|| error(line, EditStatus::InstructionOutsideRoutine))?,
            None => return Err(error(line, EditStatus::InstructionOutsideRoutine)),
        };

        if let Some(name) = line.strip_prefix('$').and_then(|l| l.strip_suffix(':')) {
            let label = Label(name.to_owned());
            if !is_name(name) {
                return Err(error(line, EditStatus::InvalidParameter));
            }
            if routine.instructions.contains(&vm::label(label.clone())) {
                return Err(error(line, EditStatus::LabelDefinedTwice));
            }
            routine.append([vm::label(label)]);
            continue;
        }

        let instruction = read_instruction(line).map_err(|(token, status)| error(token, status))?;
        routine.append([instruction]);
    }

    let main = main.ok_or_else(|| RoutineParseError {
        file_name: file_name.to_owned(),
        line: content.lines().count(),
        token: String::new(),
        status: EditStatus::MissingMain,
    })?;

    Ok(MutableProgram::new(file_name.to_owned(), procedures, main))
}

/// Read one instruction line; failures carry the offending token.
fn read_instruction(line: &str) -> Result<VMInstruction, (&str, EditStatus)> {
    let (mnemonic, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(mnemonic, rest)| (mnemonic, rest.trim()));

    let tokens: Vec<&str> = if rest.is_empty() {
        Vec::new()
    } else {
        rest.split(',').map(str::trim).collect()
    };
    let parameters = tokens
        .iter()
        .map(|token| token.parse::<Parameter>().map_err(|status| (*token, status)))
        .collect::<Result<Vec<_>, _>>()?;

    let kind_error = |position: usize| {
        (
            tokens.get(position).copied().unwrap_or(mnemonic),
            EditStatus::InvalidParameterKind,
        )
    };
    let count_error = |expected: &[usize]| {
        let status = if expected.iter().all(|count| parameters.len() > *count) {
            EditStatus::TooManyParameters
        } else {
            EditStatus::TooFewParameters
        };
        (mnemonic, status)
    };

    if let Ok(operation) = Operation::from_str(mnemonic) {
        return match parameters.as_slice() {
            [] => Ok(VMInstruction::Operate(operation)),
            [sources @ .., destination] => {
                let sources = registers(sources).ok_or_else(|| kind_error(0))?;
                let Parameter::Register(destination) = destination else {
                    return Err(kind_error(parameters.len() - 1));
                };
                Ok(VMInstruction::OperateRegisters(operation, sources, *destination))
            }
        };
    }

    if let Some(condition) = mnemonic
        .strip_prefix('b')
        .and_then(|condition| Condition::from_str(condition).ok())
    {
        let Some((Parameter::Label(label), operands)) = parameters.split_last() else {
            return Err(if parameters.is_empty() {
                count_error(&[1])
            } else {
                kind_error(parameters.len() - 1)
            });
        };

        return if operands.is_empty() {
            Ok(VMInstruction::BranchIf(condition, label.clone()))
        } else {
            let operands = registers(operands).ok_or_else(|| kind_error(0))?;
            Ok(VMInstruction::BranchIfRegisters(condition, operands, label.clone()))
        };
    }

    let Some(mnemonic) = MNEMONICS.get(mnemonic) else {
        return Err((mnemonic, EditStatus::InvalidInstruction));
    };

    let instruction = match (mnemonic, parameters.as_slice()) {
        (Mnemonic::Branch, [Parameter::Label(label)]) => vm::branch(label.clone()),
        (Mnemonic::PushConstant, [Parameter::Integer(value)]) => vm::push_constant(*value),
        (Mnemonic::PushVariable, [Parameter::Slot(slot)]) => VMInstruction::PushVariable(*slot),
        (Mnemonic::PopVariable, [Parameter::Slot(slot)]) => VMInstruction::PopVariable(*slot),
        (Mnemonic::Input, []) => VMInstruction::Input,
        (Mnemonic::Input, [Parameter::Register(register)]) => VMInstruction::InputRegister(*register),
        (Mnemonic::Print, []) => VMInstruction::Print,
        (Mnemonic::Print, [Parameter::Register(register)]) => VMInstruction::PrintRegister(*register),
        (Mnemonic::Drop, []) => VMInstruction::Drop,
        (Mnemonic::Return, []) => vm::vm_return(),
        (Mnemonic::Return, [Parameter::Register(register)]) => {
            VMInstruction::ReturnRegister(*register)
        }
        (Mnemonic::Call, [Parameter::Name(callee), Parameter::Integer(count)]) => {
            let count = usize::try_from(*count).map_err(|_| kind_error(1))?;
            vm::call(callee.as_str(), count)
        }
        (
            Mnemonic::Call,
            [Parameter::Name(callee), Parameter::Register(first_argument), Parameter::Integer(count), Parameter::Register(destination)],
        ) => {
            let count = usize::try_from(*count).map_err(|_| kind_error(2))?;
            VMInstruction::CallRegisters(callee.clone(), *first_argument, count, *destination)
        }
        (Mnemonic::Move, [source, destination]) => vm::mov(
            operand(source).ok_or_else(|| kind_error(0))?,
            operand(destination).ok_or_else(|| kind_error(1))?,
        ),

        // wrong number of parameters
        (Mnemonic::Drop, _) => return Err(count_error(&[0])),
        (Mnemonic::Input | Mnemonic::Print | Mnemonic::Return, _) => {
            return Err(count_error(&[0, 1]))
        }
        (Mnemonic::Branch | Mnemonic::PushConstant | Mnemonic::PushVariable | Mnemonic::PopVariable, p)
            if p.len() != 1 =>
        {
            return Err(count_error(&[1]))
        }
        (Mnemonic::Move, _) => return Err(count_error(&[2])),
        (Mnemonic::Call, p) if p.len() != 2 && p.len() != 4 => return Err(count_error(&[2, 4])),

        // right number, wrong kind
        _ => return Err(kind_error(0)),
    };

    Ok(instruction)
}

fn registers(parameters: &[Parameter]) -> Option<Vec<Register>> {
    parameters
        .iter()
        .map(|parameter| match parameter {
            Parameter::Register(register) => Some(*register),
            _ => None,
        })
        .collect()
}

fn operand(parameter: &Parameter) -> Option<Operand> {
    match parameter {
        Parameter::Integer(value) => Some(Operand::Literal(*value)),
        Parameter::Slot(slot) => Some(Operand::Variable(*slot)),
        Parameter::Register(register) => Some(Operand::Register(*register)),
        Parameter::Label(_) | Parameter::Name(_) => None,
    }
}
