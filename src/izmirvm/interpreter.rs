//! Reference interpreter for specialized Izmir VM programs.
//!
//! A single operand stack is shared by all frames; each frame owns its
//! variable slots and registers. Values are 64-bit integers and arithmetic
//! wraps on overflow.

use std::io::{BufRead, Write};

use tracing::trace;

use crate::codegen::vm::{Condition, Operation, Value};

use super::{
    error::RuntimeError,
    routine::{Destination, ExecutableProgram, ExecutableRoutine, Instruction, Pc, Source},
};

/// Where a returning routine delivers its result in the caller's frame.
#[derive(Debug, Clone, Copy)]
enum ReturnTarget {
    Stack,
    Register(usize),
}

#[derive(Debug)]
struct Frame {
    routine: usize,
    pc: Pc,
    slots: Vec<Value>,
    registers: Vec<Value>,
    return_target: ReturnTarget,
}

impl Frame {
    fn new(routine: usize, definition: &ExecutableRoutine, return_target: ReturnTarget) -> Self {
        Self {
            routine,
            pc: 0,
            slots: vec![0; definition.slot_count],
            registers: vec![0; definition.register_count],
            return_target,
        }
    }
}

/// Run `program` to completion, reading `input` values from `input`
/// and printing to `output`.
pub fn run<I, W>(program: &ExecutableProgram, input: I, output: &mut W) -> Result<(), RuntimeError>
where
    I: IntoIterator<Item = Value>,
    W: Write,
{
    run_with_input(program, input.into_iter().map(Ok), output)
}

/// Like [`run`], for an input source that can fail; the first failure
/// read by the program stops it.
pub fn run_with_input<I, W>(
    program: &ExecutableProgram,
    input: I,
    output: &mut W,
) -> Result<(), RuntimeError>
where
    I: IntoIterator<Item = Result<Value, RuntimeError>>,
    W: Write,
{
    Machine {
        program,
        input: input.into_iter(),
        output,
        stack: Vec::new(),
        frames: Vec::new(),
    }
    .execute()
}

struct Machine<'p, 'w, I, W> {
    program: &'p ExecutableProgram,
    input: I,
    output: &'w mut W,
    stack: Vec<Value>,
    frames: Vec<Frame>,
}

/// Outcome of a single instruction.
enum Step {
    Continue,
    Halt,
}

impl<I, W> Machine<'_, '_, I, W>
where
    I: Iterator<Item = Result<Value, RuntimeError>>,
    W: Write,
{
    fn execute(mut self) -> Result<(), RuntimeError> {
        let main = self.program.main;
        self.frames.push(Frame::new(
            main,
            &self.program.routines[main],
            ReturnTarget::Stack,
        ));

        while let Step::Continue = self.step()? {}

        self.output.flush()?;
        Ok(())
    }

    fn step(&mut self) -> Result<Step, RuntimeError> {
        let program = self.program;
        let Some(frame) = self.frames.last_mut() else {
            return Ok(Step::Halt);
        };

        let routine = &program.routines[frame.routine];
        let Some(instruction) = routine.code.get(frame.pc) else {
            // running off the end of main halts, of a procedure is an error
            if frame.routine == program.main {
                return Ok(Step::Halt);
            }
            return Err(RuntimeError::MissingReturn {
                routine: routine.name.to_string(),
            });
        };
        frame.pc += 1;

        match instruction {
            Instruction::PushConstant(value) => self.stack.push(*value),
            Instruction::PushVariable(slot) => {
                let value = self.frame().slots[*slot];
                self.stack.push(value);
            }
            Instruction::PopVariable(slot) => {
                let value = self.pop()?;
                self.frame_mut().slots[*slot] = value;
            }
            Instruction::Operate(operation) => {
                let operands = self.pop_many(operation.arity())?;
                let value = self.apply(*operation, &operands)?;
                self.stack.push(value);
            }
            Instruction::Input => {
                let value = self.read()?;
                self.stack.push(value);
            }
            Instruction::Print => {
                let value = self.pop()?;
                self.print(value)?;
            }
            Instruction::Drop => {
                self.pop()?;
            }
            Instruction::Branch(target) => self.frame_mut().pc = *target,
            Instruction::BranchIf(condition, target) => {
                let operands = self.pop_many(condition.arity())?;
                if holds(*condition, &operands) {
                    self.frame_mut().pc = *target;
                }
            }
            Instruction::Call {
                routine,
                argument_count,
            } => {
                let arguments = self.pop_many(*argument_count)?;
                self.call(*routine, &arguments, ReturnTarget::Stack);
            }
            Instruction::Return => {
                let value = self.pop()?;
                return Ok(self.r#return(value));
            }

            Instruction::Move(source, destination) => {
                let value = match source {
                    Source::Literal(value) => *value,
                    Source::Slot(slot) => self.frame().slots[*slot],
                    Source::Register(register) => self.frame().registers[*register],
                };
                let frame = self.frame_mut();
                match destination {
                    Destination::Slot(slot) => frame.slots[*slot] = value,
                    Destination::Register(register) => frame.registers[*register] = value,
                }
            }
            Instruction::OperateRegisters(operation, sources, destination) => {
                let operands = self.read_registers(sources);
                let value = self.apply(*operation, &operands)?;
                self.frame_mut().registers[*destination] = value;
            }
            Instruction::InputRegister(register) => {
                let value = self.read()?;
                self.frame_mut().registers[*register] = value;
            }
            Instruction::PrintRegister(register) => {
                let value = self.frame().registers[*register];
                self.print(value)?;
            }
            Instruction::BranchIfRegisters(condition, registers, target) => {
                let operands = self.read_registers(registers);
                if holds(*condition, &operands) {
                    self.frame_mut().pc = *target;
                }
            }
            Instruction::CallRegisters {
                routine,
                first_argument,
                argument_count,
                destination,
            } => {
                let arguments =
                    self.frame().registers[*first_argument..first_argument + argument_count].to_vec();
                self.call(*routine, &arguments, ReturnTarget::Register(*destination));
            }
            Instruction::ReturnRegister(register) => {
                let value = self.frame().registers[*register];
                return Ok(self.r#return(value));
            }
        }

        Ok(Step::Continue)
    }

    fn call(&mut self, routine: usize, arguments: &[Value], return_target: ReturnTarget) {
        let definition = &self.program.routines[routine];
        debug_assert_eq!(arguments.len(), definition.arity, "arity is checked on specialization");
        trace!(callee = %definition.name, ?arguments, "call");

        let mut frame = Frame::new(routine, definition, return_target);
        frame.slots[..arguments.len()].copy_from_slice(arguments);
        self.frames.push(frame);
    }

    /// Leave the current frame, handing `value` to the caller.
    /// Returning from main halts the program.
    fn r#return(&mut self, value: Value) -> Step {
        let Some(frame) = self.frames.pop() else {
            return Step::Halt;
        };

        let Some(caller) = self.frames.last_mut() else {
            return Step::Halt;
        };

        match frame.return_target {
            ReturnTarget::Stack => self.stack.push(value),
            ReturnTarget::Register(register) => caller.registers[register] = value,
        }

        Step::Continue
    }

    fn apply(&self, operation: Operation, operands: &[Value]) -> Result<Value, RuntimeError> {
        let value = match (operation, operands) {
            (Operation::UnaryMinus, &[value]) => value.wrapping_neg(),
            (Operation::Not, &[value]) => Value::from(value == 0),
            (Operation::IsNonzero, &[value]) => Value::from(value != 0),
            (Operation::Plus, &[left, right]) => left.wrapping_add(right),
            (Operation::Minus, &[left, right]) => left.wrapping_sub(right),
            (Operation::Times, &[left, right]) => left.wrapping_mul(right),
            (Operation::Divided | Operation::Remainder, &[_, 0]) => {
                return Err(RuntimeError::DivisionByZero {
                    routine: self.routine_name(),
                })
            }
            (Operation::Divided, &[left, right]) => left.wrapping_div(right),
            (Operation::Remainder, &[left, right]) => left.wrapping_rem(right),
            (Operation::Equal, &[left, right]) => Value::from(left == right),
            (Operation::Different, &[left, right]) => Value::from(left != right),
            (Operation::Less, &[left, right]) => Value::from(left < right),
            (Operation::LessOrEqual, &[left, right]) => Value::from(left <= right),
            (Operation::Greater, &[left, right]) => Value::from(left > right),
            (Operation::GreaterOrEqual, &[left, right]) => Value::from(left >= right),
            _ => unreachable!("operand count is checked against the operation's arity"),
        };

        Ok(value)
    }

    fn read(&mut self) -> Result<Value, RuntimeError> {
        self.input.next().unwrap_or(Err(RuntimeError::InputExhausted))
    }

    fn print(&mut self, value: Value) -> Result<(), RuntimeError> {
        writeln!(self.output, "{value}")?;
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack.pop().ok_or_else(|| RuntimeError::StackUnderflow {
            routine: self.routine_name(),
        })
    }

    /// Pop `count` values, returned in the order they were pushed.
    fn pop_many(&mut self, count: usize) -> Result<Vec<Value>, RuntimeError> {
        if self.stack.len() < count {
            return Err(RuntimeError::StackUnderflow {
                routine: self.routine_name(),
            });
        }

        Ok(self.stack.split_off(self.stack.len() - count))
    }

    fn read_registers(&self, registers: &[usize]) -> Vec<Value> {
        let frame = self.frame();
        registers
            .iter()
            .map(|register| frame.registers[*register])
            .collect()
    }

    fn routine_name(&self) -> String {
        self.frames
            .last()
            .map(|frame| self.program.routines[frame.routine].name.to_string())
            .unwrap_or_default()
    }

    fn frame(&self) -> &Frame {
        self.frames
            .last()
            .expect("an instruction is only executed inside a frame")
    }

    fn frame_mut(&mut self) -> &mut Frame {
        self.frames
            .last_mut()
            .expect("an instruction is only executed inside a frame")
    }
}

/// Integers read from `reader`, one per line. Blank lines are skipped.
pub fn read_values<R: BufRead>(reader: R) -> impl Iterator<Item = Result<Value, RuntimeError>> {
    reader.lines().filter_map(|line| match line {
        Err(error) => Some(Err(RuntimeError::Input(error))),
        Ok(line) => {
            let line = line.trim();
            (!line.is_empty()).then(|| {
                line.parse::<Value>().map_err(|_| RuntimeError::InvalidInput {
                    line: line.to_owned(),
                })
            })
        }
    })
}

fn holds(condition: Condition, operands: &[Value]) -> bool {
    match (condition, operands) {
        (Condition::Zero, &[value]) => value == 0,
        (Condition::Nonzero, &[value]) => value != 0,
        (Condition::Equal, &[left, right]) => left == right,
        (Condition::Different, &[left, right]) => left != right,
        (Condition::Less, &[left, right]) => left < right,
        (Condition::LessOrEqual, &[left, right]) => left <= right,
        (Condition::Greater, &[left, right]) => left > right,
        (Condition::GreaterOrEqual, &[left, right]) => left >= right,
        _ => unreachable!("operand count is checked against the condition's arity"),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        codegen::vm::{self, Label, Operand, Register, Slot, VMInstruction},
        izmirvm::{
            reader,
            routine::{MutableProgram, MutableRoutine, RoutineName},
        },
    };

    use super::*;

    fn execute(
        procedures: Vec<MutableRoutine>,
        main: MutableRoutine,
        input: Vec<Value>,
    ) -> Result<String, RuntimeError> {
        let program = MutableProgram::new(String::from("test"), procedures, main)
            .specialize()
            .expect("should specialize");

        let mut output = Vec::new();
        run(&program, input, &mut output)?;

        Ok(String::from_utf8(output).expect("output should be valid UTF-8"))
    }

    fn main_of(instructions: Vec<VMInstruction>) -> MutableRoutine {
        let mut main = MutableRoutine::main();
        main.append(instructions);
        main
    }

    #[test]
    fn test_stack_arithmetic() {
        let main = main_of(vec![
            vm::push_constant(7),
            vm::push_constant(2),
            VMInstruction::Operate(Operation::Minus),
            VMInstruction::Print,
            vm::push_constant(-7),
            vm::push_constant(2),
            VMInstruction::Operate(Operation::Remainder),
            VMInstruction::Print,
            vm::push_constant(Value::MAX),
            vm::push_constant(1),
            VMInstruction::Operate(Operation::Plus),
            VMInstruction::Print,
        ]);

        assert_eq!(
            execute(vec![], main, vec![]).expect("should run"),
            format!("5\n-1\n{}\n", Value::MIN)
        );
    }

    #[test]
    fn test_input_and_branches() {
        let done = Label(String::from("done"));
        // print the input unless it is below 10
        let main = main_of(vec![
            VMInstruction::Input,
            VMInstruction::PopVariable(Slot(0)),
            VMInstruction::PushVariable(Slot(0)),
            vm::push_constant(10),
            VMInstruction::BranchIf(Condition::Less, done.clone()),
            VMInstruction::PushVariable(Slot(0)),
            VMInstruction::Print,
            vm::label(done),
        ]);

        assert_eq!(execute(vec![], main.clone(), vec![3]).expect("should run"), "");
        assert_eq!(execute(vec![], main, vec![12]).expect("should run"), "12\n");
    }

    #[test]
    fn test_register_call() {
        // double(x) = x + x
        let mut double = MutableRoutine::new(RoutineName::Procedure(String::from("double")), 1);
        double.append([
            vm::mov(Operand::Variable(Slot(0)), Operand::Register(Register(0))),
            VMInstruction::OperateRegisters(
                Operation::Plus,
                vec![Register(0), Register(0)],
                Register(1),
            ),
            VMInstruction::ReturnRegister(Register(1)),
        ]);

        let main = main_of(vec![
            vm::mov(Operand::Literal(21), Operand::Register(Register(1))),
            VMInstruction::CallRegisters(String::from("double"), Register(1), 1, Register(0)),
            VMInstruction::PrintRegister(Register(0)),
        ]);

        assert_eq!(execute(vec![double], main, vec![]).expect("should run"), "42\n");
    }

    #[test]
    fn test_register_call_without_arguments() {
        let listing = "
            .procedure f 0
                mov 1, %r0
                return %r0
            .main
                call f, %r7, 0, %r0
                print %r0
        ";
        let program = reader::read_program("listing", listing)
            .expect("should read")
            .specialize()
            .expect("should specialize");

        let mut output = Vec::new();
        run(&program, Vec::new(), &mut output).expect("should run");

        assert_eq!(String::from_utf8(output).expect("output should be valid UTF-8"), "1\n");
    }

    #[test]
    fn test_input_lines() {
        let main = main_of(vec![
            VMInstruction::Input,
            VMInstruction::Print,
            VMInstruction::Input,
            VMInstruction::Print,
        ]);
        let program = MutableProgram::new(String::from("test"), vec![], main)
            .specialize()
            .expect("should specialize");

        let mut output = Vec::new();
        run_with_input(&program, read_values(&b" 4\n\n-2\n"[..]), &mut output)
            .expect("should run");
        assert_eq!(output, b"4\n-2\n");

        // a malformed line stops the program instead of being skipped
        let mut output = Vec::new();
        let result = run_with_input(&program, read_values(&b"4\nfive\n6\n"[..]), &mut output);
        assert!(matches!(
            result,
            Err(RuntimeError::InvalidInput { line }) if line == "five"
        ));
        assert_eq!(output, b"4\n");
    }

    #[test]
    fn test_return_from_main_halts() {
        let main = main_of(vec![
            vm::push_constant(1),
            VMInstruction::Print,
            vm::push_constant(0),
            vm::vm_return(),
            vm::push_constant(2),
            VMInstruction::Print,
        ]);

        assert_eq!(execute(vec![], main, vec![]).expect("should run"), "1\n");
    }

    #[test]
    fn test_runtime_errors() {
        let main = main_of(vec![
            vm::push_constant(1),
            vm::push_constant(0),
            VMInstruction::Operate(Operation::Divided),
        ]);
        assert!(matches!(
            execute(vec![], main, vec![]),
            Err(RuntimeError::DivisionByZero { .. })
        ));

        let main = main_of(vec![VMInstruction::Input]);
        assert!(matches!(
            execute(vec![], main, vec![]),
            Err(RuntimeError::InputExhausted)
        ));

        let main = main_of(vec![VMInstruction::Print]);
        assert!(matches!(
            execute(vec![], main, vec![]),
            Err(RuntimeError::StackUnderflow { .. })
        ));

        let silent = MutableRoutine::new(RoutineName::Procedure(String::from("silent")), 0);
        let main = main_of(vec![vm::call("silent", 0), VMInstruction::Drop]);
        assert!(matches!(
            execute(vec![silent], main, vec![]),
            Err(RuntimeError::MissingReturn { .. })
        ));
    }
}
