use std::collections::HashMap;

use super::{backend::Discipline, config::CompilationConfig, vm};

// region: Context

/// Context information regarding the routine being compiled
/// (a procedure or the main statement).
#[derive(Debug)]
pub struct RoutineContext<D: Discipline> {
    pub routine_name: String,
    pub discipline: D,
    pub scope: Scope,
    pub optimization_rewriting: bool,
    label_count: usize,
}

impl<D: Discipline> RoutineContext<D> {
    pub fn new(routine_name: String, config: &CompilationConfig) -> Self {
        Self {
            routine_name,
            discipline: D::default(),
            scope: Scope::new(),
            optimization_rewriting: config.optimization_rewriting,
            label_count: 0,
        }
    }

    /// Create a label unique within the routine.
    pub fn create_label(&mut self, name: &str) -> vm::Label {
        let label = vm::Label(format!("{name}_{}", self.label_count));
        self.label_count += 1;

        label
    }
}

// endregion

// region: Scope

/// Variable bindings of a routine.
///
/// The first frame holds the formals (and names used without being
/// declared); every block pushes a frame binding its own variable.
#[derive(Debug)]
pub struct Scope {
    frames: Vec<ScopeFrame>,
    slot_count: usize,
}

type Name = String;

impl Scope {
    pub fn new() -> Self {
        Self {
            // initialize with the routine-level frame
            frames: vec![ScopeFrame::new()],
            slot_count: 0,
        }
    }

    /// Bind a formal parameter; formals take the first slots, in order.
    pub fn add_formal(&mut self, name: &str) -> vm::Slot {
        let slot = self.fresh_slot();
        self.first_mut_frame().variables.insert(name.to_owned(), slot);

        slot
    }

    /// Bind a block variable to a fresh slot, shadowing
    /// any outer variable with the same name.
    ///
    /// This is performed when entering a block.
    pub fn enter_block(&mut self, name: &str) -> vm::Slot {
        let slot = self.fresh_slot();

        let mut frame = ScopeFrame::new();
        frame.variables.insert(name.to_owned(), slot);
        self.frames.push(frame);

        slot
    }

    /// Drop the binding introduced by the innermost block,
    /// making shadowed variables visible again.
    pub fn leave_block(&mut self) {
        debug_assert!(self.frames.len() > 1, "no block to leave");

        self.frames.pop();
    }

    /// Search through the scope frames for a variable with a given name,
    /// innermost first.
    pub fn search_variable(&self, name: &str) -> Option<vm::Slot> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.variables.get(name))
            .copied()
    }

    /// Find the slot of a variable; names which are not bound anywhere get
    /// a fresh routine-level slot on their first use.
    pub fn resolve(&mut self, name: &str) -> vm::Slot {
        if let Some(slot) = self.search_variable(name) {
            return slot;
        }

        let slot = self.fresh_slot();
        self.first_mut_frame().variables.insert(name.to_owned(), slot);

        slot
    }

    /// Number of slots the routine's frame needs.
    pub const fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Slots are never reused within a routine, so a binding
    /// can outlive the block it was first seen in.
    fn fresh_slot(&mut self) -> vm::Slot {
        let slot = vm::Slot(self.slot_count);
        self.slot_count += 1;

        slot
    }

    /// Returns the mutable first (routine-level) scope frame.
    fn first_mut_frame(&mut self) -> &mut ScopeFrame {
        self.frames
            .first_mut()
            .expect("scope should at least have the routine-level frame")
    }
}

#[derive(Debug)]
struct ScopeFrame {
    variables: HashMap<Name, vm::Slot>,
}

impl ScopeFrame {
    fn new() -> Self {
        Self {
            variables: HashMap::new(),
        }
    }
}

// endregion
