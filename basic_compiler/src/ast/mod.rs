//! Abstract syntax tree.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. The
//! parent link is a plain index, so re-parenting a node is a matter of
//! rewriting two child lists.
mod symbol;

pub use self::symbol::{linear_offset, strides, VarId, Variable, MAX_FRAME_SIZE, WORD_SIZE};

use crate::{
    error::{CompileError, CompileResult},
    tokens::Operator,
    types::ValueType,
};
use smol_str::SmolStr;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// BASIC line number of the statement the node was parsed from.
    pub line_number: u32,
}

/// Node specific data.
///
/// Children layout per kind:
///
/// - `Assign`: `[Variable, expression]`
/// - `Variable`: index expressions, one per dimension
/// - `Operator`: `[lhs, rhs]`
/// - `For`: `[Assign, limit, step, SubRoutine]`
/// - `If`: `[comparator Operator, SubRoutine, optional SubRoutine]`
/// - `Print`, `Read`: `[format Literal, arguments...]`
/// - `Println`: `[format Literal, optional Variable]`
#[derive(Debug, Clone)]
pub enum NodeKind {
    Program(Scope),
    SubRoutine(Scope),
    Assign,
    /// Reference to a declared variable.
    Variable(VarId),
    Literal(Literal),
    Operator(OperatorNode),
    For,
    If,
    GoTo { target: u32 },
    Print,
    Println,
    Read,
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Program(_) => "program",
            NodeKind::SubRoutine(_) => "subroutine",
            NodeKind::Assign => "assign",
            NodeKind::Variable(_) => "variable",
            NodeKind::Literal(_) => "literal",
            NodeKind::Operator(_) => "operator",
            NodeKind::For => "for",
            NodeKind::If => "if",
            NodeKind::GoTo { .. } => "goto",
            NodeKind::Print => "print",
            NodeKind::Println => "println",
            NodeKind::Read => "read",
        }
    }
}

/// Variable table of a scope bearing node.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    /// Declarations in insertion order.
    vars: Vec<VarId>,
}

impl Scope {
    #[inline]
    pub fn vars(&self) -> &[VarId] {
        &self.vars
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    /// Source text. Strings keep their quotes, negative numbers their sign.
    pub text: SmolStr,
    pub ty: ValueType,
    /// Data section label, for strings only.
    pub label: Option<SmolStr>,
}

impl Literal {
    /// Characters between the quotes of a string literal.
    pub fn content(&self) -> &str {
        self.text
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperatorNode {
    pub operator: Operator,
    /// Filled in once both operands are known.
    pub ty: Option<ValueType>,
}

/// Arena of nodes and variable declarations.
#[derive(Debug, Clone)]
pub struct Ast {
    nodes: Vec<Node>,
    vars: Vec<Variable>,
    /// String literals that were assigned a data label, in label order.
    strings: Vec<NodeId>,
}

impl Ast {
    /// Creates a tree with an empty program as root.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Program(Scope::default()),
                parent: None,
                children: vec![],
                line_number: 0,
            }],
            vars: vec![],
            strings: vec![],
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    #[inline]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    #[inline]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Number of nodes in the arena.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate a detached node.
    pub fn add_node(&mut self, kind: NodeKind, line_number: u32) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            parent: None,
            children: vec![],
            line_number,
        });
        id
    }

    /// Append a detached node to the end of the parent's children.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(self.parent(child).is_none(), "node {child} already has a parent");
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children.push(child);
    }

    /// Insert a new parent between a node and its current parent.
    ///
    /// The new parent takes the node's position in the old parent's
    /// children, and the node becomes the new parent's last child.
    pub fn split_parent(&mut self, node: NodeId, new_parent: NodeId) {
        debug_assert!(self.parent(new_parent).is_none(), "node {new_parent} already has a parent");

        if let Some(old_parent) = self.parent(node) {
            let children = &mut self.node_mut(old_parent).children;
            if let Some(slot) = children.iter_mut().find(|id| **id == node) {
                *slot = new_parent;
            }
            self.node_mut(new_parent).parent = Some(old_parent);
            self.node_mut(node).parent = None;
        }

        self.add_child(new_parent, node);
    }

    /// Variable table of a `Program` or `SubRoutine` node.
    pub fn scope(&self, id: NodeId) -> Option<&Scope> {
        match self.kind(id) {
            NodeKind::Program(scope) | NodeKind::SubRoutine(scope) => Some(scope),
            _ => None,
        }
    }

    /// Register a declaration in the variable table of its scope.
    ///
    /// The variable's scope must be a scope bearing node.
    pub fn declare(&mut self, variable: Variable) -> CompileResult<VarId> {
        let id = VarId(self.vars.len() as u32);

        match &mut self.nodes[variable.scope.index()].kind {
            NodeKind::Program(scope) | NodeKind::SubRoutine(scope) => scope.vars.push(id),
            kind => {
                return Err(CompileError::semantic(format!(
                    "{} node can't own variable {}",
                    kind.name(),
                    variable.name
                )))
            }
        }
        self.vars.push(variable);

        Ok(id)
    }

    /// Find a declaration by name in exactly one scope.
    pub fn lookup(&self, scope: NodeId, name: &str) -> Option<VarId> {
        self.scope(scope)?
            .vars
            .iter()
            .copied()
            .find(|id| self.variable(*id).name == name)
    }

    #[inline]
    pub fn variable(&self, id: VarId) -> &Variable {
        &self.vars[id.index()]
    }

    #[inline]
    pub fn variable_mut(&mut self, id: VarId) -> &mut Variable {
        &mut self.vars[id.index()]
    }

    /// Every declaration in the program, in declaration order.
    pub fn variables(&self) -> impl Iterator<Item = (VarId, &Variable)> {
        self.vars
            .iter()
            .enumerate()
            .map(|(i, var)| (VarId(i as u32), var))
    }

    /// Assign the next data section label to a string literal node.
    pub fn register_string(&mut self, id: NodeId) -> SmolStr {
        let label = SmolStr::new(format!("LC{}", self.strings.len()));
        if let NodeKind::Literal(literal) = &mut self.node_mut(id).kind {
            literal.label = Some(label.clone());
        }
        self.strings.push(id);
        label
    }

    /// Registered string literals, in label order.
    pub fn strings(&self) -> impl Iterator<Item = &Literal> {
        self.strings.iter().filter_map(|id| match self.kind(*id) {
            NodeKind::Literal(literal) => Some(literal),
            _ => None,
        })
    }

    /// Type of an expression node.
    ///
    /// Returns `None` for statements, and for expressions whose type
    /// is not known yet.
    pub fn expr_type(&self, id: NodeId) -> Option<ValueType> {
        match self.kind(id) {
            NodeKind::Literal(literal) => Some(literal.ty),
            NodeKind::Variable(var) => self.variable(*var).ty,
            NodeKind::Operator(op) => op.ty,
            _ => None,
        }
    }
}

impl Default for Ast {
    fn default() -> Self {
        Self::new()
    }
}
