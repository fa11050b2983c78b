//! Prédicats typés de sélection attributaire
//!
//! Remplace les clauses SQL construites par concaténation de chaînes :
//! les champs sont résolus une seule fois contre le schéma, puis le
//! prédicat est évalué directement sur les valeurs en mémoire, avec la
//! logique à trois valeurs de SQL (une comparaison avec NULL est inconnue
//! et une condition inconnue ne sélectionne jamais).

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::types::{Feature, FeatureLayer, Value};
use crate::LandcoverError;

/// Opérateur de comparaison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn test(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

/// Membre droit d'une comparaison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Field(String),
    Literal(Value),
}

/// Prédicat de sélection
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        field: String,
        op: CompareOp,
        operand: Operand,
    },
    In {
        field: String,
        values: HashSet<i64>,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// `field <op> value`
    pub fn cmp(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            field: field.into(),
            op,
            operand: Operand::Literal(value.into()),
        }
    }

    /// `left <op> right` entre deux champs
    pub fn cmp_fields(left: impl Into<String>, op: CompareOp, right: impl Into<String>) -> Self {
        Predicate::Compare {
            field: left.into(),
            op,
            operand: Operand::Field(right.into()),
        }
    }

    /// Appartenance d'un champ entier à un ensemble
    pub fn is_in(field: impl Into<String>, values: impl IntoIterator<Item = i64>) -> Self {
        Predicate::In {
            field: field.into(),
            values: values.into_iter().collect(),
        }
    }

    pub fn and(self, other: Predicate) -> Self {
        Predicate::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Predicate) -> Self {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Résout les champs contre le schéma de la couche
    pub fn compile(&self, layer: &FeatureLayer) -> Result<CompiledPredicate, LandcoverError> {
        Ok(CompiledPredicate {
            node: compile_node(self, layer)?,
        })
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

#[derive(Debug, Clone)]
enum Node {
    CompareLiteral(usize, CompareOp, Value),
    CompareField(usize, CompareOp, usize),
    In(usize, HashSet<i64>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Not(Box<Node>),
}

/// Prédicat dont les champs ont été résolus en index
#[derive(Debug, Clone)]
pub struct CompiledPredicate {
    node: Node,
}

impl CompiledPredicate {
    /// Vrai uniquement si le prédicat est vrai (inconnu => faux)
    pub fn matches(&self, feature: &Feature) -> bool {
        eval(&self.node, feature) == Some(true)
    }
}

fn compile_node(predicate: &Predicate, layer: &FeatureLayer) -> Result<Node, LandcoverError> {
    Ok(match predicate {
        Predicate::Compare {
            field,
            op,
            operand: Operand::Literal(value),
        } => Node::CompareLiteral(layer.field_index(field)?, *op, value.clone()),
        Predicate::Compare {
            field,
            op,
            operand: Operand::Field(other),
        } => Node::CompareField(layer.field_index(field)?, *op, layer.field_index(other)?),
        Predicate::In { field, values } => Node::In(layer.field_index(field)?, values.clone()),
        Predicate::And(a, b) => Node::And(
            Box::new(compile_node(a, layer)?),
            Box::new(compile_node(b, layer)?),
        ),
        Predicate::Or(a, b) => Node::Or(
            Box::new(compile_node(a, layer)?),
            Box::new(compile_node(b, layer)?),
        ),
        Predicate::Not(a) => Node::Not(Box::new(compile_node(a, layer)?)),
    })
}

fn eval(node: &Node, feature: &Feature) -> Option<bool> {
    match node {
        Node::CompareLiteral(index, op, value) => {
            compare(feature.value(*index), value).map(|o| op.test(o))
        }
        Node::CompareField(left, op, right) => {
            compare(feature.value(*left), feature.value(*right)).map(|o| op.test(o))
        }
        Node::In(index, values) => feature.value(*index).as_i64().map(|v| values.contains(&v)),
        Node::And(a, b) => match (eval(a, feature), eval(b, feature)) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        },
        Node::Or(a, b) => match (eval(a, feature), eval(b, feature)) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        },
        Node::Not(a) => eval(a, feature).map(|v| !v),
    }
}

/// Compare deux valeurs ; `None` si l'une est nulle ou si les types sont incompatibles
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}
