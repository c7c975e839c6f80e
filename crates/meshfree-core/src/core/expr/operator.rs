use super::error::EvalError;
use super::node::Expression;
use crate::core::math::tensor::{Comparison, Tensor};
use phf::{Map, phf_map};
use rand::Rng;

/// Function names accepted by [`Operator::function`], with the kind they build.
pub static FUNCTIONS: Map<&'static str, OperatorKind> = phf_map! {
    "sin" => OperatorKind::Sin,
    "cos" => OperatorKind::Cos,
    "tan" => OperatorKind::Tan,
    "asin" => OperatorKind::Asin,
    "acos" => OperatorKind::Acos,
    "atan" => OperatorKind::Atan,
    "sinh" => OperatorKind::Sinh,
    "cosh" => OperatorKind::Cosh,
    "tanh" => OperatorKind::Tanh,
    "exp" => OperatorKind::Exp,
    "log" => OperatorKind::Log,
    "sqrt" => OperatorKind::Sqrt,
    "abs" => OperatorKind::Abs,
    "sign" => OperatorKind::Sign,
    "floor" => OperatorKind::Floor,
    "ceil" => OperatorKind::Ceil,
    "heaviside" => OperatorKind::Heaviside,
    "min" => OperatorKind::Min,
    "max" => OperatorKind::Max,
    "mod" => OperatorKind::Mod,
    "atan2" => OperatorKind::Atan2,
    "pow" => OperatorKind::Power,
    "product" => OperatorKind::TermProduct,
    "if" => OperatorKind::If,
    "rand" => OperatorKind::Rand,
    "transpose" => OperatorKind::Transpose,
    "trace" => OperatorKind::Trace,
    "det" => OperatorKind::Det,
    "inv" => OperatorKind::Inv,
    "norm" => OperatorKind::Norm,
    "identity" => OperatorKind::Identity,
    "zeros" => OperatorKind::Zeros,
    "component" => OperatorKind::Component,
};

/// How an operator is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notation {
    /// `-a`
    Prefix(&'static str),
    /// `a + b`, with a binding strength used to place parentheses.
    Infix(&'static str, u8),
    /// `name(a, b)`
    Call(&'static str),
}

/// The closed set of arithmetic operators and functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    TermProduct,
    Plus,
    Negate,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
    And,
    Or,
    Not,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Log,
    Sqrt,
    Abs,
    Sign,
    Floor,
    Ceil,
    Heaviside,
    Min,
    Max,
    Mod,
    Atan2,
    If,
    Rand,
    Transpose,
    Trace,
    Det,
    Inv,
    Norm,
    Identity,
    Zeros,
    Component,
}

impl OperatorKind {
    pub fn arity(self) -> usize {
        use OperatorKind::*;
        match self {
            Plus | Negate | Not | Sin | Cos | Tan | Asin | Acos | Atan | Sinh | Cosh | Tanh
            | Exp | Log | Sqrt | Abs | Sign | Floor | Ceil | Heaviside | Transpose | Trace
            | Det | Inv | Norm | Identity => 1,
            If => 3,
            _ => 2,
        }
    }

    pub fn notation(self) -> Notation {
        use OperatorKind::*;
        match self {
            Or => Notation::Infix("||", 1),
            And => Notation::Infix("&&", 2),
            Less => Notation::Infix("<", 3),
            Greater => Notation::Infix(">", 3),
            LessEqual => Notation::Infix("<=", 3),
            GreaterEqual => Notation::Infix(">=", 3),
            Equal => Notation::Infix("==", 3),
            NotEqual => Notation::Infix("!=", 3),
            Add => Notation::Infix("+", 4),
            Subtract => Notation::Infix("-", 4),
            Multiply => Notation::Infix("*", 5),
            Divide => Notation::Infix("/", 5),
            TermProduct => Notation::Infix(".*", 5),
            Power => Notation::Infix("^", 7),
            Plus => Notation::Prefix("+"),
            Negate => Notation::Prefix("-"),
            Not => Notation::Prefix("!"),
            other => Notation::Call(other.name()),
        }
    }

    /// The catalogue name of a function, or the symbol of an infix/prefix operator.
    pub fn name(self) -> &'static str {
        use OperatorKind::*;
        match self {
            Add | Plus => "+",
            Subtract | Negate => "-",
            Multiply => "*",
            Divide => "/",
            Power => "^",
            TermProduct => ".*",
            Less => "<",
            Greater => ">",
            LessEqual => "<=",
            GreaterEqual => ">=",
            Equal => "==",
            NotEqual => "!=",
            And => "&&",
            Or => "||",
            Not => "!",
            Sin => "sin",
            Cos => "cos",
            Tan => "tan",
            Asin => "asin",
            Acos => "acos",
            Atan => "atan",
            Sinh => "sinh",
            Cosh => "cosh",
            Tanh => "tanh",
            Exp => "exp",
            Log => "log",
            Sqrt => "sqrt",
            Abs => "abs",
            Sign => "sign",
            Floor => "floor",
            Ceil => "ceil",
            Heaviside => "heaviside",
            Min => "min",
            Max => "max",
            Mod => "mod",
            Atan2 => "atan2",
            If => "if",
            Rand => "rand",
            Transpose => "transpose",
            Trace => "trace",
            Det => "det",
            Inv => "inv",
            Norm => "norm",
            Identity => "identity",
            Zeros => "zeros",
            Component => "component",
        }
    }

    /// Applies the operator to already evaluated operands.
    ///
    /// `If` is evaluated lazily by the expression node and only reaches this
    /// method when its operands were computed eagerly.
    pub fn apply(self, args: &[Tensor]) -> Result<Tensor, EvalError> {
        use OperatorKind::*;
        if args.len() != self.arity() {
            return Err(EvalError::Arity {
                name: self.name().to_string(),
                expected: self.arity(),
                found: args.len(),
            });
        }
        let value = match self {
            Add => args[0].try_add(&args[1])?,
            Subtract => args[0].try_sub(&args[1])?,
            Multiply => args[0].try_mul(&args[1])?,
            Divide => args[0].try_div(&args[1])?,
            Power => args[0].try_pow(&args[1])?,
            TermProduct => args[0].term_product(&args[1])?,
            Plus => args[0].clone(),
            Negate => -&args[0],
            Less => args[0].compare(&args[1], Comparison::Less)?,
            Greater => args[0].compare(&args[1], Comparison::Greater)?,
            LessEqual => args[0].compare(&args[1], Comparison::LessEqual)?,
            GreaterEqual => args[0].compare(&args[1], Comparison::GreaterEqual)?,
            Equal => args[0].compare(&args[1], Comparison::Equal)?,
            NotEqual => args[0].compare(&args[1], Comparison::NotEqual)?,
            And => args[0].and(&args[1])?,
            Or => args[0].or(&args[1])?,
            Not => args[0].not()?,
            Sin => args[0].map(f64::sin),
            Cos => args[0].map(f64::cos),
            Tan => args[0].map(f64::tan),
            Asin => args[0].map(f64::asin),
            Acos => args[0].map(f64::acos),
            Atan => args[0].map(f64::atan),
            Sinh => args[0].map(f64::sinh),
            Cosh => args[0].map(f64::cosh),
            Tanh => args[0].map(f64::tanh),
            Exp => args[0].map(f64::exp),
            Log => args[0].map(f64::ln),
            Sqrt => args[0].map(f64::sqrt),
            Abs => args[0].map(f64::abs),
            Sign => args[0].map(|x| if x == 0.0 { 0.0 } else { x.signum() }),
            Floor => args[0].map(f64::floor),
            Ceil => args[0].map(f64::ceil),
            Heaviside => args[0].map(|x| if x >= 0.0 { 1.0 } else { 0.0 }),
            Min => args[0].term_min(&args[1])?,
            Max => args[0].term_max(&args[1])?,
            Mod => args[0].term_mod(&args[1])?,
            Atan2 => args[0].term_atan2(&args[1])?,
            If => {
                if args[0].is_truthy()? {
                    args[1].clone()
                } else {
                    args[2].clone()
                }
            }
            Rand => {
                let low = args[0].value()?;
                let high = args[1].value()?;
                if !(low < high) {
                    return Err(EvalError::InvalidArgument {
                        name: self.name().to_string(),
                        reason: format!("empty range [{low}, {high})"),
                    });
                }
                Tensor::scalar(rand::rng().random_range(low..high))
            }
            Transpose => args[0].transpose(),
            Trace => args[0].trace()?,
            Det => args[0].determinant()?,
            Inv => args[0].inverse()?,
            Norm => Tensor::scalar(args[0].norm()),
            Identity => Tensor::identity(self.size_argument(&args[0])?),
            Zeros => Tensor::new(
                self.size_argument(&args[0])?,
                self.size_argument(&args[1])?,
            ),
            Component => {
                let index = self.size_argument(&args[1])?;
                Tensor::scalar(args[0].get(index)?)
            }
        };
        Ok(value)
    }

    fn size_argument(self, arg: &Tensor) -> Result<usize, EvalError> {
        let value = arg.value()?;
        if value < 0.0 || value.fract() != 0.0 || !value.is_finite() {
            return Err(EvalError::InvalidArgument {
                name: self.name().to_string(),
                reason: format!("expected a non-negative integer, found {value}"),
            });
        }
        Ok(value as usize)
    }
}

/// An operator node owning exactly `kind.arity()` operands.
#[derive(Debug, Clone, PartialEq)]
pub struct Operator {
    kind: OperatorKind,
    operands: Vec<Expression>,
}

impl Operator {
    /// Builds an operator, rejecting a wrong operand count.
    pub fn new(kind: OperatorKind, operands: Vec<Expression>) -> Result<Self, EvalError> {
        if operands.len() != kind.arity() {
            return Err(EvalError::Arity {
                name: kind.name().to_string(),
                expected: kind.arity(),
                found: operands.len(),
            });
        }
        Ok(Self { kind, operands })
    }

    /// Builds an operator whose operand count is known to match.
    pub(crate) fn from_parts(kind: OperatorKind, operands: Vec<Expression>) -> Self {
        debug_assert_eq!(operands.len(), kind.arity());
        Self { kind, operands }
    }

    /// Builds a catalogue function by name.
    pub fn function(name: &str, operands: Vec<Expression>) -> Result<Self, EvalError> {
        let kind = FUNCTIONS
            .get(name)
            .copied()
            .ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;
        Self::new(kind, operands)
    }

    pub fn kind(&self) -> OperatorKind {
        self.kind
    }

    pub fn operands(&self) -> &[Expression] {
        &self.operands
    }

    pub(crate) fn operands_mut(&mut self) -> &mut [Expression] {
        &mut self.operands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(value: f64) -> Tensor {
        Tensor::scalar(value)
    }

    #[test]
    fn every_catalogue_entry_names_itself() {
        for (name, kind) in FUNCTIONS.entries() {
            if *name == "pow" || *name == "product" {
                continue;
            }
            assert_eq!(kind.name(), *name);
        }
    }

    #[test]
    fn construction_rejects_wrong_arity() {
        let one = || Expression::constant(1.0);
        assert!(matches!(
            Operator::function("atan2", vec![one()]),
            Err(EvalError::Arity {
                expected: 2,
                found: 1,
                ..
            })
        ));
        assert!(matches!(
            Operator::function("if", vec![one(), one()]),
            Err(EvalError::Arity { expected: 3, .. })
        ));
        assert!(Operator::new(OperatorKind::Negate, vec![one()]).is_ok());
    }

    #[test]
    fn unknown_function_is_reported_by_name() {
        assert_eq!(
            Operator::function("gamma", vec![]),
            Err(EvalError::UnknownFunction("gamma".to_string()))
        );
    }

    #[test]
    fn apply_covers_elementwise_and_matrix_functions() {
        assert_eq!(OperatorKind::Sign.apply(&[s(-3.0)]).unwrap(), s(-1.0));
        assert_eq!(OperatorKind::Heaviside.apply(&[s(0.0)]).unwrap(), s(1.0));
        assert_eq!(OperatorKind::Max.apply(&[s(2.0), s(5.0)]).unwrap(), s(5.0));

        let identity = OperatorKind::Identity.apply(&[s(2.0)]).unwrap();
        assert_eq!(identity, Tensor::identity(2));
        assert_eq!(OperatorKind::Trace.apply(&[identity]).unwrap(), s(2.0));

        let zeros = OperatorKind::Zeros.apply(&[s(2.0), s(3.0)]).unwrap();
        assert_eq!(zeros.shape(), (2, 3));

        let v = Tensor::vector(&[3.0, 4.0]);
        assert_eq!(OperatorKind::Norm.apply(&[v.clone()]).unwrap(), s(5.0));
        assert_eq!(OperatorKind::Component.apply(&[v, s(1.0)]).unwrap(), s(4.0));
    }

    #[test]
    fn size_arguments_must_be_non_negative_integers() {
        assert!(matches!(
            OperatorKind::Identity.apply(&[s(1.5)]),
            Err(EvalError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn rand_stays_within_bounds() {
        for _ in 0..100 {
            let x = OperatorKind::Rand.apply(&[s(2.0), s(3.0)]).unwrap().value().unwrap();
            assert!((2.0..3.0).contains(&x));
        }
        assert!(OperatorKind::Rand.apply(&[s(1.0), s(1.0)]).is_err());
    }

    #[test]
    fn comparisons_require_scalars() {
        assert_eq!(OperatorKind::Less.apply(&[s(1.0), s(2.0)]).unwrap().value().unwrap(), 1.0);
        assert!(
            OperatorKind::Less
                .apply(&[Tensor::vector(&[1.0, 2.0]), s(2.0)])
                .is_err()
        );
    }
}
