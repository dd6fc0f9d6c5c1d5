use serde::{Deserialize, Serialize};

/// Scalar transfer primitives available to evolved rules.
///
/// These are the only operations a computation graph node may reference.
/// Identifiers outside this set are rejected during graph validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    /// `1 / (1 + e^-x)`
    Sigmoid,
    /// `clamp(x, -2, 2)`
    Linear,
    /// `2 / (1 + e^-x) - 1`, a tanh equivalent.
    ScaledSigmoid,
}

impl Op {
    pub const ALL: [Self; 3] = [Self::Sigmoid, Self::Linear, Self::ScaledSigmoid];

    /// Resolve an evolved operation identifier, or `None` when it is not part
    /// of the library.
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        match identifier {
            "sigmoid" => Some(Self::Sigmoid),
            "linear" => Some(Self::Linear),
            "scaledSigmoid" => Some(Self::ScaledSigmoid),
            _ => None,
        }
    }

    /// Name under which generated code calls the primitive.
    pub fn identifier(self) -> &'static str {
        match self {
            Self::Sigmoid => "sigmoid",
            Self::Linear => "linear",
            Self::ScaledSigmoid => "scaledSigmoid",
        }
    }

    /// Host-side evaluation. Must agree with the emitted OpenCL bodies in
    /// [`primitive_definitions`].
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Self::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Self::Linear => x.clamp(-2.0, 2.0),
            Self::ScaledSigmoid => 2.0 / (1.0 + (-x).exp()) - 1.0,
        }
    }
}

/// OpenCL definitions for every library primitive, in a fixed order.
pub fn primitive_definitions() -> &'static str {
    "float sigmoid(float x) {\n\
     \treturn 1.0f / (1.0f + exp(-x));\n\
     }\n\
     \n\
     float linear(float x) {\n\
     \treturn min(2.0f, max(-2.0f, x));\n\
     }\n\
     \n\
     float scaledSigmoid(float x) {\n\
     \treturn 2.0f / (1.0f + exp(-x)) - 1.0f;\n\
     }"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_round_trip() {
        for op in Op::ALL {
            assert_eq!(Op::from_identifier(op.identifier()), Some(op));
        }
        assert_eq!(Op::from_identifier("sin"), None);
        assert_eq!(Op::from_identifier(""), None);
    }

    #[test]
    fn sigmoid_midpoint() {
        assert_eq!(Op::Sigmoid.apply(0.0), 0.5);
        assert!(Op::Sigmoid.apply(10.0) > 0.99);
        assert!(Op::Sigmoid.apply(-10.0) < 0.01);
    }

    #[test]
    fn linear_clamps() {
        assert_eq!(Op::Linear.apply(0.5), 0.5);
        assert_eq!(Op::Linear.apply(5.0), 2.0);
        assert_eq!(Op::Linear.apply(-5.0), -2.0);
    }

    #[test]
    fn scaled_sigmoid_is_centered() {
        assert_eq!(Op::ScaledSigmoid.apply(0.0), 0.0);
        assert!(Op::ScaledSigmoid.apply(10.0) > 0.99);
        assert!(Op::ScaledSigmoid.apply(-10.0) < -0.99);
    }

    #[test]
    fn definitions_cover_every_identifier() {
        let defs = primitive_definitions();
        for op in Op::ALL {
            assert!(defs.contains(&format!("float {}(float x)", op.identifier())));
        }
    }
}
