use serde::{Deserialize, Serialize};

/// Buffer-layout sizing record attached to an evolved individual.
///
/// Immutable for the duration of one kernel-generation call; both compiler
/// stages read it to size declarations and indices. The two recurrent
/// capacities are declared by the genome and must match the recurrent-edge
/// counts of the corresponding graphs, which the assembler verifies before
/// emitting any offset constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneSchema {
    /// Node output width `O`.
    pub node_output_size: u32,
    /// Type channel width `T`.
    pub type_size: u32,
    /// Connection response width `R`.
    pub connection_response_size: u32,
    /// Gas channel count `G`.
    pub num_gases: u32,
    /// Neighborhood radius `r`; the connection count is `(2r+1)^2`.
    pub connection_radius: u32,
    /// Recurrent slots allocated per node.
    pub node_recurrent_size: u32,
    /// Recurrent slots allocated per connection.
    pub connection_recurrent_size: u32,
}

impl GeneSchema {
    /// Connections per cell, including the self-offset `(0, 0)`.
    pub fn num_connections(&self) -> u32 {
        let diameter = 2 * self.connection_radius + 1;
        diameter * diameter
    }

    /// Floats in one node slot: `[ output | type | recurrent ]`.
    pub fn node_size(&self) -> u32 {
        self.node_output_size + self.type_size + self.node_recurrent_size
    }

    /// Floats in one connection slot: `[ response | type | recurrent ]`.
    pub fn connection_size(&self) -> u32 {
        self.connection_response_size + self.type_size + self.connection_recurrent_size
    }

    /// Per-cell stride of the flat node buffers.
    pub fn node_and_connections_size(&self) -> u32 {
        self.node_size() + self.num_connections() * self.connection_size()
    }

    /// Offset of the recurrent slots inside a connection slot.
    pub fn connection_recurrent_offset(&self) -> u32 {
        self.connection_response_size + self.type_size
    }

    /// Offset of the recurrent slots inside a node slot.
    pub fn node_recurrent_offset(&self) -> u32 {
        self.node_output_size + self.type_size
    }

    /// Inputs the connection rule consumes: scaled neighbor outputs, own and
    /// neighbor type channels, the offset vector, a random sample, and the
    /// reward scalar.
    pub fn connection_rule_input_arity(&self) -> u32 {
        self.node_output_size + 2 * self.type_size + 4
    }

    /// Outputs the connection rule produces: one response vector.
    pub fn connection_rule_output_arity(&self) -> u32 {
        self.connection_response_size
    }

    /// Inputs the activation rule consumes: scaled response sums, gas inputs,
    /// type channels, a random sample, and the reward scalar.
    pub fn activation_rule_input_arity(&self) -> u32 {
        self.connection_response_size + self.num_gases + self.type_size + 2
    }

    /// Outputs the activation rule produces: the output vector followed by
    /// gas production values.
    pub fn activation_rule_output_arity(&self) -> u32 {
        self.node_output_size + self.num_gases
    }
}

/// Numeric constants the compute runtime needs to allocate conforming
/// buffers for a generated kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldLayout {
    pub node_size: u32,
    pub connection_size: u32,
    pub num_connections: u32,
    /// Per-cell stride: node buffers hold `stride * cellCount` floats.
    pub node_and_connections_size: u32,
    pub num_gases: u32,
    pub num_inputs: u32,
    pub num_outputs: u32,
}
