use rand::Rng;

use crate::graph::Graph;
use crate::kernel::{check_contract, validate_config, AssembleError, FieldParams};
use crate::rule::RulePlan;
use crate::schema::{FieldLayout, GeneSchema};

/// Wrap a coordinate onto a toroidal axis of the given size.
///
/// The double modulo corrects negative results: `-1` maps to `size - 1`.
pub fn wrap(value: i32, size: u32) -> u32 {
    let size = size as i32;
    (((value % size) + size) % size) as u32
}

#[derive(Debug, Clone, Copy, Default)]
struct CellIo {
    input: Option<u32>,
    output: Option<u32>,
}

/// Host-side double-buffered field executing the same two-phase update the
/// generated kernel performs. The GPU path and this one must stay
/// behaviorally identical; tests hold the compiler to the field semantics
/// through this executor.
pub struct Field {
    width: u32,
    height: u32,
    schema: GeneSchema,
    layout: FieldLayout,
    connection_strength_scalar: f32,
    node_output_strength_scalar: f32,
    offsets: Vec<(i32, i32)>,
    connection: RulePlan,
    activation: RulePlan,
    source: Vec<f32>,
    destination: Vec<f32>,
    gas_source: Vec<f32>,
    gas_destination: Vec<f32>,
    io: Vec<CellIo>,
}

impl Field {
    /// Build a field for the given rule graphs, checking the same contracts
    /// the kernel assembler enforces.
    pub fn new(
        connection_graph: &Graph,
        activation_graph: &Graph,
        schema: &GeneSchema,
        params: &FieldParams,
    ) -> Result<Self, AssembleError> {
        validate_config(schema, params)?;
        let connection = RulePlan::build(connection_graph)?;
        let activation = RulePlan::build(activation_graph)?;
        let layout = check_contract(
            connection.signature(),
            activation.signature(),
            schema,
            params,
        )?;

        let radius = schema.connection_radius as i32;
        let mut offsets = Vec::with_capacity(layout.num_connections as usize);
        for dx in -radius..=radius {
            for dy in -radius..=radius {
                offsets.push((dx, dy));
            }
        }

        let area = (params.width * params.height) as usize;
        let stride = layout.node_and_connections_size as usize;
        Ok(Self {
            width: params.width,
            height: params.height,
            schema: *schema,
            layout,
            connection_strength_scalar: params.connection_strength_scalar,
            node_output_strength_scalar: params.node_output_strength_scalar,
            offsets,
            connection,
            activation,
            source: vec![0.0; area * stride],
            destination: vec![0.0; area * stride],
            gas_source: vec![0.0; area * schema.num_gases as usize],
            gas_destination: vec![0.0; area * schema.num_gases as usize],
            io: vec![CellIo::default(); area],
        })
    }

    pub fn layout(&self) -> FieldLayout {
        self.layout
    }

    /// Bind a cell to an external input channel; the cell skips neighbor
    /// aggregation and reads its response vector from that channel.
    pub fn bind_input(&mut self, x: u32, y: u32, channel: u32) {
        let cell = self.cell_index(x, y);
        self.io[cell].input = Some(channel);
    }

    /// Bind a cell to an external output channel; its output vector is
    /// mirrored into that channel each tick.
    pub fn bind_output(&mut self, x: u32, y: u32, channel: u32) {
        let cell = self.cell_index(x, y);
        self.io[cell].output = Some(channel);
    }

    /// Seed a cell's output values in the current source snapshot.
    pub fn set_node_output(&mut self, x: u32, y: u32, values: &[f32]) {
        let start = self.node_start(x, y);
        self.source[start..start + values.len()].copy_from_slice(values);
    }

    /// Set a cell's type channels. Type channels are host-owned: the update
    /// never rewrites them, they are carried across ticks unchanged.
    pub fn set_type_channels(&mut self, x: u32, y: u32, values: &[f32]) {
        let start = self.node_start(x, y) + self.schema.node_output_size as usize;
        self.source[start..start + values.len()].copy_from_slice(values);
    }

    pub fn node_output(&self, x: u32, y: u32, i: u32) -> f32 {
        self.source[self.node_start(x, y) + i as usize]
    }

    pub fn node_recurrent(&self, x: u32, y: u32, i: u32) -> f32 {
        self.source[self.node_start(x, y) + (self.schema.node_recurrent_offset() + i) as usize]
    }

    pub fn connection_recurrent(&self, x: u32, y: u32, connection: u32, i: u32) -> f32 {
        let start = self.node_start(x, y)
            + self.layout.node_size as usize
            + (connection * self.layout.connection_size) as usize;
        self.source[start + (self.schema.connection_recurrent_offset() + i) as usize]
    }

    pub fn gas(&self, x: u32, y: u32, channel: u32) -> f32 {
        let area = (self.width * self.height) as usize;
        self.gas_source[self.cell_index(x, y) + area * channel as usize]
    }

    /// Advance the field by one tick.
    ///
    /// `inputs` holds `num_inputs * R` floats; `outputs` receives
    /// `num_outputs * O` floats for the output-bound cells. Every read
    /// targets the source snapshot and every write the destination snapshot;
    /// the buffers swap at the end, like the runtime swaps the device
    /// buffers between dispatches.
    pub fn tick(&mut self, inputs: &[f32], outputs: &mut [f32], rng: &mut impl Rng, reward: f32) {
        let o = self.schema.node_output_size as usize;
        let t = self.schema.type_size as usize;
        let r = self.schema.connection_response_size as usize;
        let g = self.schema.num_gases as usize;
        let conn_rec = self.schema.connection_recurrent_size as usize;
        let node_rec = self.schema.node_recurrent_size as usize;
        let conn_rec_base = self.schema.connection_recurrent_offset() as usize;
        let node_rec_base = self.schema.node_recurrent_offset() as usize;
        let stride = self.layout.node_and_connections_size as usize;
        let node_size = self.layout.node_size as usize;
        let connection_size = self.layout.connection_size as usize;
        let area = (self.width * self.height) as usize;

        // Carry host-owned values (type channels) into the new snapshot;
        // every computed slot is overwritten below.
        self.destination.copy_from_slice(&self.source);

        for y in 0..self.height {
            for x in 0..self.width {
                let cell = (x + y * self.width) as usize;
                let node_start = cell * stride;
                let connections_start = node_start + node_size;
                let io = self.io[cell];

                let mut response_sum = vec![0.0f32; r];
                if let Some(channel) = io.input {
                    // Phase 1 alternate: the response vector comes straight
                    // from the external input channel.
                    for i in 0..r {
                        response_sum[i] = inputs[channel as usize * r + i];
                    }
                } else {
                    for (ci, &(dx, dy)) in self.offsets.iter().enumerate() {
                        let nx = wrap(x as i32 + dx, self.width);
                        let ny = wrap(y as i32 + dy, self.height);
                        let neighbor_start = ((nx + ny * self.width) as usize) * stride;
                        let connection_start = connections_start + ci * connection_size;

                        let mut rule_inputs =
                            Vec::with_capacity(self.connection.signature().num_inputs as usize);
                        for i in 0..o {
                            rule_inputs.push(
                                self.connection_strength_scalar * self.source[neighbor_start + i],
                            );
                        }
                        for i in 0..t {
                            rule_inputs.push(self.source[node_start + o + i]);
                        }
                        for i in 0..t {
                            rule_inputs.push(self.source[neighbor_start + o + i]);
                        }
                        rule_inputs.push(dx as f32);
                        rule_inputs.push(dy as f32);
                        rule_inputs.push(rng.gen::<f32>());
                        rule_inputs.push(reward);

                        let state: Vec<f32> = (0..conn_rec)
                            .map(|i| self.source[connection_start + conn_rec_base + i])
                            .collect();
                        let (response, updated) = self.connection.evaluate(&rule_inputs, &state);
                        for i in 0..r {
                            response_sum[i] += response[i];
                        }
                        for i in 0..conn_rec {
                            self.destination[connection_start + conn_rec_base + i] = updated[i];
                        }
                    }
                }

                let mut rule_inputs =
                    Vec::with_capacity(self.activation.signature().num_inputs as usize);
                for i in 0..r {
                    rule_inputs.push(self.node_output_strength_scalar * response_sum[i]);
                }
                for i in 0..g {
                    rule_inputs.push(self.gas_source[cell + area * i]);
                }
                for i in 0..t {
                    rule_inputs.push(self.source[node_start + o + i]);
                }
                rule_inputs.push(rng.gen::<f32>());
                rule_inputs.push(reward);

                let state: Vec<f32> = (0..node_rec)
                    .map(|i| self.source[node_start + node_rec_base + i])
                    .collect();
                let (produced, updated) = self.activation.evaluate(&rule_inputs, &state);

                for i in 0..o {
                    self.destination[node_start + i] = produced[i];
                }
                for i in 0..node_rec {
                    self.destination[node_start + node_rec_base + i] = updated[i];
                }
                for i in 0..g {
                    self.gas_destination[cell + area * i] = produced[o + i];
                }
                if let Some(channel) = io.output {
                    for i in 0..o {
                        outputs[channel as usize * o + i] = produced[i];
                    }
                }
            }
        }

        std::mem::swap(&mut self.source, &mut self.destination);
        std::mem::swap(&mut self.gas_source, &mut self.gas_destination);
    }

    fn cell_index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        (x + y * self.width) as usize
    }

    fn node_start(&self, x: u32, y: u32) -> usize {
        self.cell_index(x, y) * self.layout.node_and_connections_size as usize
    }
}
