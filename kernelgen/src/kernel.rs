use crate::emit::{float_literal, CodeBuilder};
use crate::graph::{Graph, GraphError};
use crate::ops;
use crate::rule::{compile_rule, CompiledRule, RuleSignature};
use crate::schema::{FieldLayout, GeneSchema};

/// Field-level parameters of one kernel generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldParams {
    pub width: u32,
    pub height: u32,
    /// External input channels, each `R` floats wide.
    pub num_inputs: u32,
    /// External output channels, each `O` floats wide.
    pub num_outputs: u32,
    /// Scale applied to neighbor outputs before the connection rule.
    pub connection_strength_scalar: f32,
    /// Scale applied to response sums before the activation rule.
    pub node_output_strength_scalar: f32,
}

/// A complete generated field-update kernel: the OpenCL text plus the
/// buffer constants the compute runtime needs to allocate for it.
#[derive(Debug, Clone)]
pub struct FieldKernel {
    pub source: String,
    pub layout: FieldLayout,
}

/// Failures of kernel assembly. Structural graph defects are wrapped; the
/// remaining variants split into configuration errors (invalid dimensions,
/// radius, or channel counts) and schema mismatches (the gene schema
/// disagrees with what a graph actually requires).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembleError {
    Graph(GraphError),
    InvalidFieldSize { width: u32, height: u32 },
    InvalidRadius(u32),
    InvalidChannelCount { inputs: u32, outputs: u32 },
    InvalidSchemaWidth { field: &'static str, value: u32 },
    ConnectionInputArity { expected: u32, actual: u32 },
    ConnectionOutputArity { expected: u32, actual: u32 },
    ActivationInputArity { expected: u32, actual: u32 },
    ActivationOutputArity { expected: u32, actual: u32 },
    ConnectionRecurrentMismatch { declared: u32, actual: u32 },
    NodeRecurrentMismatch { declared: u32, actual: u32 },
}

impl std::fmt::Display for AssembleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use AssembleError::*;
        match self {
            Graph(err) => write!(f, "graph error: {err}"),
            InvalidFieldSize { width, height } => {
                write!(f, "invalid field size {width}x{height}")
            }
            InvalidRadius(r) => write!(f, "invalid connection radius {r}"),
            InvalidChannelCount { inputs, outputs } => {
                write!(f, "invalid channel counts: {inputs} inputs, {outputs} outputs")
            }
            InvalidSchemaWidth { field, value } => {
                write!(f, "schema field {field} has invalid width {value}")
            }
            ConnectionInputArity { expected, actual } => {
                write!(f, "connection rule takes {actual} inputs, schema requires {expected}")
            }
            ConnectionOutputArity { expected, actual } => {
                write!(f, "connection rule yields {actual} outputs, schema requires {expected}")
            }
            ActivationInputArity { expected, actual } => {
                write!(f, "activation rule takes {actual} inputs, schema requires {expected}")
            }
            ActivationOutputArity { expected, actual } => {
                write!(f, "activation rule yields {actual} outputs, schema requires {expected}")
            }
            ConnectionRecurrentMismatch { declared, actual } => {
                write!(
                    f,
                    "connection graph has {actual} recurrent edges, schema allocates {declared}"
                )
            }
            NodeRecurrentMismatch { declared, actual } => {
                write!(
                    f,
                    "activation graph has {actual} recurrent edges, schema allocates {declared}"
                )
            }
        }
    }
}

impl From<GraphError> for AssembleError {
    fn from(err: GraphError) -> Self {
        AssembleError::Graph(err)
    }
}

impl std::error::Error for AssembleError {}

/// Assemble one complete field-update kernel from the two evolved graphs.
///
/// Regenerating with identical inputs yields byte-identical text; nothing in
/// the emission path depends on addresses or hash iteration order.
pub fn assemble(
    connection_graph: &Graph,
    activation_graph: &Graph,
    schema: &GeneSchema,
    params: &FieldParams,
) -> Result<FieldKernel, AssembleError> {
    validate_config(schema, params)?;
    let connection = compile_rule(connection_graph, "connectionRule")?;
    let activation = compile_rule(activation_graph, "activationRule")?;
    let layout = check_contract(connection.signature, activation.signature, schema, params)?;
    let source = render_kernel(&connection, &activation, schema, params);
    Ok(FieldKernel { source, layout })
}

pub(crate) fn validate_config(
    schema: &GeneSchema,
    params: &FieldParams,
) -> Result<(), AssembleError> {
    if params.width == 0 || params.height == 0 {
        return Err(AssembleError::InvalidFieldSize {
            width: params.width,
            height: params.height,
        });
    }
    if schema.connection_radius == 0 {
        return Err(AssembleError::InvalidRadius(schema.connection_radius));
    }
    if params.num_inputs == 0 || params.num_outputs == 0 {
        return Err(AssembleError::InvalidChannelCount {
            inputs: params.num_inputs,
            outputs: params.num_outputs,
        });
    }
    if schema.node_output_size == 0 {
        return Err(AssembleError::InvalidSchemaWidth {
            field: "node_output_size",
            value: schema.node_output_size,
        });
    }
    if schema.connection_response_size == 0 {
        return Err(AssembleError::InvalidSchemaWidth {
            field: "connection_response_size",
            value: schema.connection_response_size,
        });
    }
    Ok(())
}

/// Verify both rule signatures against the schema before any offset constant
/// exists; an undetected mismatch would silently corrupt every index the
/// kernel derives from the stride.
pub(crate) fn check_contract(
    connection: RuleSignature,
    activation: RuleSignature,
    schema: &GeneSchema,
    params: &FieldParams,
) -> Result<FieldLayout, AssembleError> {
    if connection.num_inputs != schema.connection_rule_input_arity() {
        return Err(AssembleError::ConnectionInputArity {
            expected: schema.connection_rule_input_arity(),
            actual: connection.num_inputs,
        });
    }
    if connection.num_outputs != schema.connection_rule_output_arity() {
        return Err(AssembleError::ConnectionOutputArity {
            expected: schema.connection_rule_output_arity(),
            actual: connection.num_outputs,
        });
    }
    if activation.num_inputs != schema.activation_rule_input_arity() {
        return Err(AssembleError::ActivationInputArity {
            expected: schema.activation_rule_input_arity(),
            actual: activation.num_inputs,
        });
    }
    if activation.num_outputs != schema.activation_rule_output_arity() {
        return Err(AssembleError::ActivationOutputArity {
            expected: schema.activation_rule_output_arity(),
            actual: activation.num_outputs,
        });
    }
    if connection.num_recurrent != schema.connection_recurrent_size {
        return Err(AssembleError::ConnectionRecurrentMismatch {
            declared: schema.connection_recurrent_size,
            actual: connection.num_recurrent,
        });
    }
    if activation.num_recurrent != schema.node_recurrent_size {
        return Err(AssembleError::NodeRecurrentMismatch {
            declared: schema.node_recurrent_size,
            actual: activation.num_recurrent,
        });
    }
    Ok(FieldLayout {
        node_size: schema.node_size(),
        connection_size: schema.connection_size(),
        num_connections: schema.num_connections(),
        node_and_connections_size: schema.node_and_connections_size(),
        num_gases: schema.num_gases,
        num_inputs: params.num_inputs,
        num_outputs: params.num_outputs,
    })
}

fn render_kernel(
    connection: &CompiledRule,
    activation: &CompiledRule,
    schema: &GeneSchema,
    params: &FieldParams,
) -> String {
    let o = schema.node_output_size;
    let t = schema.type_size;
    let r = schema.connection_response_size;
    let g = schema.num_gases;
    let radius = schema.connection_radius as i32;
    let conn_rec = schema.connection_recurrent_size;
    let node_rec = schema.node_recurrent_size;
    let conn_rec_base = schema.connection_recurrent_offset();
    let node_rec_base = schema.node_recurrent_offset();

    let mut code = CodeBuilder::new();

    code.raw("/*\nkernelgen\n\nGenerated OpenCL field update kernel\n*/");
    code.blank();
    code.line("// Samplers for input and random lookups");
    code.raw(
        "constant sampler_t unnormalizedClampedNearestSampler = CLK_NORMALIZED_COORDS_FALSE |\n\
         \tCLK_ADDRESS_CLAMP_TO_EDGE |\n\
         \tCLK_FILTER_NEAREST;",
    );
    code.blank();
    code.raw(
        "constant sampler_t normalizedRepeatNearestSampler = CLK_NORMALIZED_COORDS_TRUE |\n\
         \tCLK_ADDRESS_REPEAT |\n\
         \tCLK_FILTER_NEAREST;",
    );
    code.blank();

    code.line("// Dimensions of field");
    code.line(format!("constant int fieldWidth = {};", params.width));
    code.line(format!("constant int fieldHeight = {};", params.height));
    code.line(format!(
        "constant int fieldArea = {};",
        params.width * params.height
    ));
    code.line(format!(
        "constant float fieldWidthInv = {};",
        float_literal(1.0 / params.width as f32)
    ));
    code.line(format!(
        "constant float fieldHeightInv = {};",
        float_literal(1.0 / params.height as f32)
    ));
    code.line(format!(
        "constant float connectionStrengthScalar = {};",
        float_literal(params.connection_strength_scalar)
    ));
    code.line(format!(
        "constant float nodeOutputStrengthScalar = {};",
        float_literal(params.node_output_strength_scalar)
    ));
    code.line(format!("constant int numInputs = {};", params.num_inputs));
    code.line(format!("constant int numOutputs = {};", params.num_outputs));
    code.line("constant float randomImageSizeInv = 0.0078125f;");
    code.blank();

    // The offset table deliberately includes (0, 0): a cell is its own
    // neighbor once. Inherited behavior, kept as-is.
    code.line("// Connection offsets");
    code.line(format!(
        "constant int2 offsets[{}] = {{",
        schema.num_connections()
    ));
    for dx in -radius..=radius {
        let entries: Vec<String> = (-radius..=radius)
            .map(|dy| format!("(int2)({dx}, {dy})"))
            .collect();
        let row = entries.join(", ");
        if dx < radius {
            code.line(format!("\t{row},"));
        } else {
            code.line(format!("\t{row}"));
        }
    }
    code.line("};");
    code.blank();

    code.line("// Library activation primitives");
    code.raw(ops::primitive_definitions());
    code.blank();

    code.line("// Connection update rule");
    code.raw(&connection.source);
    code.blank();
    code.line("// Activation update rule");
    code.raw(&activation.source);
    code.blank();

    code.line("// Data sizes");
    code.line(format!(
        "constant int nodeAndConnectionsSize = {};",
        schema.node_and_connections_size()
    ));
    code.line(format!(
        "constant int connectionSize = {};",
        schema.connection_size()
    ));
    code.line(format!("constant int nodeSize = {};", schema.node_size()));
    code.line(format!(
        "constant int numConnections = {};",
        schema.num_connections()
    ));
    code.line(format!("constant int numGases = {};", g));
    code.line(format!("constant int typeSize = {};", t));
    code.blank();

    code.line("// The kernel");
    code.line(
        "void kernel nodeUpdate(global const float* source, global const float* gasSource, \
         global float* destination, global float* gasDestination, read_only image2d_t typeImage, \
         read_only image1d_t inputImage, write_only image1d_t outputImage, \
         read_only image2d_t randomImage, float2 randomSeed, float reward) {",
    );
    code.indent();
    code.line("int2 nodePosition = (int2)(get_global_id(0), get_global_id(1));");
    code.line("int nodeIndex = nodePosition.x + nodePosition.y * fieldWidth;");
    code.line("int nodeStartOffset = nodeIndex * nodeAndConnectionsSize;");
    code.line("int connectionsStartOffset = nodeStartOffset + nodeSize;");
    code.line(
        "float2 normalizedCoords = ((float2)(nodePosition.x, nodePosition.y)) * \
         ((float2)(fieldWidthInv, fieldHeightInv));",
    );
    for i in 0..t {
        code.line(format!(
            "float nodeType{i} = source[nodeStartOffset + {}];",
            o + i
        ));
    }
    code.blank();
    code.line(
        "uint2 nodeInputOutputIndicesPlusOne = read_imageui(typeImage, \
         unnormalizedClampedNearestSampler, nodePosition).xy;",
    );
    code.blank();

    code.line("// Update connections");
    for i in 0..r {
        code.line(format!("float responseSum{i};"));
    }
    code.blank();
    code.line("if (nodeInputOutputIndicesPlusOne.x == 0) {");
    code.indent();
    for i in 0..r {
        code.line(format!("responseSum{i} = 0.0f;"));
    }
    code.blank();
    code.line("for (int ci = 0; ci < numConnections; ci++) {");
    code.indent();
    code.line("int2 connectionNodePosition = nodePosition + offsets[ci];");
    code.blank();
    code.line("// Toroidal wraparound");
    code.line(
        "connectionNodePosition.x = ((connectionNodePosition.x % fieldWidth) + fieldWidth) % \
         fieldWidth;",
    );
    code.line(
        "connectionNodePosition.y = ((connectionNodePosition.y % fieldHeight) + fieldHeight) % \
         fieldHeight;",
    );
    code.blank();
    code.line(
        "int connectionNodeIndex = connectionNodePosition.x + connectionNodePosition.y * \
         fieldWidth;",
    );
    code.line("int connectionNodeStartOffset = connectionNodeIndex * nodeAndConnectionsSize;");
    code.line("int connectionStartOffset = connectionsStartOffset + ci * connectionSize;");
    for i in 0..t {
        code.line(format!(
            "float connectionNodeType{i} = source[connectionNodeStartOffset + {}];",
            o + i
        ));
    }
    code.blank();
    for i in 0..r {
        code.line(format!("float response{i};"));
    }
    for i in 0..conn_rec {
        code.line(format!(
            "float connectionRec{i} = source[connectionStartOffset + {}];",
            conn_rec_base + i
        ));
    }
    code.blank();

    let mut args = Vec::new();
    for i in 0..o {
        args.push(format!(
            "connectionStrengthScalar * source[connectionNodeStartOffset + {i}]"
        ));
    }
    for i in 0..t {
        args.push(format!("nodeType{i}"));
    }
    for i in 0..t {
        args.push(format!("connectionNodeType{i}"));
    }
    args.push("(float)(offsets[ci].x)".to_string());
    args.push("(float)(offsets[ci].y)".to_string());
    args.push(
        "read_imagef(randomImage, normalizedRepeatNearestSampler, \
         (float2)(connectionNodePosition.x + nodePosition.x, connectionNodePosition.y + \
         nodePosition.y) * randomImageSizeInv).x"
            .to_string(),
    );
    args.push("reward".to_string());
    for i in 0..r {
        args.push(format!("&response{i}"));
    }
    for i in 0..conn_rec {
        args.push(format!("&connectionRec{i}"));
    }
    code.line(format!("{}({});", connection.name, args.join(", ")));
    code.blank();

    code.line("// Accumulate response");
    for i in 0..r {
        code.line(format!("responseSum{i} += response{i};"));
    }
    if conn_rec > 0 {
        code.blank();
        code.line("// Store updated connection recurrent state");
        for i in 0..conn_rec {
            code.line(format!(
                "destination[connectionStartOffset + {}] = connectionRec{i};",
                conn_rec_base + i
            ));
        }
    }
    code.dedent();
    code.line("}");
    code.dedent();
    code.line("}");
    code.line("else {");
    code.indent();
    for i in 0..r {
        code.line(format!(
            "responseSum{i} = read_imagef(inputImage, unnormalizedClampedNearestSampler, \
             ((int)(nodeInputOutputIndicesPlusOne.x) - 1) * {r} + {i}).x;"
        ));
    }
    code.dedent();
    code.line("}");
    code.blank();

    for i in 0..g {
        code.line(format!(
            "float gasIn{i} = gasSource[nodeIndex + fieldArea * {i}];"
        ));
    }
    for i in 0..g {
        code.line(format!("float gasOut{i};"));
    }
    for i in 0..o {
        code.line(format!("float output{i};"));
    }
    for i in 0..node_rec {
        code.line(format!(
            "float nodeRec{i} = source[nodeStartOffset + {}];",
            node_rec_base + i
        ));
    }
    code.blank();

    let mut args = Vec::new();
    for i in 0..r {
        args.push(format!("nodeOutputStrengthScalar * responseSum{i}"));
    }
    for i in 0..g {
        args.push(format!("gasIn{i}"));
    }
    for i in 0..t {
        args.push(format!("nodeType{i}"));
    }
    args.push(
        "read_imagef(randomImage, normalizedRepeatNearestSampler, (float2)(nodePosition.x - 1, \
         nodePosition.y - 1) * randomImageSizeInv).x"
            .to_string(),
    );
    args.push("reward".to_string());
    for i in 0..o {
        args.push(format!("&output{i}"));
    }
    for i in 0..g {
        args.push(format!("&gasOut{i}"));
    }
    for i in 0..node_rec {
        args.push(format!("&nodeRec{i}"));
    }
    code.line(format!("{}({});", activation.name, args.join(", ")));
    code.blank();

    code.line("// Commit to destination buffer");
    for i in 0..o {
        code.line(format!("destination[nodeStartOffset + {i}] = output{i};"));
    }
    for i in 0..node_rec {
        code.line(format!(
            "destination[nodeStartOffset + {}] = nodeRec{i};",
            node_rec_base + i
        ));
    }
    for i in 0..g {
        code.line(format!(
            "gasDestination[nodeIndex + fieldArea * {i}] = gasOut{i};"
        ));
    }
    code.blank();

    code.line("if (nodeInputOutputIndicesPlusOne.y != 0) {");
    code.indent();
    for i in 0..o {
        code.line(format!(
            "write_imagef(outputImage, ((int)(nodeInputOutputIndicesPlusOne.y) - 1) * {o} + {i}, \
             (float4)(output{i}));"
        ));
    }
    code.dedent();
    code.line("}");
    code.dedent();
    code.line("}");

    code.render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node, Source};
    use insta::assert_snapshot;

    fn pass_through(input_count: u32, outputs: Vec<u32>) -> Graph {
        Graph::new(
            input_count,
            vec![Node {
                op: "linear".into(),
                edges: vec![Edge {
                    source: Source::Input(0),
                    weight: 1.0,
                    recurrent: false,
                }],
            }],
            outputs,
        )
        .unwrap()
    }

    fn minimal_schema() -> GeneSchema {
        GeneSchema {
            node_output_size: 1,
            type_size: 0,
            connection_response_size: 1,
            num_gases: 0,
            connection_radius: 1,
            node_recurrent_size: 0,
            connection_recurrent_size: 0,
        }
    }

    fn minimal_params() -> FieldParams {
        FieldParams {
            width: 4,
            height: 4,
            num_inputs: 1,
            num_outputs: 1,
            connection_strength_scalar: 1.0,
            node_output_strength_scalar: 1.0,
        }
    }

    fn assemble_minimal() -> FieldKernel {
        assemble(
            &pass_through(5, vec![0]),
            &pass_through(3, vec![0]),
            &minimal_schema(),
            &minimal_params(),
        )
        .unwrap()
    }

    #[test]
    fn regeneration_is_byte_identical() {
        let a = assemble_minimal();
        let b = assemble_minimal();
        assert_eq!(a.source, b.source);
        assert_eq!(a.layout, b.layout);
    }

    #[test]
    fn stride_constant_appears_verbatim() {
        let kernel = assemble_minimal();
        assert_eq!(kernel.layout.node_and_connections_size, 10);
        assert!(kernel.source.contains("constant int nodeAndConnectionsSize = 10;"));
        assert!(kernel.source.contains("constant int connectionSize = 1;"));
        assert!(kernel.source.contains("constant int nodeSize = 1;"));
        assert!(kernel.source.contains("constant int numConnections = 9;"));
    }

    #[test]
    fn offset_table_is_row_major_and_includes_self() {
        let kernel = assemble_minimal();
        let decl = kernel
            .source
            .lines()
            .find(|l| l.starts_with("constant int2 offsets"))
            .unwrap();
        assert_snapshot!(decl, @"constant int2 offsets[9] = {");
        assert!(kernel
            .source
            .contains("\t(int2)(-1, -1), (int2)(-1, 0), (int2)(-1, 1),"));
        assert!(kernel
            .source
            .contains("\t(int2)(0, -1), (int2)(0, 0), (int2)(0, 1),"));
        assert!(kernel
            .source
            .contains("\t(int2)(1, -1), (int2)(1, 0), (int2)(1, 1)\n};"));
    }

    #[test]
    fn wraparound_uses_double_modulo_on_both_axes() {
        let kernel = assemble_minimal();
        assert!(kernel.source.contains(
            "connectionNodePosition.x = ((connectionNodePosition.x % fieldWidth) + fieldWidth) % fieldWidth;"
        ));
        assert!(kernel.source.contains(
            "connectionNodePosition.y = ((connectionNodePosition.y % fieldHeight) + fieldHeight) % fieldHeight;"
        ));
    }

    #[test]
    fn rules_and_primitives_are_embedded() {
        let kernel = assemble_minimal();
        assert!(kernel.source.contains("float sigmoid(float x)"));
        assert!(kernel.source.contains("float linear(float x)"));
        assert!(kernel.source.contains("float scaledSigmoid(float x)"));
        assert!(kernel.source.contains("void connectionRule(float in0"));
        assert!(kernel.source.contains("void activationRule(float in0"));
        assert!(kernel
            .source
            .contains("connectionRule(connectionStrengthScalar * source[connectionNodeStartOffset + 0]"));
        assert!(kernel
            .source
            .contains("activationRule(nodeOutputStrengthScalar * responseSum0"));
    }

    #[test]
    fn input_bound_cells_read_the_input_image() {
        let kernel = assemble_minimal();
        assert!(kernel.source.contains("if (nodeInputOutputIndicesPlusOne.x == 0) {"));
        assert!(kernel.source.contains(
            "responseSum0 = read_imagef(inputImage, unnormalizedClampedNearestSampler, ((int)(nodeInputOutputIndicesPlusOne.x) - 1) * 1 + 0).x;"
        ));
        assert!(kernel.source.contains("if (nodeInputOutputIndicesPlusOne.y != 0) {"));
        assert!(kernel.source.contains("write_imagef(outputImage"));
    }

    #[test]
    fn recurrent_slots_are_indexed_past_response_and_type() {
        let schema = GeneSchema {
            node_output_size: 1,
            type_size: 1,
            connection_response_size: 2,
            num_gases: 1,
            connection_radius: 1,
            node_recurrent_size: 1,
            connection_recurrent_size: 1,
        };
        let connection = Graph::new(
            schema.connection_rule_input_arity(),
            vec![Node {
                op: "linear".into(),
                edges: vec![
                    Edge {
                        source: Source::Input(0),
                        weight: 1.0,
                        recurrent: false,
                    },
                    Edge {
                        source: Source::Node(0),
                        weight: 0.5,
                        recurrent: true,
                    },
                ],
            }],
            vec![0, 0],
        )
        .unwrap();
        let activation = Graph::new(
            schema.activation_rule_input_arity(),
            vec![Node {
                op: "linear".into(),
                edges: vec![
                    Edge {
                        source: Source::Input(0),
                        weight: 1.0,
                        recurrent: false,
                    },
                    Edge {
                        source: Source::Node(0),
                        weight: 0.5,
                        recurrent: true,
                    },
                ],
            }],
            vec![0, 0],
        )
        .unwrap();
        let kernel = assemble(&connection, &activation, &schema, &minimal_params()).unwrap();

        // Connection slot: [ response(2) | type(1) | recurrent(1) ].
        assert!(kernel
            .source
            .contains("float connectionRec0 = source[connectionStartOffset + 3];"));
        assert!(kernel
            .source
            .contains("destination[connectionStartOffset + 3] = connectionRec0;"));
        // Node slot: [ output(1) | type(1) | recurrent(1) ].
        assert!(kernel
            .source
            .contains("float nodeRec0 = source[nodeStartOffset + 2];"));
        assert!(kernel
            .source
            .contains("destination[nodeStartOffset + 2] = nodeRec0;"));
        // Stride: 3 + 9 * 4.
        assert_eq!(kernel.layout.node_and_connections_size, 39);
        assert!(kernel.source.contains("constant int nodeAndConnectionsSize = 39;"));
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let conn = pass_through(5, vec![0]);
        let act = pass_through(3, vec![0]);

        let mut params = minimal_params();
        params.width = 0;
        assert!(matches!(
            assemble(&conn, &act, &minimal_schema(), &params),
            Err(AssembleError::InvalidFieldSize { width: 0, .. })
        ));

        let mut params = minimal_params();
        params.num_outputs = 0;
        assert!(matches!(
            assemble(&conn, &act, &minimal_schema(), &params),
            Err(AssembleError::InvalidChannelCount { outputs: 0, .. })
        ));

        let mut schema = minimal_schema();
        schema.connection_radius = 0;
        assert!(matches!(
            assemble(&conn, &act, &schema, &minimal_params()),
            Err(AssembleError::InvalidRadius(0))
        ));

        let mut schema = minimal_schema();
        schema.node_output_size = 0;
        assert!(matches!(
            assemble(&conn, &act, &schema, &minimal_params()),
            Err(AssembleError::InvalidSchemaWidth { .. })
        ));
    }

    #[test]
    fn arity_disagreements_are_schema_mismatches() {
        // Connection rule with one input too few.
        assert!(matches!(
            assemble(
                &pass_through(4, vec![0]),
                &pass_through(3, vec![0]),
                &minimal_schema(),
                &minimal_params()
            ),
            Err(AssembleError::ConnectionInputArity {
                expected: 5,
                actual: 4
            })
        ));

        // Activation graph carries a recurrent edge the schema has no slot for.
        let recurrent = Graph::new(
            3,
            vec![Node {
                op: "linear".into(),
                edges: vec![
                    Edge {
                        source: Source::Input(0),
                        weight: 1.0,
                        recurrent: false,
                    },
                    Edge {
                        source: Source::Node(0),
                        weight: 1.0,
                        recurrent: true,
                    },
                ],
            }],
            vec![0],
        )
        .unwrap();
        assert!(matches!(
            assemble(
                &pass_through(5, vec![0]),
                &recurrent,
                &minimal_schema(),
                &minimal_params()
            ),
            Err(AssembleError::NodeRecurrentMismatch {
                declared: 0,
                actual: 1
            })
        ));
    }

    #[test]
    fn structural_errors_propagate_without_emitting() {
        let cyclic = Graph {
            input_count: 5,
            nodes: vec![
                Node {
                    op: "linear".into(),
                    edges: vec![Edge {
                        source: Source::Node(1),
                        weight: 1.0,
                        recurrent: false,
                    }],
                },
                Node {
                    op: "linear".into(),
                    edges: vec![Edge {
                        source: Source::Node(0),
                        weight: 1.0,
                        recurrent: false,
                    }],
                },
            ],
            outputs: vec![0],
        };
        assert!(matches!(
            assemble(
                &cyclic,
                &pass_through(3, vec![0]),
                &minimal_schema(),
                &minimal_params()
            ),
            Err(AssembleError::Graph(GraphError::Cyclic { .. }))
        ));
    }
}
