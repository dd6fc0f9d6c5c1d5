use std::collections::HashMap;

use serde::Serialize;

use crate::emit::{float_literal, CodeBuilder};
use crate::graph::{Graph, GraphError, Source};
use crate::ops::Op;

/// Explicit ordered parameter contract of a compiled rule: `num_inputs`
/// value parameters, then `num_outputs` output pointers, then
/// `num_recurrent` recurrent-state pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuleSignature {
    pub num_inputs: u32,
    pub num_outputs: u32,
    pub num_recurrent: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Operand {
    /// External input parameter.
    Input(u32),
    /// Value of an already-emitted node.
    Node(u32),
    /// Previous-cycle value read from a recurrent-state parameter.
    Recurrent(u32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Term {
    weight: f32,
    operand: Operand,
}

#[derive(Debug, Clone)]
struct Statement {
    node: u32,
    op: Op,
    terms: Vec<Term>,
}

/// Ordered statement plan compiled from one computation graph.
///
/// The plan is the single source of truth for both the rendered OpenCL text
/// and the host-side evaluation, so tests can check semantics structurally
/// instead of string-diffing.
#[derive(Debug, Clone)]
pub struct RulePlan {
    signature: RuleSignature,
    statements: Vec<Statement>,
    /// Node feeding each output parameter, in parameter order.
    outputs: Vec<u32>,
    /// Node feeding each recurrent-state slot, in slot order.
    recurrent_sources: Vec<u32>,
}

impl RulePlan {
    /// Validate the graph and lower it into an ordered statement plan.
    pub fn build(graph: &Graph) -> Result<Self, GraphError> {
        graph.validate()?;
        let order = graph.evaluation_order()?;
        let recurrent = graph.recurrent_edges();

        let mut slot_of: HashMap<(u32, u32), u32> = HashMap::new();
        for (slot, rec) in recurrent.iter().enumerate() {
            slot_of.insert((rec.node, rec.edge), slot as u32);
        }

        let mut statements = Vec::with_capacity(graph.nodes.len());
        for node_idx in order {
            let node = &graph.nodes[node_idx as usize];
            let op = graph
                .node_op(node_idx)
                .ok_or_else(|| GraphError::UnknownOperation {
                    node: node_idx,
                    identifier: node.op.clone(),
                })?;
            let mut terms = Vec::with_capacity(node.edges.len());
            for (e, edge) in node.edges.iter().enumerate() {
                let operand = if edge.recurrent {
                    Operand::Recurrent(slot_of[&(node_idx, e as u32)])
                } else {
                    match edge.source {
                        Source::Input(i) => Operand::Input(i),
                        Source::Node(j) => Operand::Node(j),
                    }
                };
                terms.push(Term {
                    weight: edge.weight,
                    operand,
                });
            }
            statements.push(Statement {
                node: node_idx,
                op,
                terms,
            });
        }

        Ok(Self {
            signature: RuleSignature {
                num_inputs: graph.input_count,
                num_outputs: graph.outputs.len() as u32,
                num_recurrent: recurrent.len() as u32,
            },
            statements,
            outputs: graph.outputs.clone(),
            recurrent_sources: recurrent.iter().map(|r| r.source).collect(),
        })
    }

    pub fn signature(&self) -> RuleSignature {
        self.signature
    }

    /// Render the plan as a pure OpenCL function under the given name.
    ///
    /// Temporaries are named `node{i}` by arena index, so two compilations of
    /// the same graph yield byte-identical text.
    pub fn render(&self, name: &str) -> String {
        let mut params = Vec::new();
        for i in 0..self.signature.num_inputs {
            params.push(format!("float in{i}"));
        }
        for i in 0..self.signature.num_outputs {
            params.push(format!("float* out{i}"));
        }
        for k in 0..self.signature.num_recurrent {
            params.push(format!("float* rec{k}"));
        }

        let mut code = CodeBuilder::new();
        code.line(format!("void {}({}) {{", name, params.join(", ")));
        code.indent();
        for statement in &self.statements {
            let sum = if statement.terms.is_empty() {
                "0.0f".to_string()
            } else {
                statement
                    .terms
                    .iter()
                    .map(|t| format!("{} * {}", float_literal(t.weight), operand_text(t.operand)))
                    .collect::<Vec<_>>()
                    .join(" + ")
            };
            code.line(format!(
                "float node{} = {}({});",
                statement.node,
                statement.op.identifier(),
                sum
            ));
        }
        for (i, &node) in self.outputs.iter().enumerate() {
            code.line(format!("*out{i} = node{node};"));
        }
        for (k, &source) in self.recurrent_sources.iter().enumerate() {
            code.line(format!("*rec{k} = node{source};"));
        }
        code.dedent();
        code.line("}");
        code.render()
    }

    /// Evaluate the plan on the host with the same semantics as the rendered
    /// text. Returns the output vector and the updated recurrent state.
    ///
    /// `inputs` and `recurrent` must match the signature arities.
    pub fn evaluate(&self, inputs: &[f32], recurrent: &[f32]) -> (Vec<f32>, Vec<f32>) {
        debug_assert_eq!(inputs.len() as u32, self.signature.num_inputs);
        debug_assert_eq!(recurrent.len() as u32, self.signature.num_recurrent);

        let mut values = vec![0.0f32; self.statements.len()];
        for statement in &self.statements {
            let mut sum = 0.0f32;
            for term in &statement.terms {
                let operand = match term.operand {
                    Operand::Input(i) => inputs[i as usize],
                    Operand::Node(j) => values[j as usize],
                    Operand::Recurrent(k) => recurrent[k as usize],
                };
                sum += term.weight * operand;
            }
            values[statement.node as usize] = statement.op.apply(sum);
        }

        let outputs = self.outputs.iter().map(|&n| values[n as usize]).collect();
        let updated = self
            .recurrent_sources
            .iter()
            .map(|&n| values[n as usize])
            .collect();
        (outputs, updated)
    }
}

/// A rule compiled to text, together with its parameter contract.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub name: String,
    pub signature: RuleSignature,
    pub source: String,
}

/// Compile one computation graph into a named pure update function.
pub fn compile_rule(graph: &Graph, name: &str) -> Result<CompiledRule, GraphError> {
    let plan = RulePlan::build(graph)?;
    Ok(CompiledRule {
        name: name.to_string(),
        signature: plan.signature(),
        source: plan.render(name),
    })
}

fn operand_text(operand: Operand) -> String {
    match operand {
        Operand::Input(i) => format!("in{i}"),
        Operand::Node(j) => format!("node{j}"),
        Operand::Recurrent(k) => format!("(*rec{k})"),
    }
}
