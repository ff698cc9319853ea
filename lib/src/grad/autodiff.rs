//! Reverse-mode differentiation over a recorded graph of tensor operations.
//!
//! The forward pass is replayed onto a [`Tape`]: a DAG whose nodes hold an
//! operation and the value it produced, and whose edges carry the argument
//! position. Gradients are then pushed from the loss back to the leaves in
//! reverse topological order, summing contributions where a value fans out.

use std::{
  collections::{hash_map::Entry, HashMap},
  fmt,
};

use itertools::Itertools;
use petgraph::{
  algo::toposort,
  stable_graph::{NodeIndex, StableGraph},
  visit::EdgeRef,
  Direction::Incoming,
};
use petgraph_graphml::GraphMl;
use tracing::{instrument, trace};

use super::{GradientEngine, Gradients};
use crate::{
  data::Batch,
  error::{Error, Result},
  loss,
  model::{Activation, Network},
  params::{ParamId, ParameterStore},
  tensor::Tensor,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
  /// Data fed in from outside; never differentiated.
  Input,
  Param(ParamId),
  MatMul,
  AddBias,
  Activate(Activation),
  Squeeze,
  MseLoss,
}

impl fmt::Display for Op {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Op::Input => write!(f, "input"),
      Op::Param(id) => write!(f, "param#{}", id.0),
      Op::MatMul => write!(f, "matmul"),
      Op::AddBias => write!(f, "add_bias"),
      Op::Activate(a) => write!(f, "{}", a),
      Op::Squeeze => write!(f, "squeeze"),
      Op::MseLoss => write!(f, "mse"),
    }
  }
}

#[derive(Debug, Clone)]
pub struct Node {
  pub op: Op,
  pub value: Tensor,
}

impl fmt::Display for Node {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.op, self.value)
  }
}

#[derive(Debug, Clone, Default)]
pub struct Tape {
  graph: StableGraph<Node, usize>,
}

impl Tape {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn leaf(&mut self, op: Op, value: Tensor) -> NodeIndex {
    self.graph.add_node(Node { op, value })
  }

  /// Evaluates `op` on the values of `inputs` and records the result.
  pub fn record(&mut self, op: Op, inputs: &[NodeIndex]) -> Result<NodeIndex> {
    let value = {
      let args = inputs.iter().map(|&i| self.value(i)).collect_vec();
      match (&op, args.as_slice()) {
        (Op::MatMul, [a, b]) => a.matmul(b)?,
        (Op::AddBias, [a, b]) => a.add_row(b)?,
        (Op::Activate(act), [a]) => a.map(|v| act.apply(v)),
        (Op::Squeeze, [a]) => (*a).clone().squeeze_last(),
        (Op::MseLoss, [p, t]) => Tensor::scalar(loss::mse(p, t)?),
        _ => {
          return Err(Error::shape(format!(
            "{} cannot be recorded with {} inputs",
            op,
            inputs.len()
          )))
        }
      }
    };
    let node = self.graph.add_node(Node { op, value });
    for (order, &input) in inputs.iter().enumerate() {
      self.graph.add_edge(input, node, order);
    }
    Ok(node)
  }

  pub fn value(&self, node: NodeIndex) -> &Tensor {
    &self.graph[node].value
  }

  pub fn node_count(&self) -> usize {
    self.graph.node_count()
  }

  fn inputs(&self, node: NodeIndex) -> Vec<NodeIndex> {
    self
      .graph
      .edges_directed(node, Incoming)
      .sorted_by_key(|e| *e.weight())
      .map(|e| e.source())
      .collect()
  }

  fn needs_grad(&self, node: NodeIndex) -> bool {
    !matches!(self.graph[node].op, Op::Input)
  }

  /// Gradient flowing into each argument of `node`, given the gradient `grad` of its output.
  fn vjp(
    &self,
    node: NodeIndex,
    inputs: &[NodeIndex],
    grad: &Tensor,
  ) -> Result<Vec<Option<Tensor>>> {
    let wants = |i: usize| self.needs_grad(inputs[i]);
    match (&self.graph[node].op, inputs) {
      (Op::Input | Op::Param(_), _) => Ok(vec![]),
      (Op::MatMul, &[a, b]) => {
        let ga = if wants(0) {
          Some(grad.matmul(&self.value(b).transpose()?)?)
        } else {
          None
        };
        let gb = if wants(1) {
          Some(self.value(a).transpose()?.matmul(grad)?)
        } else {
          None
        };
        Ok(vec![ga, gb])
      }
      (Op::AddBias, &[_, _]) => Ok(vec![
        wants(0).then(|| grad.clone()),
        if wants(1) { Some(grad.sum_rows()?) } else { None },
      ]),
      (Op::Activate(act), &[input]) => {
        let slope = self
          .value(input)
          .zip_map(self.value(node), |x, y| act.derivative(x, y))?;
        Ok(vec![Some(grad.zip_map(&slope, |g, s| g * s)?)])
      }
      (Op::Squeeze, &[x]) => Ok(vec![Some(grad.reshape(self.value(x).shape().to_vec())?)]),
      (Op::MseLoss, &[p, t]) => {
        let seed = grad.data().iter().sum::<f32>();
        let gp = loss::mse_grad(self.value(p), self.value(t))?.map(|g| g * seed);
        let gt = wants(1).then(|| gp.map(|g| -g));
        Ok(vec![Some(gp), gt])
      }
      (op, _) => Err(Error::shape(format!("malformed tape: {} has {} inputs", op, inputs.len()))),
    }
  }

  /// Gradient of `root` with respect to every node that feeds it, `Input` leaves excepted.
  pub fn backward(&self, root: NodeIndex) -> Result<HashMap<NodeIndex, Tensor>> {
    let order = toposort(&self.graph, None)
      .map_err(|cycle| Error::shape(format!("tape has a cycle through {:?}", cycle.node_id())))?;
    let mut grads: HashMap<NodeIndex, Tensor> = HashMap::new();
    grads.insert(root, Tensor::full(self.value(root).shape().to_vec(), 1.0));
    for node in order.into_iter().rev() {
      let grad = match grads.get(&node) {
        Some(grad) => grad.clone(),
        None => continue,
      };
      let inputs = self.inputs(node);
      let local = self.vjp(node, &inputs, &grad)?;
      for (input, g) in inputs.into_iter().zip(local) {
        let Some(g) = g else { continue };
        match grads.entry(input) {
          Entry::Occupied(mut e) => e.get_mut().accumulate(&g)?,
          Entry::Vacant(e) => {
            e.insert(g);
          }
        }
      }
    }
    Ok(grads)
  }

  pub fn to_graphml(&self) -> Result<String> {
    let graphml = GraphMl::new(&self.graph)
      .pretty_print(true)
      .export_node_weights_display()
      .export_edge_weights_display();
    let mut buf: Vec<u8> = vec![];
    graphml.to_writer(&mut buf)?;
    Ok(String::from_utf8(buf)?)
  }
}

/// A recorded forward pass with the handles needed to read it back.
#[derive(Debug)]
pub struct Recording {
  pub tape: Tape,
  pub predictions: NodeIndex,
  pub loss: NodeIndex,
  /// One leaf per store parameter, in store order.
  pub params: Vec<NodeIndex>,
}

/// Records the same computation as [`Network::forward`] followed by the batch MSE.
pub fn record_forward(
  network: &Network,
  store: &ParameterStore,
  batch: &Batch,
) -> Result<Recording> {
  network.check_inputs(&batch.inputs)?;
  let mut tape = Tape::new();
  let params = store
    .get_all()
    .iter()
    .enumerate()
    .map(|(i, p)| tape.leaf(Op::Param(ParamId(i)), p.value.clone()))
    .collect_vec();
  let param = |id: ParamId| {
    params
      .get(id.0)
      .copied()
      .ok_or_else(|| Error::shape(format!("network refers to unknown parameter {:?}", id)))
  };

  let mut current = tape.leaf(Op::Input, batch.inputs.clone());
  for layer in network.layers() {
    current = tape.record(Op::MatMul, &[current, param(layer.weight)?])?;
    if let Some(bias) = layer.bias {
      current = tape.record(Op::AddBias, &[current, param(bias)?])?;
    }
    current = tape.record(Op::Activate(layer.activation), &[current])?;
  }
  let predictions = tape.record(Op::Squeeze, &[current])?;
  let targets = tape.leaf(Op::Input, batch.targets.clone());
  let loss = tape.record(Op::MseLoss, &[predictions, targets])?;
  Ok(Recording {
    tape,
    predictions,
    loss,
    params,
  })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Autodiff;

impl GradientEngine for Autodiff {
  fn name(&self) -> &'static str {
    "autodiff"
  }

  #[instrument(level = "trace", skip_all)]
  fn compute(
    &mut self,
    network: &Network,
    store: &ParameterStore,
    batch: &Batch,
  ) -> Result<Gradients> {
    let recording = record_forward(network, store, batch)?;
    let mut by_node = recording.tape.backward(recording.loss)?;
    let loss = recording.tape.value(recording.loss).data()[0];
    let grads = recording
      .params
      .iter()
      .zip(store.get_all())
      .map(|(node, p)| {
        by_node
          .remove(node)
          .unwrap_or_else(|| Tensor::zeros(p.value.shape().to_vec()))
      })
      .collect();
    trace!(nodes = recording.tape.node_count(), loss, "backward pass done");
    Ok(Gradients { loss, grads })
  }
}
