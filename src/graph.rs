//! A small state-graph runner.
//!
//! A [`StateGraph`] is a set of named async nodes joined by direct or
//! conditional edges, starting at [`START`] and finishing at [`END`]. Each node
//! receives the current state and returns an update; [`GraphState::apply`]
//! folds the update into the state (for [`MessagesState`], messages are appended).
//!
//! ```rust,ignore
//! let mut graph = StateGraph::<MessagesState>::new();
//! graph.add_node("chatbot", chatbot)?;
//! graph.add_edge(START, "chatbot")?;
//! graph.add_edge("chatbot", END)?;
//! let graph = graph.compile()?;
//!
//! let mut events = graph.stream(state);
//! while let Some(event) = events.next().await { /* ... */ }
//! ```

use std::{
    collections::{HashMap, HashSet},
    fmt::Write,
    future::Future,
    sync::Arc,
};

use futures::{Stream, future::BoxFuture};
use petgraph::{
    algo::has_path_connecting,
    stable_graph::{NodeIndex, StableDiGraph},
    visit::{EdgeRef, IntoEdgeReferences},
};
use thiserror::Error;

use crate::{agent::AgentError, conversation::Message};

pub const START: &str = "__start__";
pub const END: &str = "__end__";
pub const DEFAULT_RECURSION_LIMIT: usize = 25;

pub trait GraphState: Clone + Send + Sync + 'static {
    type Update: Clone + Send + Sync + 'static;

    /// Reducer: fold a node's update into the state.
    fn apply(&mut self, update: Self::Update);
}

/// State holding a message list; updates are appended.
#[derive(Clone, Debug, Default)]
pub struct MessagesState {
    pub messages: Vec<Message>,
}

impl MessagesState {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

impl GraphState for MessagesState {
    type Update = Vec<Message>;

    fn apply(&mut self, update: Self::Update) {
        self.messages.extend(update);
    }
}

pub trait Node<S: GraphState>: Send + Sync {
    fn run(&self, state: S) -> BoxFuture<'_, Result<S::Update, AgentError>>;
}

impl<S, F, Fut> Node<S> for F
where
    S: GraphState,
    F: Fn(S) -> Fut + Send + Sync,
    Fut: Future<Output = Result<S::Update, AgentError>> + Send + 'static,
{
    fn run(&self, state: S) -> BoxFuture<'_, Result<S::Update, AgentError>> {
        Box::pin(self(state))
    }
}

pub type Router<S> = Arc<dyn Fn(&S) -> String + Send + Sync>;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Node {0} already exists")]
    DuplicateNode(String),
    #[error("{0} is a reserved node name")]
    ReservedName(String),
    #[error("Node {0} already has an outgoing edge")]
    DuplicateEdge(String),
    #[error("Unknown node {0}")]
    UnknownNode(String),
    #[error("Graph has no entry point, add an edge from START")]
    NoEntry,
    #[error("Node {0} has no outgoing edge")]
    DeadEnd(String),
    #[error("Node {0} is unreachable from START")]
    Unreachable(String),
    #[error("END is unreachable from START")]
    EndUnreachable,
    #[error("Router of {from} chose {to}, which is not one of its declared targets")]
    InvalidRoute { from: String, to: String },
    #[error("Recursion limit of {0} reached without hitting END")]
    RecursionLimit(usize),
    #[error("Node {node} failed: {source}")]
    NodeFailed {
        node: String,
        #[source]
        source: AgentError,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EdgeKind {
    Direct,
    Conditional,
}

enum Edge<S> {
    Direct(String),
    Conditional {
        router: Router<S>,
        targets: Vec<String>,
    },
}

/// One node execution, as yielded by [`CompiledGraph::stream`].
#[derive(Clone, Debug)]
pub struct StepEvent<U> {
    pub node: String,
    pub update: U,
}

pub struct StateGraph<S: GraphState> {
    nodes: Vec<(String, Arc<dyn Node<S>>)>,
    edges: HashMap<String, Edge<S>>,
}

impl<S: GraphState> Default for StateGraph<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: GraphState> StateGraph<S> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: HashMap::new(),
        }
    }

    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        node: impl Node<S> + 'static,
    ) -> Result<&mut Self, GraphError> {
        let name = name.into();
        if name == START || name == END {
            return Err(GraphError::ReservedName(name));
        }
        if self.has_node(&name) {
            return Err(GraphError::DuplicateNode(name));
        }
        self.nodes.push((name, Arc::new(node)));
        Ok(self)
    }

    pub fn add_edge(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Result<&mut Self, GraphError> {
        let from = from.into();
        self.insert_edge(from, Edge::Direct(to.into()))
    }

    /// Route from `from` by calling `router` on the state after `from` ran.
    /// The router must return one of `targets`.
    pub fn add_conditional_edges<R>(
        &mut self,
        from: impl Into<String>,
        router: R,
        targets: &[&str],
    ) -> Result<&mut Self, GraphError>
    where
        R: Fn(&S) -> String + Send + Sync + 'static,
    {
        let edge = Edge::Conditional {
            router: Arc::new(router),
            targets: targets.iter().map(|target| (*target).to_owned()).collect(),
        };
        self.insert_edge(from.into(), edge)
    }

    fn insert_edge(&mut self, from: String, edge: Edge<S>) -> Result<&mut Self, GraphError> {
        if self.edges.contains_key(&from) {
            return Err(GraphError::DuplicateEdge(from));
        }
        self.edges.insert(from, edge);
        Ok(self)
    }

    fn has_node(&self, name: &str) -> bool {
        self.nodes.iter().any(|(existing, _)| existing == name)
    }

    /// Validate the wiring and freeze the graph.
    pub fn compile(self) -> Result<CompiledGraph<S>, GraphError> {
        if !self.edges.contains_key(START) {
            return Err(GraphError::NoEntry);
        }

        let mut graph = StableDiGraph::new();
        let mut indices = HashMap::new();
        for name in std::iter::once(START)
            .chain(self.nodes.iter().map(|(name, _)| name.as_str()))
            .chain(std::iter::once(END))
        {
            indices.insert(name.to_owned(), graph.add_node(name.to_owned()));
        }

        for (from, edge) in &self.edges {
            if from == END || !indices.contains_key(from) {
                return Err(GraphError::UnknownNode(from.clone()));
            }
            let (targets, kind) = match edge {
                Edge::Direct(to) => (std::slice::from_ref(to), EdgeKind::Direct),
                Edge::Conditional { targets, .. } => (targets.as_slice(), EdgeKind::Conditional),
            };
            for to in targets {
                let target = match indices.get(to) {
                    Some(index) if to != START => *index,
                    _ => return Err(GraphError::UnknownNode(to.clone())),
                };
                graph.add_edge(indices[from], target, kind);
            }
        }

        for (name, _) in &self.nodes {
            if !self.edges.contains_key(name) {
                return Err(GraphError::DeadEnd(name.clone()));
            }
            if !has_path_connecting(&graph, indices[START], indices[name], None) {
                return Err(GraphError::Unreachable(name.clone()));
            }
        }
        if !has_path_connecting(&graph, indices[START], indices[END], None) {
            return Err(GraphError::EndUnreachable);
        }

        Ok(CompiledGraph {
            node_order: self.nodes.iter().map(|(name, _)| name.clone()).collect(),
            nodes: self.nodes.into_iter().collect(),
            edges: self.edges,
            graph,
            indices,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        })
    }
}

pub struct CompiledGraph<S: GraphState> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    node_order: Vec<String>,
    edges: HashMap<String, Edge<S>>,
    graph: StableDiGraph<String, EdgeKind>,
    indices: HashMap<String, NodeIndex>,
    recursion_limit: usize,
}

struct Cursor<S> {
    state: S,
    next: Option<String>,
    steps: usize,
}

impl<S: GraphState> CompiledGraph<S> {
    pub fn with_recursion_limit(mut self, recursion_limit: usize) -> Self {
        self.recursion_limit = recursion_limit;
        self
    }

    fn route(&self, from: &str, state: &S) -> Result<String, GraphError> {
        match self.edges.get(from) {
            Some(Edge::Direct(to)) => Ok(to.clone()),
            Some(Edge::Conditional { router, targets }) => {
                let to = router(state);
                if targets.contains(&to) {
                    Ok(to)
                } else {
                    Err(GraphError::InvalidRoute {
                        from: from.to_owned(),
                        to,
                    })
                }
            }
            None => Err(GraphError::DeadEnd(from.to_owned())),
        }
    }

    /// Run one node and work out where to go next. Returns `Ok(None)` once END is reached.
    async fn step(
        &self,
        cursor: &mut Cursor<S>,
    ) -> Result<Option<StepEvent<S::Update>>, GraphError> {
        let Some(name) = cursor.next.take() else {
            return Ok(None);
        };
        if name == END {
            return Ok(None);
        }
        if cursor.steps >= self.recursion_limit {
            return Err(GraphError::RecursionLimit(self.recursion_limit));
        }
        cursor.steps += 1;

        let node = self
            .nodes
            .get(&name)
            .ok_or_else(|| GraphError::UnknownNode(name.clone()))?;
        tracing::debug!(node = %name, step = cursor.steps, "running node");
        let update = node
            .run(cursor.state.clone())
            .await
            .map_err(|source| GraphError::NodeFailed {
                node: name.clone(),
                source,
            })?;
        cursor.state.apply(update.clone());
        cursor.next = Some(self.route(&name, &cursor.state)?);

        Ok(Some(StepEvent { node: name, update }))
    }

    fn cursor(&self, state: S) -> Cursor<S> {
        let next = match self.edges.get(START) {
            Some(Edge::Direct(to)) => Some(to.clone()),
            Some(Edge::Conditional { router, .. }) => Some(router(&state)),
            None => None,
        };
        Cursor {
            state,
            next,
            steps: 0,
        }
    }

    /// Run to END and return the final state.
    pub async fn invoke(&self, state: S) -> Result<S, GraphError> {
        let mut cursor = self.cursor(state);
        while self.step(&mut cursor).await?.is_some() {}
        Ok(cursor.state)
    }

    /// Run to END, yielding each node's update as it completes.
    /// The stream ends after the first error.
    pub fn stream(
        &self,
        state: S,
    ) -> impl Stream<Item = Result<StepEvent<S::Update>, GraphError>> + Send + '_ {
        futures::stream::unfold(Some(self.cursor(state)), move |cursor| async move {
            let mut cursor = cursor?;
            match self.step(&mut cursor).await {
                Ok(Some(event)) => Some((Ok(event), Some(cursor))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }

    /// Mermaid flowchart of the graph; conditional edges are dotted.
    pub fn draw_mermaid(&self) -> String {
        let mut out = String::from("graph TD;\n");
        let _ = writeln!(out, "\t{START}([<p>{START}</p>]):::first");
        for name in &self.node_order {
            let _ = writeln!(out, "\t{name}({name})");
        }
        let _ = writeln!(out, "\t{END}([<p>{END}</p>]):::last");
        for (from, to, kind) in self.edge_list() {
            let arrow = match kind {
                EdgeKind::Direct => "-->",
                EdgeKind::Conditional => "-.->",
            };
            let _ = writeln!(out, "\t{from} {arrow} {to};");
        }
        out.push_str("\tclassDef default fill:#f2f0ff,line-height:1.2\n");
        out.push_str("\tclassDef first fill-opacity:0\n");
        out.push_str("\tclassDef last fill:#bfb6fc\n");
        out
    }

    /// Graphviz rendering of the graph.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph {\n");
        for (from, to, kind) in self.edge_list() {
            let style = match kind {
                EdgeKind::Direct => "",
                EdgeKind::Conditional => " [style=dashed]",
            };
            let _ = writeln!(out, "    \"{from}\" -> \"{to}\"{style};");
        }
        out.push_str("}\n");
        out
    }

    /// Edges ordered by source (START, nodes in insertion order) then target name.
    fn edge_list(&self) -> Vec<(&str, &str, EdgeKind)> {
        let rank: HashMap<&str, usize> = std::iter::once(START)
            .chain(self.node_order.iter().map(String::as_str))
            .enumerate()
            .map(|(rank, name)| (name, rank))
            .collect();

        let mut seen = HashSet::new();
        let mut edges: Vec<_> = self
            .graph
            .edge_references()
            .map(|edge| {
                (
                    self.graph[edge.source()].as_str(),
                    self.graph[edge.target()].as_str(),
                    *edge.weight(),
                )
            })
            .filter(|(from, to, _)| seen.insert((*from, *to)))
            .collect();
        edges.sort_by(|a, b| {
            rank.get(a.0)
                .cmp(&rank.get(b.0))
                .then_with(|| a.1.cmp(b.1))
        });
        edges
    }

    pub fn node_names(&self) -> &[String] {
        &self.node_order
    }

    pub fn contains(&self, name: &str) -> bool {
        self.indices.contains_key(name)
    }
}
