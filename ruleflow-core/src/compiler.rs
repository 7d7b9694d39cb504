use crate::{ChoiceExecutor, NodeAction, NodeExecutor, NodeRecord};
use anyhow::{anyhow, bail, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Component name compiled into a [`ChoiceExecutor`].
pub const CHOICE_COMPONENT: &str = "choice";

/// Turns a node record into its executor.
pub trait NodeCompiler: Send + Sync {
    fn compile(&self, node: &NodeRecord) -> Result<NodeExecutor>;
}

impl<F> NodeCompiler for F
where
    F: Fn(&NodeRecord) -> Result<NodeExecutor> + Send + Sync,
{
    fn compile(&self, node: &NodeRecord) -> Result<NodeExecutor> {
        self(node)
    }
}

pub type ComponentFactory =
    Arc<dyn Fn(&NodeRecord) -> Result<Arc<dyn NodeAction>> + Send + Sync>;

/// Compiler that resolves nodes by component name.
///
/// `choice` is built in; every other component needs a registered factory.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    components: HashMap<String, ComponentFactory>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(mut self, component_name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&NodeRecord) -> Result<Arc<dyn NodeAction>> + Send + Sync + 'static,
    {
        self.components
            .insert(component_name.into(), Arc::new(factory));
        self
    }

    /// Registers one shared action for every node of `component_name`.
    pub fn register_action(
        self,
        component_name: impl Into<String>,
        action: Arc<dyn NodeAction>,
    ) -> Self {
        self.register(component_name, move |_| Ok(action.clone()))
    }

    pub fn contains(&self, component_name: &str) -> bool {
        component_name == CHOICE_COMPONENT || self.components.contains_key(component_name)
    }
}

impl NodeCompiler for ComponentRegistry {
    fn compile(&self, node: &NodeRecord) -> Result<NodeExecutor> {
        if node.component_name == CHOICE_COMPONENT {
            return Ok(NodeExecutor::choice(ChoiceExecutor::from_parameters(
                &node.parameters,
            )?));
        }

        let factory = self
            .components
            .get(&node.component_name)
            .ok_or_else(|| anyhow!("unknown component '{}'", node.component_name))?;
        Ok(NodeExecutor::Plain(factory(node)?))
    }
}

/// Outcome of a [`NodeInterceptor`] looking at a node definition.
pub enum Interception {
    Keep,
    /// Continue with a rewritten definition; the id must not change.
    Rewrite(NodeRecord),
    /// Use this executor and skip compilation.
    Replace(NodeExecutor),
}

/// Hook applied to node definitions before compilation.
pub trait NodeInterceptor: Send + Sync {
    /// Lower values run first.
    fn priority(&self) -> i32 {
        0
    }

    fn intercept(&self, node: &NodeRecord) -> Result<Interception>;
}

/// Runs `interceptors` (already in priority order) over `node`.
///
/// Returns the final definition and, if one interceptor claimed it, the
/// replacement executor.
pub(crate) fn intercept_node(
    interceptors: &[Arc<dyn NodeInterceptor>],
    mut node: NodeRecord,
) -> Result<(NodeRecord, Option<NodeExecutor>)> {
    let mut replacement = None;

    for interceptor in interceptors {
        match interceptor.intercept(&node)? {
            Interception::Keep => {}
            Interception::Rewrite(rewritten) => {
                if rewritten.id != node.id {
                    bail!(
                        "interceptor renamed node '{}' to '{}'",
                        node.id,
                        rewritten.id
                    );
                }
                node = rewritten;
            }
            Interception::Replace(executor) => {
                if replacement.is_some() {
                    bail!("more than one interceptor claims full replacement");
                }
                replacement = Some(executor);
            }
        }
    }

    Ok((node, replacement))
}
