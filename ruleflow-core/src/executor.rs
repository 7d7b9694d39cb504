use crate::ChoiceExecutor;
use anyhow::Result;
use futures::future::BoxFuture;
use ruleflow_context::RuleContext;
use std::fmt;
use std::sync::Arc;

/// Opaque unit of work behind a plain or output node.
///
/// Implementations are shared by every concurrent run of a flow and must be
/// safe to invoke from several tasks at once.
pub trait NodeAction: Send + Sync {
    fn execute<'a>(&'a self, ctx: &'a mut RuleContext) -> BoxFuture<'a, Result<()>>;
}

/// Wraps a synchronous closure as a [`NodeAction`].
pub fn action_fn<F>(f: F) -> Arc<dyn NodeAction>
where
    F: Fn(&mut RuleContext) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(FnAction(f))
}

struct FnAction<F>(F);

impl<F> NodeAction for FnAction<F>
where
    F: Fn(&mut RuleContext) -> Result<()> + Send + Sync,
{
    fn execute<'a>(&'a self, ctx: &'a mut RuleContext) -> BoxFuture<'a, Result<()>> {
        let result = (self.0)(ctx);
        Box::pin(async move { result })
    }
}

/// Compiled form of a node.
#[derive(Clone)]
pub enum NodeExecutor {
    Plain(Arc<dyn NodeAction>),
    Choice(Arc<ChoiceExecutor>),
    /// Reserved executor of the flow's output node.
    Output(Arc<dyn NodeAction>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorKind {
    Plain,
    Choice,
    Output,
}

impl NodeExecutor {
    pub fn plain<F>(f: F) -> Self
    where
        F: Fn(&mut RuleContext) -> Result<()> + Send + Sync + 'static,
    {
        Self::Plain(action_fn(f))
    }

    pub fn choice(choice: ChoiceExecutor) -> Self {
        Self::Choice(Arc::new(choice))
    }

    pub fn kind(&self) -> ExecutorKind {
        match self {
            Self::Plain(_) => ExecutorKind::Plain,
            Self::Choice(_) => ExecutorKind::Choice,
            Self::Output(_) => ExecutorKind::Output,
        }
    }

    pub fn is_choice(&self) -> bool {
        matches!(self, Self::Choice(_))
    }

    /// Re-tags a plain executor as the output executor.
    pub(crate) fn into_output(self) -> Self {
        match self {
            Self::Plain(action) => Self::Output(action),
            other => other,
        }
    }
}

impl fmt::Debug for NodeExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Choice(choice) => f.debug_tuple("Choice").field(choice).finish(),
            other => write!(f, "{:?}", other.kind()),
        }
    }
}
