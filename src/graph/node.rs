use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::state::GraphState;

/// One unit of work in a graph: reads the state, returns a partial update.
#[async_trait]
pub trait Node<S: GraphState>: Send + Sync {
    async fn run(&self, state: &S) -> Result<S::Update>;
}

/// Wrap an async closure as a node. The closure receives a clone of the state.
pub struct FnNode<S, F> {
    func: F,
    _state: PhantomData<fn(S)>,
}

impl<S, F, Fut> FnNode<S, F>
where
    S: GraphState,
    F: Fn(S) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<S::Update>> + Send + 'static,
{
    pub fn new(func: F) -> Self {
        Self {
            func,
            _state: PhantomData,
        }
    }
}

#[async_trait]
impl<S, F, Fut> Node<S> for FnNode<S, F>
where
    S: GraphState,
    F: Fn(S) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<S::Update>> + Send + 'static,
{
    async fn run(&self, state: &S) -> Result<S::Update> {
        (self.func)(state.clone()).await
    }
}

pub type Router<S> = Arc<dyn Fn(&S) -> String + Send + Sync>;

/// A conditional edge: a router plus every destination it may return.
pub struct Branch<S> {
    router: Router<S>,
    destinations: Vec<String>,
}

impl<S> Clone for Branch<S> {
    fn clone(&self) -> Self {
        Self {
            router: Arc::clone(&self.router),
            destinations: self.destinations.clone(),
        }
    }
}

impl<S> Branch<S> {
    pub fn new<I, D>(destinations: I, router: impl Fn(&S) -> String + Send + Sync + 'static) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<String>,
    {
        Self {
            router: Arc::new(router),
            destinations: destinations.into_iter().map(Into::into).collect(),
        }
    }

    pub fn destinations(&self) -> &[String] {
        &self.destinations
    }

    pub(crate) fn route(&self, state: &S) -> String {
        (self.router)(state)
    }
}
