//! In-memory invoker for tests and local wiring
//!
//! Answers every invocation from a closure and records the arguments it was
//! called with.

use async_trait::async_trait;
use std::sync::Mutex;

use dbtserve_core::{DbtPaths, InvocationArgs, RawResult, Verb};

use crate::invoker::{DbtInvoker, InvokeError};

type Responder = dyn Fn(Verb, &InvocationArgs) -> Result<RawResult, InvokeError> + Send + Sync;

pub struct ScriptedInvoker {
    responder: Box<Responder>,
    calls: Mutex<Vec<(Verb, InvocationArgs)>>,
}

impl ScriptedInvoker {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(Verb, &InvocationArgs) -> Result<RawResult, InvokeError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Invoker that always returns the same result
    pub fn returning(result: RawResult) -> Self {
        Self::new(move |_, _| Ok(result.clone()))
    }

    /// Every invocation so far, in call order
    pub fn calls(&self) -> Vec<(Verb, InvocationArgs)> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }
}

impl std::fmt::Debug for ScriptedInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedInvoker")
            .field("calls", &self.call_count())
            .finish()
    }
}

#[async_trait]
impl DbtInvoker for ScriptedInvoker {
    async fn invoke(
        &self,
        verb: Verb,
        args: &InvocationArgs,
        _paths: &DbtPaths,
    ) -> Result<RawResult, InvokeError> {
        match self.calls.lock() {
            Ok(mut calls) => calls.push((verb, args.clone())),
            Err(poisoned) => poisoned.into_inner().push((verb, args.clone())),
        }
        (self.responder)(verb, args)
    }
}
