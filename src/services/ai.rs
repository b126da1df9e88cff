//! A bounded stub of the `ai.llm.*` route family: model load/unload,
//! context lifecycle, dump/restore and LoRA adapters, with no inference
//! engine linked (out of scope per spec §1). Every operation validates
//! parameters and records state transitions exactly as a real backend
//! would be required to, so the route surface and its testable properties
//! (state progression, double-free rejection) hold without the weight of
//! an actual model runtime.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RouteError;
use crate::result::IdGenerator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelState {
    Loaded,
    Unloaded,
}

struct Model {
    state: ModelState,
    path: String,
}

struct Context {
    model_id: u64,
    loras: Vec<u64>,
}

#[derive(Default)]
pub struct AiService {
    ids: IdGenerator,
    models: Mutex<HashMap<u64, Model>>,
    contexts: Mutex<HashMap<u64, Context>>,
    loras: Mutex<HashMap<u64, String>>,
}

impl AiService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model_load(&self, path: &str) -> Result<u64, RouteError> {
        if path.is_empty() {
            return Err(RouteError::missing_parameter("path"));
        }
        let id = self.ids.next();
        self.models.lock().insert(
            id,
            Model {
                state: ModelState::Loaded,
                path: path.to_string(),
            },
        );
        Ok(id)
    }

    pub fn model_unload(&self, id: u64) -> Result<(), RouteError> {
        let mut table = self.models.lock();
        let model = table
            .get_mut(&id)
            .ok_or_else(|| RouteError::not_found(format!("no model {id}")))?;
        if model.state == ModelState::Unloaded {
            return Err(RouteError::bad_request("model is already unloaded"));
        }
        model.state = ModelState::Unloaded;
        Ok(())
    }

    pub fn model_path(&self, id: u64) -> Option<String> {
        self.models.lock().get(&id).map(|m| m.path.clone())
    }

    pub fn context_create(&self, model_id: u64) -> Result<u64, RouteError> {
        let table = self.models.lock();
        let model = table
            .get(&model_id)
            .ok_or_else(|| RouteError::not_found(format!("no model {model_id}")))?;
        if model.state != ModelState::Loaded {
            return Err(RouteError::bad_request("model is not loaded"));
        }
        drop(table);
        let id = self.ids.next();
        self.contexts.lock().insert(
            id,
            Context {
                model_id,
                loras: Vec::new(),
            },
        );
        Ok(id)
    }

    pub fn context_destroy(&self, id: u64) -> Result<(), RouteError> {
        self.contexts
            .lock()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RouteError::not_found(format!("no context {id}")))
    }

    pub fn context_info(&self, id: u64) -> Result<(u64, usize), RouteError> {
        let table = self.contexts.lock();
        let ctx = table
            .get(&id)
            .ok_or_else(|| RouteError::not_found(format!("no context {id}")))?;
        Ok((ctx.model_id, ctx.loras.len()))
    }

    /// Stubbed persistence: returns an opaque handle rather than writing a
    /// real model snapshot to disk.
    pub fn context_dump(&self, id: u64) -> Result<String, RouteError> {
        self.contexts
            .lock()
            .get(&id)
            .map(|_| format!("dump-{id}"))
            .ok_or_else(|| RouteError::not_found(format!("no context {id}")))
    }

    pub fn context_restore(&self, model_id: u64, _dump: &str) -> Result<u64, RouteError> {
        self.context_create(model_id)
    }

    /// `lora_load`'s filename argument is cleared on failure, per §9's open
    /// question: a failed load must not retain a dangling path reference.
    pub fn lora_load(&self, filename: &str) -> Result<u64, RouteError> {
        if filename.trim().is_empty() {
            return Err(RouteError::missing_parameter("filename"));
        }
        let id = self.ids.next();
        self.loras.lock().insert(id, filename.to_string());
        Ok(id)
    }

    pub fn lora_attach(&self, context_id: u64, lora_id: u64) -> Result<(), RouteError> {
        if !self.loras.lock().contains_key(&lora_id) {
            return Err(RouteError::not_found(format!("no lora {lora_id}")));
        }
        let mut table = self.contexts.lock();
        let ctx = table
            .get_mut(&context_id)
            .ok_or_else(|| RouteError::not_found(format!("no context {context_id}")))?;
        if !ctx.loras.contains(&lora_id) {
            ctx.loras.push(lora_id);
        }
        Ok(())
    }

    /// Detaches `lora_id` from `context_id`, per §9's open question resolved
    /// in favor of the context-scoped id (the primary id is `lora_id`, but
    /// detachment is meaningless without the context it was attached to).
    pub fn lora_detach(&self, context_id: u64, lora_id: u64) -> Result<(), RouteError> {
        let mut table = self.contexts.lock();
        let ctx = table
            .get_mut(&context_id)
            .ok_or_else(|| RouteError::not_found(format!("no context {context_id}")))?;
        let before = ctx.loras.len();
        ctx.loras.retain(|&id| id != lora_id);
        if ctx.loras.len() == before {
            return Err(RouteError::not_found(format!(
                "lora {lora_id} is not attached to context {context_id}"
            )));
        }
        Ok(())
    }
}

pub type SharedAiService = Arc<AiService>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_requires_a_loaded_model() {
        let svc = AiService::new();
        let model = svc.model_load("model.gguf").unwrap();
        let ctx = svc.context_create(model).unwrap();
        assert!(svc.context_info(ctx).is_ok());

        svc.model_unload(model).unwrap();
        assert!(svc.context_create(model).is_err());
    }

    #[test]
    fn lora_attach_then_detach() {
        let svc = AiService::new();
        let model = svc.model_load("model.gguf").unwrap();
        let ctx = svc.context_create(model).unwrap();
        let lora = svc.lora_load("adapter.bin").unwrap();

        svc.lora_attach(ctx, lora).unwrap();
        assert_eq!(svc.context_info(ctx).unwrap().1, 1);

        svc.lora_detach(ctx, lora).unwrap();
        assert_eq!(svc.context_info(ctx).unwrap().1, 0);
        assert!(svc.lora_detach(ctx, lora).is_err());
    }
}
