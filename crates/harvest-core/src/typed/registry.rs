//! JobRegistry - 名前 → DynJob の対応表
//!
//! registrar / CLI はジョブ名（文字列）しか知りません。
//! 型付きの Pipeline はここで一度だけ DynJob に変換されます。

use std::collections::BTreeMap;
use std::sync::Arc;

use super::job::DynJob;

#[derive(Default, Clone)]
pub struct JobRegistry {
    jobs: BTreeMap<String, Arc<dyn DynJob>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("job '{0}' is already registered")]
    AlreadyRegistered(String),
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<J: DynJob + 'static>(&mut self, job: J) -> Result<(), RegistryError> {
        let name = job.name().to_string();
        if self.jobs.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        self.jobs.insert(name, Arc::new(job));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DynJob>> {
        self.jobs.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.jobs.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FuneralInvoice, ReservationSummary};
    use crate::impls::{FileDropSource, InMemorySink};
    use crate::typed::Pipeline;

    fn registry() -> JobRegistry {
        let mut registry = JobRegistry::new();
        registry
            .register(Pipeline::funeral_invoice(
                FileDropSource::<FuneralInvoice>::new("/tmp/exports"),
                InMemorySink::new(),
            ))
            .unwrap();
        registry
            .register(Pipeline::golf_reservation(
                FileDropSource::<ReservationSummary>::new("/tmp/exports"),
                InMemorySink::new(),
            ))
            .unwrap();
        registry
    }

    #[test]
    fn register_and_get() {
        let registry = registry();
        assert!(registry.get("funeral_invoice").is_some());
        assert!(registry.get("payroll").is_none());
        assert_eq!(registry.names(), vec!["funeral_invoice", "golf_reservation"]);
    }

    #[test]
    fn double_registration_is_rejected() {
        let mut registry = registry();
        let result = registry.register(Pipeline::funeral_invoice(
            FileDropSource::<FuneralInvoice>::new("/tmp/other"),
            InMemorySink::new(),
        ));
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(name)) if name == "funeral_invoice"));
    }
}
